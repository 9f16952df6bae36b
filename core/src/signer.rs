//! Request signing for the vendor's API-gateway authentication scheme.
//!
//! # Design
//! The gateway authenticates a request by recomputing an HMAC-SHA256 over a
//! newline-delimited string-to-sign:
//!
//! ```text
//! METHOD
//! Accept
//! Content-MD5        (empty when there is no body)
//! Content-Type
//! Date               (always empty; the deployment never sends Date)
//! x-ca-key:<key>
//! x-ca-nonce:<nonce>
//! x-ca-timestamp:<timestamp>
//! <path>
//! ```
//!
//! The body digest must cover exactly the bytes that go on the wire, so
//! bodies are serialized once into an `EncodedBody` that carries both the
//! text and its digest. Everything here is pure.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use serde::Serialize;
use serde_json::Value;
use sha2::Sha256;

use crate::error::SignError;
use crate::http::HttpMethod;

type HmacSha256 = Hmac<Sha256>;

pub const HEADER_ACCEPT: &str = "Accept";
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const HEADER_CONTENT_MD5: &str = "Content-MD5";
pub const HEADER_CA_KEY: &str = "x-ca-key";
pub const HEADER_CA_SIGNATURE: &str = "x-ca-signature";
pub const HEADER_CA_TIMESTAMP: &str = "x-ca-timestamp";
pub const HEADER_CA_NONCE: &str = "x-ca-nonce";
pub const HEADER_CA_SIGNATURE_HEADERS: &str = "x-ca-signature-headers";

/// Value of `x-ca-signature-headers`: the custom headers covered by the
/// signature, in signing order.
pub const SIGNED_HEADER_NAMES: &str = "x-ca-key,x-ca-nonce,x-ca-timestamp";

/// A request body serialized once, together with its Base64 MD5 digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBody {
    text: String,
    content_md5: String,
}

impl EncodedBody {
    /// Serialize `body` into its canonical JSON text.
    ///
    /// Returns `None` for bodies that carry no content (`null`, `{}`, `[]`,
    /// `""`). Serialization goes through `serde_json::Value`, so object keys
    /// come out in sorted order regardless of how the structure was built.
    pub fn encode<T: Serialize + ?Sized>(body: &T) -> Result<Option<Self>, SignError> {
        let value = serde_json::to_value(body)?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Option<Self>, SignError> {
        if is_empty_body(value) {
            return Ok(None);
        }
        let text = serde_json::to_string(value)?;
        let content_md5 = content_md5(text.as_bytes());
        Ok(Some(Self { text, content_md5 }))
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn content_md5(&self) -> &str {
        &self.content_md5
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

fn is_empty_body(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(text) => text.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Base64-encoded MD5 of raw body bytes.
pub fn content_md5(bytes: &[u8]) -> String {
    STANDARD.encode(Md5::digest(bytes))
}

/// Digest of the body as it will be transmitted, or `""` when there is no
/// body to send.
pub fn compute_content_digest<T: Serialize + ?Sized>(body: Option<&T>) -> Result<String, SignError> {
    let Some(body) = body else {
        return Ok(String::new());
    };
    Ok(EncodedBody::encode(body)?
        .map(|encoded| encoded.content_md5)
        .unwrap_or_default())
}

/// Everything that feeds one signature.
#[derive(Debug, Clone, Copy)]
pub struct SigningContext<'a> {
    pub method: HttpMethod,
    pub path: &'a str,
    pub accept: &'a str,
    pub content_type: &'a str,
    pub body: Option<&'a EncodedBody>,
    pub app_key: &'a str,
    pub app_secret: &'a str,
    pub nonce: &'a str,
    pub timestamp: &'a str,
}

/// Build the canonical string-to-sign for `ctx`.
pub fn string_to_sign(ctx: &SigningContext<'_>) -> String {
    let content_md5 = ctx.body.map(EncodedBody::content_md5).unwrap_or("");
    let date = "";
    format!(
        "{method}\n{accept}\n{content_md5}\n{content_type}\n{date}\n\
         {HEADER_CA_KEY}:{key}\n{HEADER_CA_NONCE}:{nonce}\n{HEADER_CA_TIMESTAMP}:{timestamp}\n{path}",
        method = ctx.method.as_str(),
        accept = ctx.accept,
        content_type = ctx.content_type,
        key = ctx.app_key,
        nonce = ctx.nonce,
        timestamp = ctx.timestamp,
        path = ctx.path,
    )
}

/// Base64 HMAC-SHA256 of the string-to-sign, keyed with the app secret.
pub fn sign(ctx: &SigningContext<'_>) -> Result<String, SignError> {
    let payload = string_to_sign(ctx);
    tracing::trace!(string_to_sign = %payload, "signing vendor request");
    let mut mac = HmacSha256::new_from_slice(ctx.app_secret.as_bytes())?;
    mac.update(payload.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ADD_PERSON: &str = "/artemis/api/resource/v1/person/single/add";

    fn context<'a>(body: Option<&'a EncodedBody>) -> SigningContext<'a> {
        SigningContext {
            method: HttpMethod::Post,
            path: ADD_PERSON,
            accept: "*/*",
            content_type: "application/json",
            body,
            app_key: "K",
            app_secret: "S",
            nonce: "N",
            timestamp: "T",
        }
    }

    #[test]
    fn golden_signature_for_empty_body() {
        let signature = sign(&context(None)).unwrap();
        assert_eq!(signature, "Lu3jtfjOmg3pHpS8rEvK07lbaStBgV5arl0wwzZHDKY=");
    }

    #[test]
    fn string_to_sign_layout_without_body() {
        assert_eq!(
            string_to_sign(&context(None)),
            "POST\n*/*\n\napplication/json\n\nx-ca-key:K\nx-ca-nonce:N\nx-ca-timestamp:T\n\
             /artemis/api/resource/v1/person/single/add"
        );
    }

    #[test]
    fn string_to_sign_carries_body_digest() {
        let body = EncodedBody::encode(&json!({"a": 1, "b": 2})).unwrap().unwrap();
        let text = string_to_sign(&context(Some(&body)));
        assert!(text.starts_with("POST\n*/*\nYI3kmkYA27Wxc0knWXkuSg==\napplication/json\n\n"));
        assert!(text.ends_with(ADD_PERSON));
    }

    #[test]
    fn empty_bodies_have_no_digest() {
        assert_eq!(compute_content_digest::<Value>(None).unwrap(), "");
        assert_eq!(compute_content_digest(Some(&json!({}))).unwrap(), "");
        assert_eq!(compute_content_digest(Some(&json!(null))).unwrap(), "");
        assert_eq!(compute_content_digest(Some(&json!([]))).unwrap(), "");
        assert!(EncodedBody::encode(&json!({})).unwrap().is_none());
    }

    #[test]
    fn digest_ignores_key_order() {
        let a: Value = serde_json::from_str(r#"{"personName":"Ada","email":"a@x"}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"email":"a@x","personName":"Ada"}"#).unwrap();
        assert_eq!(
            compute_content_digest(Some(&a)).unwrap(),
            compute_content_digest(Some(&b)).unwrap()
        );
    }

    #[test]
    fn digest_matches_transmitted_bytes() {
        let body = EncodedBody::encode(&json!({"b": 2, "a": 1})).unwrap().unwrap();
        assert_eq!(body.as_str(), r#"{"a":1,"b":2}"#);
        assert_eq!(body.content_md5(), content_md5(body.as_str().as_bytes()));
        assert_eq!(body.content_md5(), "YI3kmkYA27Wxc0knWXkuSg==");
    }

    #[test]
    fn every_signed_field_changes_the_signature() {
        let base = sign(&context(None)).unwrap();
        let body = EncodedBody::encode(&json!({"a": 1})).unwrap().unwrap();

        let mut variants = Vec::new();
        let mut ctx = context(None);
        ctx.method = HttpMethod::Get;
        variants.push(ctx);
        let mut ctx = context(None);
        ctx.accept = "application/json";
        variants.push(ctx);
        let mut ctx = context(None);
        ctx.content_type = "text/plain";
        variants.push(ctx);
        let mut ctx = context(None);
        ctx.app_key = "K2";
        variants.push(ctx);
        let mut ctx = context(None);
        ctx.nonce = "N2";
        variants.push(ctx);
        let mut ctx = context(None);
        ctx.timestamp = "T2";
        variants.push(ctx);
        let mut ctx = context(None);
        ctx.path = "/artemis/api/resource/v1/person/single/delete";
        variants.push(ctx);
        let mut ctx = context(None);
        ctx.app_secret = "S2";
        variants.push(ctx);
        variants.push(context(Some(&body)));

        for ctx in variants {
            assert_ne!(sign(&ctx).unwrap(), base, "{ctx:?}");
        }
    }

    #[test]
    fn method_only_change_matches_reference() {
        let mut ctx = context(None);
        ctx.method = HttpMethod::Get;
        assert_eq!(sign(&ctx).unwrap(), "DDiLUekp2pM1LyLSreDbsZoHm4fww9twxxLoJNE4Wp8=");
    }

    #[test]
    fn unserializable_body_is_an_encoding_error() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(vec![1u8], "non-string key");
        let err = EncodedBody::encode(&map).unwrap_err();
        assert!(matches!(err, SignError::Encoding(_)));
    }
}
