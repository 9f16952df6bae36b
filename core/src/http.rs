//! HTTP envelope types for the vendor gateway.
//!
//! # Design
//! A `SignedRequest` is plain data: everything the transport needs to put a
//! request on the wire, already signed. `VendorClient::build_request`
//! produces one without touching the network, so the exact headers and body
//! bytes can be inspected in tests before `execute` sends them.
//!
//! `VendorResponse` is the normalized result of any completed exchange,
//! whatever its status code. Interpreting the vendor's `{code, msg, data}`
//! envelope is left to the caller.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// HTTP method accepted by the vendor gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    /// Case-insensitive, so `post` from an operator console is accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(other.to_string()),
        }
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A fully signed vendor request described as plain data.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub method: HttpMethod,
    /// Vendor-relative path, exactly as signed.
    pub path: String,
    /// Absolute URL the request is sent to.
    pub url: String,
    /// Headers in the order they are sent.
    pub headers: Vec<(String, String)>,
    /// Serialized JSON body. `None` when the body was absent or empty.
    pub body: Option<String>,
    /// Base64 MD5 of `body`; `None` exactly when `body` is `None`.
    pub content_md5: Option<String>,
    pub signature: String,
}

impl SignedRequest {
    /// Look up a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Normalized result of a completed vendor exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorResponse {
    pub status: u16,
    pub status_text: String,
    /// Header names are lower-cased; repeated headers keep the last value.
    pub headers: BTreeMap<String, String>,
    /// Parsed JSON body. Non-JSON bodies are kept as a string and an empty
    /// body is `null`.
    pub body: Value,
}

/// Decode a raw response body into the opaque JSON value carried by
/// `VendorResponse`.
pub(crate) fn decode_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_parses_case_insensitively() {
        assert_eq!("post".parse::<HttpMethod>(), Ok(HttpMethod::Post));
        assert_eq!("Delete".parse::<HttpMethod>(), Ok(HttpMethod::Delete));
        assert_eq!("PATCH".parse::<HttpMethod>(), Err("PATCH".to_string()));
    }

    #[test]
    fn decode_body_keeps_non_json_text() {
        assert_eq!(decode_body(b""), Value::Null);
        assert_eq!(decode_body(br#"{"code":"0"}"#)["code"], "0");
        assert_eq!(
            decode_body(b"<html>gateway error</html>"),
            Value::String("<html>gateway error</html>".to_string())
        );
    }

    #[test]
    fn header_lookup_ignores_case() {
        let request = SignedRequest {
            method: HttpMethod::Post,
            path: "/p".to_string(),
            url: "https://vendor/p".to_string(),
            headers: vec![("Content-MD5".to_string(), "abc".to_string())],
            body: Some("{}".to_string()),
            content_md5: Some("abc".to_string()),
            signature: "sig".to_string(),
        };
        assert_eq!(request.header("content-md5"), Some("abc"));
        assert_eq!(request.header("x-ca-key"), None);
    }
}
