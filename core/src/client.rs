//! Signed HTTP client for the vendor platform.
//!
//! # Design
//! `VendorClient` is split the same way for every call: `build_request`
//! produces a `SignedRequest` without I/O, and `execute` puts it on the wire.
//! The client never interprets vendor error codes. Any completed exchange,
//! 4xx and 5xx included, comes back as a `VendorResponse`; only a request
//! that never completed is an error.
//!
//! Timestamp and nonce come from an injected `StampSource`, so fixed stamps
//! reproduce known signatures in tests.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;

use crate::config::VendorConfig;
use crate::error::VendorError;
use crate::http::{decode_body, HttpMethod, SignedRequest, VendorResponse};
use crate::signer::{
    self, EncodedBody, SigningContext, HEADER_ACCEPT, HEADER_CA_KEY, HEADER_CA_NONCE,
    HEADER_CA_SIGNATURE, HEADER_CA_SIGNATURE_HEADERS, HEADER_CA_TIMESTAMP, HEADER_CONTENT_MD5,
    HEADER_CONTENT_TYPE, SIGNED_HEADER_NAMES,
};
use crate::stamp::{StampSource, SystemStamp};

/// Fixed timeout for every vendor call.
pub const VENDOR_TIMEOUT: Duration = Duration::from_millis(30_000);

pub const ACCEPT: &str = "*/*";
pub const CONTENT_TYPE: &str = "application/json";

/// One signed call against the vendor platform.
///
/// The seam the reconciler depends on; tests substitute a fake.
#[async_trait]
pub trait VendorApi: Send + Sync {
    async fn execute(
        &self,
        path: &str,
        method: HttpMethod,
        body: Option<&Value>,
    ) -> Result<VendorResponse, VendorError>;
}

#[async_trait]
impl<A: VendorApi + ?Sized> VendorApi for std::sync::Arc<A> {
    async fn execute(
        &self,
        path: &str,
        method: HttpMethod,
        body: Option<&Value>,
    ) -> Result<VendorResponse, VendorError> {
        (**self).execute(path, method, body).await
    }
}

pub struct VendorClient<T = SystemStamp> {
    http: reqwest::Client,
    config: VendorConfig,
    stamps: T,
}

impl VendorClient<SystemStamp> {
    pub fn new(config: &VendorConfig) -> Result<Self, VendorError> {
        Self::with_stamps(config, SystemStamp)
    }
}

impl<T: StampSource> VendorClient<T> {
    pub fn with_stamps(config: &VendorConfig, stamps: T) -> Result<Self, VendorError> {
        if !config.verify_tls {
            tracing::warn!(base_url = %config.base_url, "TLS certificate verification disabled for vendor calls");
        }
        let http = reqwest::Client::builder()
            .timeout(VENDOR_TIMEOUT)
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| VendorError::ClientBuild(e.to_string()))?;
        Ok(Self {
            http,
            config: config.clone(),
            stamps,
        })
    }

    /// Sign a request for `path` with a fresh stamp.
    pub fn build_request(
        &self,
        path: &str,
        method: HttpMethod,
        body: Option<&Value>,
    ) -> Result<SignedRequest, VendorError> {
        if !path.starts_with('/') {
            return Err(VendorError::InvalidRequest(format!(
                "path `{path}` must start with `/`"
            )));
        }
        let encoded = match body {
            Some(value) => EncodedBody::from_value(value).map_err(VendorError::Sign)?,
            None => None,
        };
        let stamp = self.stamps.stamp();

        let signature = signer::sign(&SigningContext {
            method,
            path,
            accept: ACCEPT,
            content_type: CONTENT_TYPE,
            body: encoded.as_ref(),
            app_key: &self.config.app_key,
            app_secret: &self.config.app_secret,
            nonce: &stamp.nonce,
            timestamp: &stamp.timestamp,
        })?;

        let mut headers = vec![
            (HEADER_ACCEPT.to_string(), ACCEPT.to_string()),
            (HEADER_CONTENT_TYPE.to_string(), CONTENT_TYPE.to_string()),
            (HEADER_CA_KEY.to_string(), self.config.app_key.clone()),
            (HEADER_CA_SIGNATURE.to_string(), signature.clone()),
            (HEADER_CA_TIMESTAMP.to_string(), stamp.timestamp),
            (HEADER_CA_NONCE.to_string(), stamp.nonce),
            (
                HEADER_CA_SIGNATURE_HEADERS.to_string(),
                SIGNED_HEADER_NAMES.to_string(),
            ),
        ];
        let content_md5 = encoded.as_ref().map(|b| b.content_md5().to_string());
        if let Some(md5) = &content_md5 {
            headers.push((HEADER_CONTENT_MD5.to_string(), md5.clone()));
        }

        Ok(SignedRequest {
            method,
            path: path.to_string(),
            url: format!("{}{path}", self.config.base_url),
            headers,
            body: encoded.map(EncodedBody::into_text),
            content_md5,
            signature,
        })
    }

    /// Send an already signed request.
    pub async fn send(&self, request: SignedRequest) -> Result<VendorResponse, VendorError> {
        let started = Instant::now();
        let method = request.method;
        let path = request.path;

        let mut builder = self.http.request(method.into(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let result = async {
            let response = builder.send().await?;
            let status = response.status();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
                })
                .collect();
            let bytes = response.bytes().await?;
            Ok::<_, reqwest::Error>(VendorResponse {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
                headers,
                body: decode_body(&bytes),
            })
        }
        .await;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok(response) => {
                tracing::info!(%method, %path, status = response.status, elapsed_ms, "vendor call completed");
                Ok(response)
            }
            Err(err) => {
                let err = VendorError::transport(err);
                tracing::warn!(%method, %path, elapsed_ms, error = %err, "vendor call failed");
                Err(err)
            }
        }
    }
}

#[async_trait]
impl<T: StampSource> VendorApi for VendorClient<T> {
    async fn execute(
        &self,
        path: &str,
        method: HttpMethod,
        body: Option<&Value>,
    ) -> Result<VendorResponse, VendorError> {
        let request = self.build_request(path, method, body)?;
        self.send(request).await
    }
}
