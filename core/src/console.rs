//! Operator console calls: raw pass-through and an authentication probe.

use std::time::Instant;

use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::client::VendorApi;
use crate::error::VendorError;
use crate::http::{HttpMethod, VendorResponse};
use crate::types::PATH_PERSON_LIST;

/// A raw call as typed into the console.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCall {
    #[serde(alias = "path")]
    pub endpoint: Option<String>,
    pub method: Option<String>,
    #[serde(alias = "body")]
    pub payload: Option<Value>,
}

/// A completed raw call.
#[derive(Debug, Clone)]
pub struct CallReport {
    pub request_id: Uuid,
    pub duration_ms: u64,
    pub response: VendorResponse,
}

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("Endpoint is required")]
    MissingEndpoint,

    #[error("Endpoint must start with /")]
    RelativeEndpoint(String),

    #[error("unsupported method `{0}`")]
    UnknownMethod(String),

    #[error("Failed to communicate with vendor platform: {source}")]
    Vendor {
        request_id: Uuid,
        duration_ms: u64,
        #[source]
        source: VendorError,
    },
}

/// Sign and send an arbitrary call. Defaults to `POST` with an empty body.
pub async fn execute_raw<V: VendorApi + ?Sized>(
    vendor: &V,
    call: RawCall,
) -> Result<CallReport, ConsoleError> {
    let endpoint = call
        .endpoint
        .filter(|e| !e.trim().is_empty())
        .ok_or(ConsoleError::MissingEndpoint)?;
    if !endpoint.starts_with('/') {
        return Err(ConsoleError::RelativeEndpoint(endpoint));
    }
    let method = match call.method.as_deref() {
        Some(m) => m.parse::<HttpMethod>().map_err(ConsoleError::UnknownMethod)?,
        None => HttpMethod::Post,
    };
    let payload = call.payload.unwrap_or_else(|| json!({}));

    let request_id = Uuid::new_v4();
    let started = Instant::now();
    tracing::info!(%request_id, %method, %endpoint, "raw vendor call");

    let result = vendor.execute(&endpoint, method, Some(&payload)).await;
    let duration_ms = started.elapsed().as_millis() as u64;
    match result {
        Ok(response) => Ok(CallReport {
            request_id,
            duration_ms,
            response,
        }),
        Err(source) => Err(ConsoleError::Vendor {
            request_id,
            duration_ms,
            source,
        }),
    }
}

/// Check that the configured credentials are accepted by asking for a
/// single-entry person page.
pub async fn probe_auth<V: VendorApi + ?Sized>(vendor: &V) -> Result<VendorResponse, VendorError> {
    let body = json!({ "pageNo": 1, "pageSize": 1 });
    vendor.execute(PATH_PERSON_LIST, HttpMethod::Post, Some(&body)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Echo {
        seen: Mutex<Vec<(String, HttpMethod, Option<Value>)>>,
        fail: bool,
    }

    #[async_trait]
    impl VendorApi for Echo {
        async fn execute(
            &self,
            path: &str,
            method: HttpMethod,
            body: Option<&Value>,
        ) -> Result<VendorResponse, VendorError> {
            self.seen.lock().unwrap().push((path.to_string(), method, body.cloned()));
            if self.fail {
                return Err(VendorError::Transport("timeout: deadline elapsed".to_string()));
            }
            Ok(VendorResponse {
                status: 200,
                status_text: "OK".to_string(),
                headers: BTreeMap::new(),
                body: json!({"code": "0"}),
            })
        }
    }

    #[tokio::test]
    async fn raw_call_defaults_to_post_with_empty_object() {
        let vendor = Echo::default();
        let report = execute_raw(
            &vendor,
            RawCall {
                endpoint: Some("/artemis/api/common/v1/version".to_string()),
                ..RawCall::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(report.response.status, 200);
        let seen = vendor.seen.lock().unwrap();
        assert_eq!(seen[0].1, HttpMethod::Post);
        assert_eq!(seen[0].2, Some(json!({})));
    }

    #[tokio::test]
    async fn raw_call_validates_input() {
        let vendor = Echo::default();
        let err = execute_raw(&vendor, RawCall::default()).await.unwrap_err();
        assert!(matches!(err, ConsoleError::MissingEndpoint));

        let err = execute_raw(
            &vendor,
            RawCall {
                endpoint: Some("/x".to_string()),
                method: Some("PATCH".to_string()),
                payload: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ConsoleError::UnknownMethod(ref m) if m == "PATCH"));

        let err = execute_raw(
            &vendor,
            RawCall {
                endpoint: Some("artemis/api/resource/v1/person/personList".to_string()),
                ..RawCall::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ConsoleError::RelativeEndpoint(_)));
        assert!(vendor.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn raw_call_transport_error_keeps_request_id() {
        let vendor = Echo {
            fail: true,
            ..Echo::default()
        };
        let call: RawCall = serde_json::from_value(json!({"path": "/x", "method": "get"})).unwrap();
        let first = execute_raw(&vendor, call.clone()).await.unwrap_err();
        let second = execute_raw(&vendor, call).await.unwrap_err();
        match (first, second) {
            (
                ConsoleError::Vendor {
                    request_id: first_id,
                    source,
                    ..
                },
                ConsoleError::Vendor {
                    request_id: second_id, ..
                },
            ) => {
                assert!(matches!(source, VendorError::Transport(_)));
                assert!(!first_id.is_nil());
                assert_ne!(first_id, second_id);
            }
            other => panic!("expected vendor errors, got {other:?}"),
        }
        assert_eq!(vendor.seen.lock().unwrap()[0].1, HttpMethod::Get);
    }

    #[tokio::test]
    async fn probe_requests_one_person() {
        let vendor = Echo::default();
        probe_auth(&vendor).await.unwrap();
        let seen = vendor.seen.lock().unwrap();
        assert_eq!(seen[0].0, PATH_PERSON_LIST);
        assert_eq!(seen[0].2, Some(json!({"pageNo": 1, "pageSize": 1})));
    }
}
