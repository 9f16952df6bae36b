use axum::http::{self, HeaderMap, HeaderValue, Request, StatusCode};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use http_body_util::BodyExt;
use md5::{Digest, Md5};
use mock_vendor::{app, expected_signature, VendorState, ADD_PERSON, DYNAMIC_QR, PERSON_LIST};
use serde_json::Value;
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes: bytes::Bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn state() -> VendorState {
    VendorState::new("K", "S")
}

/// Build a request signed with `secret` the way the gateway expects.
fn signed_request(secret: &str, path: &str, nonce: &str, body: &str) -> Request<String> {
    let mut headers = HeaderMap::new();
    headers.insert(http::header::ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(http::header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert("x-ca-key", HeaderValue::from_static("K"));
    headers.insert("x-ca-nonce", nonce.parse().unwrap());
    headers.insert("x-ca-timestamp", HeaderValue::from_static("1700000000000"));
    headers.insert(
        "x-ca-signature-headers",
        HeaderValue::from_static("x-ca-key,x-ca-nonce,x-ca-timestamp"),
    );
    if !body.is_empty() {
        let md5 = STANDARD.encode(Md5::digest(body.as_bytes()));
        headers.insert("content-md5", md5.parse().unwrap());
    }
    let signature = expected_signature(secret, "POST", &headers, path);
    headers.insert("x-ca-signature", signature.parse().unwrap());

    let mut builder = Request::builder().method("POST").uri(path);
    for (name, value) in &headers {
        builder = builder.header(name, value);
    }
    builder.body(body.to_string()).unwrap()
}

// --- authentication ---

#[tokio::test]
async fn unsigned_request_is_rejected() {
    let resp = app(state())
        .oneshot(Request::builder().method("POST").uri(ADD_PERSON).body(String::new()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_secret_is_rejected() {
    let resp = app(state())
        .oneshot(signed_request("not-S", ADD_PERSON, "n-1", r#"{"personName":"Ada"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await["msg"], "signature mismatch");
}

#[tokio::test]
async fn body_must_match_content_md5() {
    let mut req = signed_request("S", ADD_PERSON, "n-1", r#"{"personName":"Ada"}"#);
    *req.body_mut() = r#"{"personName":"Eve"}"#.to_string();
    let resp = app(state()).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await["msg"], "content-md5 mismatch");
}

#[tokio::test]
async fn reused_nonce_is_rejected() {
    let state = state();
    let first = app(state.clone())
        .oneshot(signed_request("S", PERSON_LIST, "n-1", r#"{"pageNo":1,"pageSize":1}"#))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let replay = app(state.clone())
        .oneshot(signed_request("S", PERSON_LIST, "n-1", r#"{"pageNo":1,"pageSize":1}"#))
        .await
        .unwrap();
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(state.requests().len(), 2);
}

// --- person endpoints ---

#[tokio::test]
async fn add_person_assigns_id() {
    let state = state();
    let resp = app(state.clone())
        .oneshot(signed_request(
            "S",
            ADD_PERSON,
            "n-1",
            r#"{"email":"","orgIndexCode":"root000000","personName":"Ada"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["code"], "0");
    assert_eq!(body["data"]["personId"], "1");
    assert!(body["data"].get("personCode").is_none());
    assert_eq!(state.persons(), vec![("1".to_string(), "Ada".to_string())]);
}

#[tokio::test]
async fn rejected_person_gets_vendor_error_code() {
    let state = state();
    state.reject_person("Mallory");
    let resp = app(state.clone())
        .oneshot(signed_request("S", ADD_PERSON, "n-1", r#"{"personName":"Mallory"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["code"], "128");
    assert!(state.persons().is_empty());
}

#[tokio::test]
async fn dynamic_qr_echoes_person() {
    let resp = app(state())
        .oneshot(signed_request("S", DYNAMIC_QR, "n-1", r#"{"personId":"7"}"#))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await["data"]["qrCode"], "QR-7");
}

#[tokio::test]
async fn unknown_api_is_404() {
    let resp = app(state())
        .oneshot(signed_request("S", "/artemis/api/nothing/here", "n-1", ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
