//! In-process stand-in for the vendor's API gateway.
//!
//! Verifies the gateway signature the way the real gateway does, using its
//! own implementation of the scheme, and answers a handful of person
//! endpoints with canned data. Every request that reaches it is recorded.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use serde::Serialize;
use serde_json::{json, Value};
use sha2::Sha256;
use tokio::net::TcpListener;

pub const ADD_PERSON: &str = "/artemis/api/resource/v1/person/single/add";
pub const DYNAMIC_QR: &str = "/artemis/api/resource/v1/person/dynamicqrcode/get";
pub const PERSON_LIST: &str = "/artemis/api/resource/v1/person/personList";

/// A request as the mock received it.
#[derive(Clone, Debug, Serialize)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

#[derive(Default)]
struct Inner {
    requests: Vec<Recorded>,
    nonces: HashSet<String>,
    persons: Vec<(String, String)>,
    rejected_names: HashSet<String>,
}

/// Shared state of one mock gateway.
#[derive(Clone)]
pub struct VendorState {
    app_key: String,
    app_secret: String,
    inner: Arc<Mutex<Inner>>,
}

impl VendorState {
    pub fn new(app_key: &str, app_secret: &str) -> Self {
        Self {
            app_key: app_key.to_string(),
            app_secret: app_secret.to_string(),
            inner: Arc::default(),
        }
    }

    /// Answer person-add calls for `name` with a vendor-level rejection.
    pub fn reject_person(&self, name: &str) {
        self.lock().rejected_names.insert(name.to_string());
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.lock().requests.clone()
    }

    /// `(personId, personName)` for every person added so far.
    pub fn persons(&self) -> Vec<(String, String)> {
        self.lock().persons.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A panicking handler must not take the rest of a test down with it.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub fn app(state: VendorState) -> Router {
    Router::new().fallback(handle).with_state(state)
}

pub async fn run(listener: TcpListener, state: VendorState) -> Result<(), std::io::Error> {
    axum::serve(listener, app(state)).await
}

/// Serve on an ephemeral local port in the background.
pub async fn spawn(state: VendorState) -> Result<SocketAddr, std::io::Error> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(run(listener, state));
    Ok(addr)
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or("")
}

fn reply(status: StatusCode, code: &str, msg: &str, data: Value) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "code": code, "msg": msg, "data": data })))
}

fn unauthorized(msg: &str) -> (StatusCode, Json<Value>) {
    reply(StatusCode::UNAUTHORIZED, "0x02401007", msg, Value::Null)
}

/// Recompute the signature the client should have sent.
pub fn expected_signature(secret: &str, method: &str, headers: &HeaderMap, path: &str) -> String {
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}\n\nx-ca-key:{}\nx-ca-nonce:{}\nx-ca-timestamp:{}\n{}",
        method.to_uppercase(),
        header(headers, "accept"),
        header(headers, "content-md5"),
        header(headers, "content-type"),
        header(headers, "x-ca-key"),
        header(headers, "x-ca-nonce"),
        header(headers, "x-ca-timestamp"),
        path,
    );
    let mut mac = <Hmac<Sha256>>::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("hmac accepts keys of any length"));
    mac.update(string_to_sign.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

fn verify(state: &VendorState, method: &Method, uri: &Uri, headers: &HeaderMap, body: &[u8]) -> Result<(), &'static str> {
    if header(headers, "x-ca-key") != state.app_key {
        return Err("unknown app key");
    }
    if header(headers, "x-ca-signature-headers") != "x-ca-key,x-ca-nonce,x-ca-timestamp" {
        return Err("unexpected signature headers");
    }
    let md5 = header(headers, "content-md5");
    if body.is_empty() != md5.is_empty() {
        return Err("content-md5 presence does not match body");
    }
    if !body.is_empty() && STANDARD.encode(Md5::digest(body)) != md5 {
        return Err("content-md5 mismatch");
    }
    let expected = expected_signature(&state.app_secret, method.as_str(), headers, uri.path());
    if header(headers, "x-ca-signature") != expected {
        return Err("signature mismatch");
    }
    Ok(())
}

async fn handle(
    State(state): State<VendorState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let recorded = Recorded {
        method: method.to_string(),
        path: uri.path().to_string(),
        headers: headers
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect(),
        body: String::from_utf8_lossy(&body).into_owned(),
    };
    state.lock().requests.push(recorded);

    if let Err(msg) = verify(&state, &method, &uri, &headers, &body) {
        return unauthorized(msg);
    }
    let nonce = header(&headers, "x-ca-nonce").to_string();
    if !state.lock().nonces.insert(nonce) {
        return unauthorized("nonce reused");
    }

    let payload: Value = if body.is_empty() {
        Value::Null
    } else {
        match serde_json::from_slice(&body) {
            Ok(value) => value,
            Err(_) => return reply(StatusCode::BAD_REQUEST, "400", "malformed json", Value::Null),
        }
    };

    match uri.path() {
        ADD_PERSON => add_person(&state, &payload),
        DYNAMIC_QR => match payload["personId"].as_str() {
            Some(id) => reply(StatusCode::OK, "0", "Success", json!({ "qrCode": format!("QR-{id}") })),
            None => reply(StatusCode::OK, "1", "personId is required", Value::Null),
        },
        PERSON_LIST => {
            let persons = state.persons();
            let list: Vec<Value> = persons
                .iter()
                .take(payload["pageSize"].as_u64().unwrap_or(1) as usize)
                .map(|(id, name)| json!({ "personId": id, "personName": name }))
                .collect();
            reply(
                StatusCode::OK,
                "0",
                "Success",
                json!({ "total": persons.len(), "pageNo": payload["pageNo"], "list": list }),
            )
        }
        _ => reply(StatusCode::NOT_FOUND, "404", "api not found", Value::Null),
    }
}

fn add_person(state: &VendorState, payload: &Value) -> (StatusCode, Json<Value>) {
    let Some(name) = payload["personName"].as_str().filter(|n| !n.is_empty()) else {
        return reply(StatusCode::OK, "2", "personName is required", Value::Null);
    };
    let mut inner = state.lock();
    if inner.rejected_names.contains(name) {
        return reply(StatusCode::OK, "128", "person rejected by platform", Value::Null);
    }
    let person_id = (inner.persons.len() + 1).to_string();
    inner.persons.push((person_id.clone(), name.to_string()));
    reply(StatusCode::OK, "0", "Success", json!({ "personId": person_id }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_signature_matches_reference() {
        let mut headers = HeaderMap::new();
        headers.insert("accept", "*/*".parse().unwrap());
        headers.insert("content-type", "application/json".parse().unwrap());
        headers.insert("x-ca-key", "K".parse().unwrap());
        headers.insert("x-ca-nonce", "N".parse().unwrap());
        headers.insert("x-ca-timestamp", "T".parse().unwrap());
        assert_eq!(
            expected_signature("S", "post", &headers, ADD_PERSON),
            "Lu3jtfjOmg3pHpS8rEvK07lbaStBgV5arl0wwzZHDKY="
        );
    }

    #[test]
    fn rejected_names_are_tracked() {
        let state = VendorState::new("K", "S");
        state.reject_person("Mallory");
        let (status, Json(body)) = add_person(&state, &json!({"personName": "Mallory"}));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], "128");
        let (_, Json(body)) = add_person(&state, &json!({"personName": "Ada"}));
        assert_eq!(body["data"]["personId"], "1");
        assert_eq!(state.persons(), vec![("1".to_string(), "Ada".to_string())]);
    }
}
