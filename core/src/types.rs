//! Domain records and vendor payloads.
//!
//! # Design
//! Local records use the gateway's own field names; the vendor payloads
//! mirror the vendor's camelCase JSON and are kept separate so a schema
//! change on either side stays contained.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PATH_ADD_PERSON: &str = "/artemis/api/resource/v1/person/single/add";
pub const PATH_DYNAMIC_QR: &str = "/artemis/api/resource/v1/person/dynamicqrcode/get";
pub const PATH_PERSON_LIST: &str = "/artemis/api/resource/v1/person/personList";

/// The only documented success value of the vendor's `code` field.
pub const VENDOR_SUCCESS_CODE: &str = "0";

/// A locally owned resident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resident {
    pub id: i64,
    pub owner_id: String,
    pub full_name: String,
    pub email: Option<String>,
    pub vendor_person_id: Option<String>,
    pub vendor_person_code: Option<String>,
}

/// Where a resident stands relative to the vendor platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    /// Saved locally, no vendor identifiers yet.
    Pending,
    Synced,
}

impl Resident {
    pub fn sync_state(&self) -> SyncState {
        match self.vendor_person_id {
            Some(_) => SyncState::Synced,
            None => SyncState::Pending,
        }
    }
}

/// Inbound create-resident input. Fields are optional so missing values
/// reach validation instead of failing deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateResident {
    pub owner_id: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
}

/// A purely local visitor record; never sent to the vendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visitor {
    pub id: i64,
    /// Local id of the hosting resident.
    pub user_id: Option<i64>,
    pub visitor_name: Option<String>,
    pub visit_start: Option<String>,
    pub visit_end: Option<String>,
    pub vendor_visitor_id: Option<String>,
    pub qr_code: Option<String>,
    /// Full name of the host, filled in by listings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVisitor {
    pub user_id: Option<i64>,
    pub visitor_name: Option<String>,
    pub visit_start: Option<String>,
    pub visit_end: Option<String>,
}

/// Body of the vendor's person-add call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPersonPayload {
    pub person_name: String,
    pub email: String,
    pub org_index_code: String,
}

/// The vendor's conventional `{code, msg, data}` response envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VendorEnvelope<T> {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
}

impl<T> VendorEnvelope<T> {
    pub fn is_success(&self) -> bool {
        self.code.as_deref() == Some(VENDOR_SUCCESS_CODE)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPersonData {
    pub person_id: Option<String>,
    pub person_code: Option<String>,
}

/// Identifiers assigned by a successful person-add call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonIds {
    pub person_id: String,
    pub person_code: String,
}

impl PersonIds {
    /// Extract the identifiers from a person-add response body.
    ///
    /// `None` unless the body is a success envelope carrying a non-empty
    /// `personId`. A missing `personCode` falls back to the person id.
    pub fn from_add_person(body: &Value) -> Option<Self> {
        let envelope: VendorEnvelope<AddPersonData> = serde_json::from_value(body.clone()).ok()?;
        if !envelope.is_success() {
            return None;
        }
        let data = envelope.data?;
        let person_id = data.person_id.filter(|id| !id.is_empty())?;
        let person_code = data
            .person_code
            .filter(|code| !code.is_empty())
            .unwrap_or_else(|| person_id.clone());
        Some(Self {
            person_id,
            person_code,
        })
    }
}
