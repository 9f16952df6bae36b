//! Local-first resident management.
//!
//! # Design
//! The local store is authoritative. Creating a resident commits a pending
//! row first, then asks the vendor to add the person, then records the
//! vendor identifiers if and only if the vendor reported success. A vendor
//! failure never removes the local row; it turns the outcome into
//! `PartialSuccess` so the caller sees the row was saved but not synced.
//!
//! There is no lock around the duplicate check and the insert. Two
//! concurrent creates for one owner can both pass the check; the store's
//! uniqueness constraint rejects the second insert, which is reported as a
//! conflict.
//!
//! Deleting a resident is local only. The vendor is never told.

use serde_json::{json, Value};

use crate::client::VendorApi;
use crate::error::{QrCodeError, StoreError, VendorError};
use crate::http::{HttpMethod, VendorResponse};
use crate::store::ResidentStore;
use crate::types::{
    AddPersonPayload, CreateResident, PersonIds, Resident, PATH_ADD_PERSON, PATH_DYNAMIC_QR,
};

/// Why a vendor sync did not complete.
#[derive(Debug)]
pub enum VendorDiagnostic {
    /// The call never completed.
    Transport(VendorError),
    /// The call completed but the payload did not report success with a
    /// person id.
    Rejected(VendorResponse),
}

impl VendorDiagnostic {
    /// What the vendor said, as JSON, for reporting back to an operator.
    pub fn to_json(&self) -> Value {
        match self {
            VendorDiagnostic::Transport(err) => json!({ "error": err.to_string() }),
            VendorDiagnostic::Rejected(response) => response.body.clone(),
        }
    }
}

/// Result of one create-resident operation.
#[derive(Debug)]
pub enum CreateResidentOutcome {
    /// Saved locally and synced; `resident` carries the vendor identifiers.
    FullSuccess {
        resident: Resident,
        vendor_person_id: String,
        vendor_person_code: String,
    },
    /// Saved locally; the vendor sync failed and the row stays pending.
    PartialSuccess {
        resident: Resident,
        diagnostic: VendorDiagnostic,
    },
    /// Required input missing. Nothing was attempted.
    ValidationError(String),
    /// The owner already exists locally. Nothing was attempted remotely.
    Conflict { owner_id: String },
    /// The local store failed.
    Fatal(StoreError),
}

pub struct ResidentReconciler<S, V> {
    store: S,
    vendor: V,
    org_index_code: String,
}

impl<S: ResidentStore, V: VendorApi> ResidentReconciler<S, V> {
    pub fn new(store: S, vendor: V, org_index_code: &str) -> Self {
        Self {
            store,
            vendor,
            org_index_code: org_index_code.to_string(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn vendor(&self) -> &V {
        &self.vendor
    }

    pub async fn create_resident(&self, request: CreateResident) -> CreateResidentOutcome {
        let owner_id = request.owner_id.as_deref().map(str::trim).unwrap_or_default();
        let full_name = request.full_name.as_deref().map(str::trim).unwrap_or_default();
        if owner_id.is_empty() || full_name.is_empty() {
            return CreateResidentOutcome::ValidationError(
                "ownerId and fullName are required".to_string(),
            );
        }
        let email = request.email.as_deref().filter(|e| !e.trim().is_empty());

        match self.store.get_resident_by_owner(owner_id).await {
            Ok(Some(_)) => {
                return CreateResidentOutcome::Conflict {
                    owner_id: owner_id.to_string(),
                }
            }
            Ok(None) => {}
            Err(err) => {
                tracing::error!(owner_id, error = %err, "duplicate check failed");
                return CreateResidentOutcome::Fatal(err);
            }
        }

        let resident = match self.store.insert_resident(owner_id, full_name, email).await {
            Ok(resident) => resident,
            Err(StoreError::UniqueViolation(owner_id)) => {
                tracing::info!(%owner_id, "concurrent create lost the insert race");
                return CreateResidentOutcome::Conflict { owner_id };
            }
            Err(err) => {
                tracing::error!(owner_id, error = %err, "local insert failed");
                return CreateResidentOutcome::Fatal(err);
            }
        };
        tracing::info!(owner_id, id = resident.id, "resident saved locally, syncing");

        let payload = AddPersonPayload {
            person_name: resident.full_name.clone(),
            email: resident.email.clone().unwrap_or_default(),
            org_index_code: self.org_index_code.clone(),
        };
        // Serializing a struct of strings cannot fail.
        let body = serde_json::to_value(&payload).unwrap_or(Value::Null);

        let response = match self.vendor.execute(PATH_ADD_PERSON, HttpMethod::Post, Some(&body)).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(owner_id, error = %err, "vendor sync failed, resident left pending");
                return CreateResidentOutcome::PartialSuccess {
                    resident,
                    diagnostic: VendorDiagnostic::Transport(err),
                };
            }
        };

        let Some(ids) = PersonIds::from_add_person(&response.body) else {
            tracing::warn!(owner_id, status = response.status, "vendor rejected person, resident left pending");
            return CreateResidentOutcome::PartialSuccess {
                resident,
                diagnostic: VendorDiagnostic::Rejected(response),
            };
        };

        if let Err(err) = self
            .store
            .update_resident_sync_fields(owner_id, &ids.person_id, &ids.person_code)
            .await
        {
            tracing::error!(owner_id, person_id = %ids.person_id, error = %err, "failed to record vendor ids");
            return CreateResidentOutcome::Fatal(err);
        }
        tracing::info!(owner_id, person_id = %ids.person_id, "resident synced");

        let resident = Resident {
            vendor_person_id: Some(ids.person_id.clone()),
            vendor_person_code: Some(ids.person_code.clone()),
            ..resident
        };
        CreateResidentOutcome::FullSuccess {
            resident,
            vendor_person_id: ids.person_id,
            vendor_person_code: ids.person_code,
        }
    }

    pub async fn get_resident(&self, owner_id: &str) -> Result<Option<Resident>, StoreError> {
        self.store.get_resident_by_owner(owner_id).await
    }

    pub async fn list_residents(&self) -> Result<Vec<Resident>, StoreError> {
        self.store.list_residents().await
    }

    /// Remove the local row. The vendor's copy of the person is left alone.
    pub async fn delete_resident(&self, owner_id: &str) -> Result<bool, StoreError> {
        let deleted = self.store.delete_resident(owner_id).await?;
        tracing::info!(owner_id, deleted, "resident deleted locally");
        Ok(deleted)
    }

    /// Fetch a dynamic QR code for a synced resident. The vendor response is
    /// returned untouched.
    pub async fn dynamic_qr(&self, owner_id: &str) -> Result<VendorResponse, QrCodeError> {
        let resident = self
            .store
            .get_resident_by_owner(owner_id)
            .await?
            .ok_or_else(|| QrCodeError::NotFound(owner_id.to_string()))?;
        let person_id = resident
            .vendor_person_id
            .ok_or_else(|| QrCodeError::NotSynced(owner_id.to_string()))?;

        let body = json!({ "personId": person_id });
        Ok(self
            .vendor
            .execute(PATH_DYNAMIC_QR, HttpMethod::Post, Some(&body))
            .await?)
    }
}
