//! Core of the access-control gateway.
//!
//! # Overview
//! Drives a vendor access-control platform through its signed Artemis-style
//! API while keeping a local SQLite record of residents and visitors that is
//! treated as authoritative.
//!
//! # Design
//! - `signer` is pure: canonical string-to-sign, body digest, HMAC.
//! - `client::VendorClient` builds a signed request (`build_request`) and
//!   sends it (`send`); any HTTP status comes back as a `VendorResponse`.
//! - `reconciler::ResidentReconciler` writes locally first, then syncs, and
//!   reports `FullSuccess`, `PartialSuccess`, `ValidationError`, `Conflict`
//!   or `Fatal`.
//! - `store::ResidentStore` and `client::VendorApi` are the seams tests
//!   replace.

pub mod client;
pub mod config;
pub mod console;
pub mod error;
pub mod http;
pub mod reconciler;
pub mod signer;
pub mod stamp;
pub mod store;
pub mod types;

pub use client::{VendorApi, VendorClient};
pub use config::{GatewayConfig, ServerConfig, VendorConfig};
pub use error::{ConfigError, QrCodeError, SignError, StoreError, VendorError};
pub use http::{HttpMethod, SignedRequest, VendorResponse};
pub use reconciler::{CreateResidentOutcome, ResidentReconciler, VendorDiagnostic};
pub use stamp::{FixedStamp, RequestStamp, StampSource, SystemStamp};
pub use store::{ResidentStore, SqliteStore};
pub use types::{CreateResident, NewVisitor, Resident, SyncState, Visitor};
