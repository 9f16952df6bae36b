//! Local persistent store, the source of truth for residents and visitors.
//!
//! # Design
//! `ResidentStore` is the async seam the reconciler depends on. `SqliteStore`
//! implements it over a single `rusqlite::Connection` behind a mutex; every
//! call runs on the blocking pool so store access never stalls the runtime.
//!
//! The `UNIQUE` constraint on `residents.owner_id` is the only guard against
//! two concurrent creates for the same owner. A violation surfaces as
//! `StoreError::UniqueViolation`.
//!
//! `visitors.user_id` is a plain column, not a foreign key: a resident can be
//! deleted locally while visitors they hosted stay on record, and a visitor may
//! name a host that was never stored. The listing joins hosts leniently.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::StoreError;
use crate::types::{NewVisitor, Resident, Visitor};

// Databases created before visitors dropped their foreign key still declare
// it, so enforcement is switched off per connection.
const SCHEMA: &str = "
PRAGMA foreign_keys = OFF;
CREATE TABLE IF NOT EXISTS residents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id TEXT NOT NULL UNIQUE,
    full_name TEXT NOT NULL,
    email TEXT,
    vendor_person_id TEXT,
    vendor_person_code TEXT
);
CREATE TABLE IF NOT EXISTS visitors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER,
    visitor_name TEXT,
    visit_start TEXT,
    visit_end TEXT,
    vendor_visitor_id TEXT,
    qr_code TEXT
);
";

const RESIDENT_COLUMNS: &str =
    "id, owner_id, full_name, email, vendor_person_id, vendor_person_code";

#[async_trait]
pub trait ResidentStore: Send + Sync {
    /// Insert a pending resident (no vendor identifiers).
    async fn insert_resident(
        &self,
        owner_id: &str,
        full_name: &str,
        email: Option<&str>,
    ) -> Result<Resident, StoreError>;

    async fn get_resident_by_owner(&self, owner_id: &str) -> Result<Option<Resident>, StoreError>;

    /// Fails with `NotFound` when no row exists for `owner_id`.
    async fn update_resident_sync_fields(
        &self,
        owner_id: &str,
        vendor_person_id: &str,
        vendor_person_code: &str,
    ) -> Result<(), StoreError>;

    /// Returns whether a row was removed.
    async fn delete_resident(&self, owner_id: &str) -> Result<bool, StoreError>;

    async fn list_residents(&self) -> Result<Vec<Resident>, StoreError>;
}

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        tracing::debug!("store schema ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<F, R>(&self, op: F) -> Result<R, StoreError>
    where
        F: FnOnce(&Connection) -> Result<R, StoreError> + Send + 'static,
        R: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| StoreError::Poisoned)?;
            op(&guard)
        })
        .await?
    }

    pub async fn insert_visitor(&self, visitor: NewVisitor) -> Result<Visitor, StoreError> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO visitors (user_id, visitor_name, visit_start, visit_end)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    visitor.user_id,
                    visitor.visitor_name,
                    visitor.visit_start,
                    visitor.visit_end
                ],
            )?;
            Ok(Visitor {
                id: conn.last_insert_rowid(),
                user_id: visitor.user_id,
                visitor_name: visitor.visitor_name,
                visit_start: visitor.visit_start,
                visit_end: visitor.visit_end,
                vendor_visitor_id: None,
                qr_code: None,
                host_name: None,
            })
        })
        .await
    }

    /// All visitors, each with the full name of its host when the host
    /// still exists.
    pub async fn list_visitors(&self) -> Result<Vec<Visitor>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT v.id, v.user_id, v.visitor_name, v.visit_start, v.visit_end,
                        v.vendor_visitor_id, v.qr_code, r.full_name
                 FROM visitors v
                 LEFT JOIN residents r ON v.user_id = r.id
                 ORDER BY v.id",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(Visitor {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    visitor_name: row.get(2)?,
                    visit_start: row.get(3)?,
                    visit_end: row.get(4)?,
                    vendor_visitor_id: row.get(5)?,
                    qr_code: row.get(6)?,
                    host_name: row.get(7)?,
                })
            })?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }
}

fn resident_from_row(row: &Row<'_>) -> rusqlite::Result<Resident> {
    Ok(Resident {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        full_name: row.get(2)?,
        email: row.get(3)?,
        vendor_person_id: row.get(4)?,
        vendor_person_code: row.get(5)?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

#[async_trait]
impl ResidentStore for SqliteStore {
    async fn insert_resident(
        &self,
        owner_id: &str,
        full_name: &str,
        email: Option<&str>,
    ) -> Result<Resident, StoreError> {
        let owner_id = owner_id.to_string();
        let full_name = full_name.to_string();
        let email = email.map(str::to_string);
        self.with_conn(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO residents (owner_id, full_name, email) VALUES (?1, ?2, ?3)",
                params![owner_id, full_name, email],
            );
            match inserted {
                Ok(_) => {}
                Err(err) if is_unique_violation(&err) => {
                    return Err(StoreError::UniqueViolation(owner_id));
                }
                Err(err) => return Err(err.into()),
            }
            Ok(Resident {
                id: conn.last_insert_rowid(),
                owner_id,
                full_name,
                email,
                vendor_person_id: None,
                vendor_person_code: None,
            })
        })
        .await
    }

    async fn get_resident_by_owner(&self, owner_id: &str) -> Result<Option<Resident>, StoreError> {
        let owner_id = owner_id.to_string();
        self.with_conn(move |conn| {
            let resident = conn
                .query_row(
                    &format!("SELECT {RESIDENT_COLUMNS} FROM residents WHERE owner_id = ?1"),
                    params![owner_id],
                    resident_from_row,
                )
                .optional()?;
            Ok(resident)
        })
        .await
    }

    async fn update_resident_sync_fields(
        &self,
        owner_id: &str,
        vendor_person_id: &str,
        vendor_person_code: &str,
    ) -> Result<(), StoreError> {
        let owner_id = owner_id.to_string();
        let person_id = vendor_person_id.to_string();
        let person_code = vendor_person_code.to_string();
        self.with_conn(move |conn| {
            let updated = conn.execute(
                "UPDATE residents SET vendor_person_id = ?1, vendor_person_code = ?2
                 WHERE owner_id = ?3",
                params![person_id, person_code, owner_id],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound(owner_id));
            }
            Ok(())
        })
        .await
    }

    async fn delete_resident(&self, owner_id: &str) -> Result<bool, StoreError> {
        let owner_id = owner_id.to_string();
        self.with_conn(move |conn| {
            let deleted = conn.execute("DELETE FROM residents WHERE owner_id = ?1", params![owner_id])?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn list_residents(&self) -> Result<Vec<Resident>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {RESIDENT_COLUMNS} FROM residents ORDER BY id"))?;
            let rows = stmt.query_map([], resident_from_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }
}
