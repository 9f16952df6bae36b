//! Process configuration, resolved once at startup.
//!
//! # Design
//! Values are read through a lookup closure rather than `std::env` directly,
//! so tests can resolve a configuration from a plain map. The result is an
//! immutable value handed to `VendorClient::new` by reference; nothing in the
//! signing or request path reads the environment.
//!
//! A `.env` file fills in names the process environment leaves unset; the
//! environment always wins.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "https://127.0.0.1:443";
pub const DEFAULT_ORG_INDEX_CODE: &str = "root000000";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DATABASE_PATH: &str = "database.sqlite";

/// Credentials and transport policy for the vendor platform.
#[derive(Clone, PartialEq, Eq)]
pub struct VendorConfig {
    pub base_url: String,
    pub app_key: String,
    pub app_secret: String,
    /// TLS certificate verification. Only lab deployments with self-signed
    /// certificates turn this off.
    pub verify_tls: bool,
    /// Organization new persons are filed under.
    pub org_index_code: String,
}

impl VendorConfig {
    pub fn new(base_url: &str, app_key: &str, app_secret: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            app_key: app_key.to_string(),
            app_secret: app_secret.to_string(),
            verify_tls: true,
            org_index_code: DEFAULT_ORG_INDEX_CODE.to_string(),
        }
    }
}

// The secret stays out of logs and panic messages.
impl std::fmt::Debug for VendorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VendorConfig")
            .field("base_url", &self.base_url)
            .field("app_key", &self.app_key)
            .field("app_secret", &"<redacted>")
            .field("verify_tls", &self.verify_tls)
            .field("org_index_code", &self.org_index_code)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub database_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub vendor: VendorConfig,
    pub server: ServerConfig,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like `from_env`, falling back to `path` (usually `.env`) for unset
    /// names. A missing file is not an error.
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_lookup_and_file(|name| std::env::var(name).ok(), path.as_ref())
    }

    fn from_lookup_and_file<F>(lookup: F, path: &Path) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = read_env_file(path)?;
        if !file.is_empty() {
            tracing::debug!(path = %path.display(), entries = file.len(), "loaded env file");
        }
        Self::from_lookup(|name| lookup(name).or_else(|| file.get(name).cloned()))
    }

    /// Resolve configuration from any name → value lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let base_url = get("HIK_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let app_key = get("HIK_APP_KEY").unwrap_or_default();
        let app_secret = get("HIK_APP_SECRET").unwrap_or_default();
        if app_key.is_empty() || app_secret.is_empty() {
            tracing::warn!("HIK_APP_KEY or HIK_APP_SECRET is not set; vendor calls will fail authentication");
        }

        let mut vendor = VendorConfig::new(&base_url, &app_key, &app_secret);
        vendor.verify_tls = get("HIK_VERIFY_SSL").map_or(true, |value| parse_flag(&value));
        if let Some(code) = get("HIK_ORG_INDEX_CODE") {
            vendor.org_index_code = code;
        }

        let port = match get("PORT") {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { name: "PORT", value })?,
            None => DEFAULT_PORT,
        };
        let database_path = get("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH));

        Ok(Self {
            vendor,
            server: ServerConfig { port, database_path },
        })
    }
}

fn read_env_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let env_file_error = |err: dotenvy::Error| ConfigError::EnvFile {
        path: path.display().to_string(),
        reason: err.to_string(),
    };
    match dotenvy::from_path_iter(path) {
        Ok(entries) => entries.collect::<Result<_, _>>().map_err(env_file_error),
        Err(err) if err.not_found() => Ok(HashMap::new()),
        Err(err) => Err(env_file_error(err)),
    }
}

/// Anything other than an explicit "off" keeps verification enabled.
fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "false" | "0" | "no" | "off"
    )
}
