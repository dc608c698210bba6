/// `load_config` module: Loads the static YAML delivery config, with environment fallback for the credentials.
///
/// This module is the only place where the user-supplied YAML is parsed and mapped to strongly-typed structs.
///
/// # Responsibilities
/// - Parse the config file into a [`DeliveryConfig`] (bucket, region, key root, dashboard files)
/// - Resolve the access key pair from the file's `credentials` section, falling back to
///   `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` in the environment (a `.env` is loaded by `main`)
/// - Fail with a [`ConfigError`] before any upload when anything required is missing
///
/// The loaded value is passed explicitly into the uploader; nothing here is global.
use s3_delivery_core::destination::DEFAULT_ROOT;
use s3_delivery_core::{ConfigError, Dataset};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const DEFAULT_CONFIG_FILE: &str = "s3-delivery.yaml";
pub const DEFAULT_BUCKET: &str = "symphony-client-shared-atlanta-ga";
pub const DEFAULT_REGION: &str = "us-east-1";

pub const ACCESS_KEY_ENV: &str = "AWS_ACCESS_KEY_ID";
pub const SECRET_KEY_ENV: &str = "AWS_SECRET_ACCESS_KEY";

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// A predefined dashboard workbook delivered by `upload-dashboard`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DashboardFile {
    pub path: PathBuf,
    pub dataset: Dataset,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    pub credentials: Credentials,
    pub bucket: String,
    pub region: String,
    /// First segment of every destination key.
    pub root: String,
    pub dashboard: Vec<DashboardFile>,
}

#[derive(Debug, Default, Deserialize)]
struct CredentialsSection {
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    credentials: Option<CredentialsSection>,
    #[serde(default)]
    bucket: Option<String>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    root: Option<String>,
    #[serde(default)]
    dashboard: Vec<DashboardFile>,
}

/// Loads the YAML config file at `path` and resolves its credentials.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<DeliveryConfig, ConfigError> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    if !path_ref.exists() {
        error!(config_path = ?path_ref, "Configuration file not found");
        return Err(ConfigError::Missing(path_ref.to_path_buf()));
    }

    let config_content = fs::read_to_string(path_ref).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
        ConfigError::Read {
            path: path_ref.to_path_buf(),
            source: e,
        }
    })?;

    // An empty file deserializes to `null`; treat it like an empty mapping.
    let raw: RawConfig = if config_content.trim().is_empty() {
        RawConfig {
            credentials: None,
            bucket: None,
            region: None,
            root: None,
            dashboard: Vec::new(),
        }
    } else {
        serde_yaml::from_str(&config_content).map_err(|e| {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            ConfigError::Parse {
                path: path_ref.to_path_buf(),
                message: e.to_string(),
            }
        })?
    };

    let section = raw.credentials.unwrap_or_default();
    let access_key_id = resolve_secret(section.access_key_id, ACCESS_KEY_ENV)
        .ok_or_else(|| credentials_error(path_ref, "access_key_id"))?;
    let secret_access_key = resolve_secret(section.secret_access_key, SECRET_KEY_ENV)
        .ok_or_else(|| credentials_error(path_ref, "secret_access_key"))?;

    let config = DeliveryConfig {
        credentials: Credentials {
            access_key_id,
            secret_access_key,
        },
        bucket: non_blank(raw.bucket).unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
        region: non_blank(raw.region).unwrap_or_else(|| DEFAULT_REGION.to_string()),
        root: raw.root.unwrap_or_else(|| DEFAULT_ROOT.to_string()),
        dashboard: raw.dashboard,
    };
    info!(
        config_path = ?path_ref,
        bucket = %config.bucket,
        region = %config.region,
        dashboard_files = config.dashboard.len(),
        "Using credentials from config for S3 access"
    );
    Ok(config)
}

fn resolve_secret(from_file: Option<String>, env_var: &str) -> Option<String> {
    non_blank(from_file).or_else(|| non_blank(std::env::var(env_var).ok()))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn credentials_error(path: &Path, field: &'static str) -> ConfigError {
    error!(config_path = ?path, field, "AWS credentials not found or incomplete");
    ConfigError::Credentials {
        path: path.to_path_buf(),
        field,
    }
}
