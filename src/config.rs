// config lets you read a separate config file, with environment overrides on top
use ::config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

use crate::error::{GdstoreError, Result};

pub const ENV_PREFIX: &str = "GDSTORE";

fn default_endpoint() -> String {
    "https://www.googleapis.com".to_string()
}
fn default_api_version() -> String {
    "v1beta2".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn present(setting: &Option<String>) -> bool {
    setting.as_deref().is_some_and(|s| !s.trim().is_empty())
}

/// Connection and credential settings for a datastore dataset.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub dataset_id: String,
    #[serde(default)]
    pub service_account: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// PEM file holding the service account's RSA key.
    #[serde(default)]
    pub private_key_file: Option<String>,
    /// OAuth endpoint the signed assertion is exchanged at.
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    /// Ready-made bearer token; when set no assertion is signed.
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dataset_id: String::new(),
            service_account: String::new(),
            scopes: Vec::new(),
            private_key_file: None,
            token_uri: default_token_uri(),
            access_token: None,
            endpoint: default_endpoint(),
            api_version: default_api_version(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl StoreConfig {
    /// Reads `path` when given (format inferred from the extension), then
    /// applies `GDSTORE_*` environment variables. `GDSTORE_SCOPES` is a comma
    /// separated list.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path));
        }
        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("scopes"),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Names every missing required parameter at once.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.dataset_id.trim().is_empty() {
            missing.push("dataset_id");
        }
        if self.service_account.trim().is_empty() {
            missing.push("service_account");
        }
        if self.scopes.is_empty() {
            missing.push("scopes");
        }
        if !present(&self.private_key_file) && !present(&self.access_token) {
            missing.push("private_key_file");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(GdstoreError::Config(format!(
                "incomplete datastore authentication details, missing {}",
                missing.join(", ")
            )))
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// URL of one API method for the configured dataset.
    pub fn method_url(&self, method: &str) -> String {
        format!(
            "{}/datastore/{}/datasets/{}/{}",
            self.endpoint.trim_end_matches('/'),
            self.api_version,
            self.dataset_id,
            method
        )
    }
}
