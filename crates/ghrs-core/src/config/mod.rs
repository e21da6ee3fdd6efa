use crate::error::{GhrsError, Result};
use config::{Config, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GhrsConfig {
    #[serde(default)]
    pub portal: PortalConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Query landing page. The first GET of the authentication chain goes here.
    #[serde(default = "default_entry_url")]
    pub entry_url: String,
    /// Origin of the single sign-on host that receives HTTP Basic credentials.
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Extra PEM root certificate trusted on top of the system store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<String>,
    #[serde(default = "default_accept_language")]
    pub accept_language: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            entry_url: default_entry_url(),
            auth_url: default_auth_url(),
            timeout_secs: default_timeout_secs(),
            ca_cert: None,
            accept_language: default_accept_language(),
            user_agent: default_user_agent(),
        }
    }
}

/// Defaults for the two query filter keys, used when the caller gives none.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_center: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default = "default_credential_store")]
    pub store: String,
    /// Custom path for the credentials file. Defaults to `~/.config/ghrs/credentials.toml`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default = "default_user_env")]
    pub user_env: String,
    #[serde(default = "default_password_env")]
    pub password_env: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            store: default_credential_store(),
            path: None,
            user_env: default_user_env(),
            password_env: default_password_env(),
        }
    }
}

/// Valid credential store names.
pub const VALID_CREDENTIAL_STORES: &[&str] = &["file", "env"];

// -- Defaults --

fn default_entry_url() -> String {
    "https://hcms.saipemnet.saipem.intranet/psc/GHRS_3/EMPLOYEE/PSFT_HR/q/\
     ?ICAction=ICQryNameURL=PUBLIC.SA_REPORT_TS_XSIGHT_ITA"
        .to_string()
}
fn default_auth_url() -> String {
    "https://wam.saipem.com".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_accept_language() -> String {
    "en".to_string()
}
fn default_user_agent() -> String {
    concat!("ghrs/", env!("CARGO_PKG_VERSION")).to_string()
}
fn default_credential_store() -> String {
    "file".to_string()
}
fn default_user_env() -> String {
    "GHRS_USER".to_string()
}
fn default_password_env() -> String {
    "GHRS_PASSWORD".to_string()
}

impl GhrsConfig {
    /// Load configuration with three-layer TOML merge:
    /// 1. ~/.config/ghrs/config.toml (global)
    /// 2. .ghrs/config.toml (project)
    /// 3. .ghrs/config.local.toml (local, gitignored)
    pub fn load(project_dir: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        // Layer 1: Global config
        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                builder = builder.add_source(File::from(global_path).required(false));
            }
        }

        // Layer 2: Project config
        if let Some(dir) = project_dir {
            let project_config = dir.join(".ghrs").join("config.toml");
            if project_config.exists() {
                builder = builder.add_source(File::from(project_config).required(false));
            }

            // Layer 3: Local config (gitignored)
            let local_config = dir.join(".ghrs").join("config.local.toml");
            if local_config.exists() {
                builder = builder.add_source(File::from(local_config).required(false));
            }
        }

        let config = builder
            .build()
            .map_err(|e| GhrsError::Config(e.to_string()))?;

        let mut cfg: Self = config
            .try_deserialize()
            .map_err(|e| GhrsError::Config(e.to_string()))?;

        cfg.validate();
        Ok(cfg)
    }

    /// Load with defaults only (no files).
    pub fn default_config() -> Self {
        Self {
            portal: PortalConfig::default(),
            query: QueryConfig::default(),
            credentials: CredentialsConfig::default(),
        }
    }

    /// Validate config values, replacing unusable ones and logging warnings.
    /// URLs are only reported here; building the authenticator rejects them.
    pub fn validate(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();

        for (name, url) in [
            ("portal.entry_url", &self.portal.entry_url),
            ("portal.auth_url", &self.portal.auth_url),
        ] {
            if let Err(e) = reqwest::Url::parse(url) {
                warnings.push(format!("{name} = '{url}' is not a valid URL: {e}"));
            }
        }

        if self.portal.timeout_secs == 0 {
            warnings.push(format!(
                "portal.timeout_secs = 0, setting to {}",
                default_timeout_secs()
            ));
            self.portal.timeout_secs = default_timeout_secs();
        }

        if !VALID_CREDENTIAL_STORES.contains(&self.credentials.store.as_str()) {
            warnings.push(format!(
                "unknown credential store '{}', valid: {}; using 'file'",
                self.credentials.store,
                VALID_CREDENTIAL_STORES.join(", ")
            ));
            self.credentials.store = default_credential_store();
        }

        for w in &warnings {
            tracing::warn!("config: {}", w);
        }

        warnings
    }

    /// Path of the credentials file, honouring `credentials.path`.
    pub fn credentials_path(&self) -> Option<PathBuf> {
        match &self.credentials.path {
            Some(p) if !p.is_empty() => Some(PathBuf::from(p)),
            _ => config_dir().map(|d| d.join("credentials.toml")),
        }
    }
}

/// `~/.config/ghrs` (platform equivalent).
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("ghrs"))
}

fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join("config.toml"))
}
