//! Portal credentials and where they are kept between runs.
//!
//! The store contract is small: `load` is idempotent and returns `None`
//! until something has been saved, and [`load_or_capture`] covers the
//! first run by asking the caller for a pair and persisting it.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::CredentialsConfig;
use crate::error::{GhrsError, Result};

/// Identifier/secret pair presented to the single sign-on host.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    identifier: String,
    secret: String,
}

impl Credentials {
    pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: secret.into(),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("secret", &"********")
            .finish()
    }
}

pub trait CredentialStore {
    /// Returns the stored pair, or `None` when nothing has been saved yet.
    fn load(&self) -> Result<Option<Credentials>>;

    fn save(&self, credentials: &Credentials) -> Result<()>;
}

/// TOML file holding `identifier` and `secret`.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the stored file. Missing files are not an error.
    pub fn clear(&self) -> Result<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<Credentials>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let credentials: Credentials = toml::from_str(&contents).map_err(|e| {
            GhrsError::Credentials(format!(
                "failed to parse {}: {e}",
                self.path.display()
            ))
        })?;
        Ok(Some(credentials))
    }

    fn save(&self, credentials: &Credentials) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(credentials)
            .map_err(|e| GhrsError::Credentials(format!("failed to serialize credentials: {e}")))?;
        write_private(&self.path, toml_str.as_bytes())?;
        tracing::debug!(path = %self.path.display(), "credentials saved");
        Ok(())
    }
}

/// Write `contents` to a file only the owner can read, from the first byte.
#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies on creation; an older file keeps its bits otherwise.
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    file.write_all(contents)?;
    Ok(())
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    std::fs::write(path, contents)?;
    Ok(())
}

/// Reads the pair from two environment variables. Read-only.
#[derive(Debug, Clone)]
pub struct EnvCredentialStore {
    user_var: String,
    password_var: String,
}

impl EnvCredentialStore {
    pub fn new(user_var: impl Into<String>, password_var: impl Into<String>) -> Self {
        Self {
            user_var: user_var.into(),
            password_var: password_var.into(),
        }
    }
}

impl CredentialStore for EnvCredentialStore {
    fn load(&self) -> Result<Option<Credentials>> {
        let user = std::env::var(&self.user_var).ok().filter(|v| !v.is_empty());
        let password = std::env::var(&self.password_var).ok();
        match (user, password) {
            (Some(user), Some(password)) => Ok(Some(Credentials::new(user, password))),
            _ => Ok(None),
        }
    }

    fn save(&self, _credentials: &Credentials) -> Result<()> {
        Err(GhrsError::Credentials(format!(
            "environment credentials are read-only (set {} and {})",
            self.user_var, self.password_var
        )))
    }
}

/// Enum wrapper over the configured store kinds.
#[derive(Debug, Clone)]
pub enum Store {
    File(FileCredentialStore),
    Env(EnvCredentialStore),
}

impl CredentialStore for Store {
    fn load(&self) -> Result<Option<Credentials>> {
        match self {
            Store::File(s) => s.load(),
            Store::Env(s) => s.load(),
        }
    }

    fn save(&self, credentials: &Credentials) -> Result<()> {
        match self {
            Store::File(s) => s.save(credentials),
            Store::Env(s) => s.save(credentials),
        }
    }
}

/// Build the store named by `[credentials]`.
pub fn create_store(config: &CredentialsConfig, default_path: Option<PathBuf>) -> Result<Store> {
    match config.store.as_str() {
        "env" => Ok(Store::Env(EnvCredentialStore::new(
            &config.user_env,
            &config.password_env,
        ))),
        "file" => {
            let path = config
                .path
                .as_ref()
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .or(default_path)
                .ok_or_else(|| {
                    GhrsError::Config("cannot determine credentials file location".to_string())
                })?;
            Ok(Store::File(FileCredentialStore::new(path)))
        }
        other => Err(GhrsError::Config(format!(
            "unknown credential store: '{other}' (expected 'file' or 'env')"
        ))),
    }
}

/// Load stored credentials, or obtain them from `capture` and save them.
pub fn load_or_capture<S, F>(store: &S, capture: F) -> Result<Credentials>
where
    S: CredentialStore + ?Sized,
    F: FnOnce() -> Result<Credentials>,
{
    if let Some(credentials) = store.load()? {
        return Ok(credentials);
    }
    let credentials = capture()?;
    if credentials.identifier().is_empty() {
        return Err(GhrsError::Credentials("empty user id".to_string()));
    }
    store.save(&credentials)?;
    tracing::info!(user = credentials.identifier(), "stored new portal credentials");
    Ok(credentials)
}
