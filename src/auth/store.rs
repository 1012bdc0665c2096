//! Durable mirrors for the bot's [Credential].
use super::creds::Credential;
use super::error::StoreError;
use std::path::PathBuf;
use std::sync::Mutex;

/// The persistence contract the [TokenManager](super::access::TokenManager)
/// writes through on every credential change.
///
/// `load` returns `None` when the backing medium holds nothing yet. A purge
/// is a `save` of [Credential::empty].
#[async_trait::async_trait]
pub trait TokenStore: std::fmt::Debug + Send + Sync {
    async fn load(&self) -> Result<Option<Credential>, StoreError>;
    async fn save(&self, creds: &Credential) -> Result<(), StoreError>;
}

/// Keeps the credential for the lifetime of the process only.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<Credential>>,
}

/// Mirrors the credential as JSON on disk.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
}

/// Mirrors the credential as JSON in an environment variable of this
/// process. Writes do not outlive the process; the variable is expected to
/// be seeded by the deployment environment.
#[derive(Debug)]
pub struct EnvTokenStore {
    var: String,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> Result<Option<Credential>, StoreError> {
        Ok(self.slot.lock().unwrap().clone())
    }
    async fn save(&self, creds: &Credential) -> Result<(), StoreError> {
        *self.slot.lock().unwrap() = Some(creds.clone());
        Ok(())
    }
}

impl FileTokenStore {
    #[must_use]
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// The store path used when none is given on the command line:
    /// `~/.larbin/tokens.json`, falling back to the working directory when
    /// no home directory can be resolved.
    #[must_use]
    pub fn default_path() -> PathBuf {
        home::home_dir()
            .map(|dir| dir.join(".larbin"))
            .unwrap_or_default()
            .join("tokens.json")
    }
}

#[async_trait::async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> Result<Option<Credential>, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
    async fn save(&self, creds: &Credential) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&self.path, serde_json::to_string(creds)?).await?;
        Ok(())
    }
}

impl EnvTokenStore {
    #[must_use]
    pub fn new<S: Into<String>>(var: S) -> Self {
        Self { var: var.into() }
    }
}

#[async_trait::async_trait]
impl TokenStore for EnvTokenStore {
    async fn load(&self) -> Result<Option<Credential>, StoreError> {
        match std::env::var(&self.var) {
            Ok(contents) if !contents.is_empty() => Ok(Some(serde_json::from_str(&contents)?)),
            _ => Ok(None),
        }
    }
    async fn save(&self, creds: &Credential) -> Result<(), StoreError> {
        std::env::set_var(&self.var, serde_json::to_string(creds)?);
        Ok(())
    }
}
