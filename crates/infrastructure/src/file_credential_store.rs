use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use matchdesk_application::{CredentialStore, PersistedSession, storage_keys};
use matchdesk_core::{AppError, AppResult};
use matchdesk_domain::{SessionUser, TokenPair};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

type Entries = BTreeMap<String, String>;

/// Credential store persisted as one JSON object on disk.
///
/// Every write goes through a sibling temporary file and a rename, so
/// readers see either the previous key set or the new one.
pub struct FileCredentialStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCredentialStore {
    /// Creates a store backed by `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temporary_path(&self) -> PathBuf {
        let mut file_name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        file_name.push(".tmp");
        self.path.with_file_name(file_name)
    }

    async fn read_entries(&self) -> AppResult<Entries> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Entries::new()),
            Err(error) => {
                return Err(AppError::Storage(format!(
                    "failed to read credential file '{}': {error}",
                    self.path.display()
                )));
            }
        };

        serde_json::from_slice(&bytes).map_err(|error| {
            AppError::Storage(format!(
                "failed to parse credential file '{}': {error}",
                self.path.display()
            ))
        })
    }

    async fn write_entries(&self, entries: &Entries) -> AppResult<()> {
        if entries.is_empty() {
            return self.remove_file().await;
        }

        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|error| {
                AppError::Storage(format!(
                    "failed to create credential directory '{}': {error}",
                    parent.display()
                ))
            })?;
        }

        let payload = serde_json::to_vec_pretty(entries).map_err(|error| {
            AppError::Storage(format!("failed to serialize credentials: {error}"))
        })?;

        let temporary_path = self.temporary_path();
        fs::write(&temporary_path, payload).await.map_err(|error| {
            AppError::Storage(format!(
                "failed to write credential file '{}': {error}",
                temporary_path.display()
            ))
        })?;

        fs::rename(&temporary_path, &self.path)
            .await
            .map_err(|error| {
                AppError::Storage(format!(
                    "failed to replace credential file '{}': {error}",
                    self.path.display()
                ))
            })
    }

    async fn remove_file(&self) -> AppResult<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(AppError::Storage(format!(
                "failed to remove credential file '{}': {error}",
                self.path.display()
            ))),
        }
    }
}

fn serialize_user(user: &SessionUser) -> AppResult<String> {
    serde_json::to_string(user)
        .map_err(|error| AppError::Storage(format!("failed to serialize cached user: {error}")))
}

fn insert_tokens(entries: &mut Entries, tokens: &TokenPair) {
    entries.insert(
        storage_keys::ACCESS_TOKEN.to_owned(),
        tokens.access_token().to_owned(),
    );
    entries.insert(
        storage_keys::REFRESH_TOKEN.to_owned(),
        tokens.refresh_token().to_owned(),
    );
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> AppResult<PersistedSession> {
        let mut entries = self.read_entries().await?;

        Ok(PersistedSession {
            access_token: entries.remove(storage_keys::ACCESS_TOKEN),
            refresh_token: entries.remove(storage_keys::REFRESH_TOKEN),
            user_payload: entries.remove(storage_keys::USER),
        })
    }

    async fn save_session(&self, tokens: &TokenPair, user: &SessionUser) -> AppResult<()> {
        let mut entries = Entries::new();
        insert_tokens(&mut entries, tokens);
        entries.insert(storage_keys::USER.to_owned(), serialize_user(user)?);

        let _guard = self.write_lock.lock().await;
        self.write_entries(&entries).await
    }

    async fn save_tokens(&self, tokens: &TokenPair) -> AppResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.read_entries().await?;
        insert_tokens(&mut entries, tokens);
        self.write_entries(&entries).await
    }

    async fn save_user(&self, user: &SessionUser) -> AppResult<()> {
        let payload = serialize_user(user)?;

        let _guard = self.write_lock.lock().await;
        let mut entries = self.read_entries().await?;
        entries.insert(storage_keys::USER.to_owned(), payload);
        self.write_entries(&entries).await
    }

    async fn clear(&self) -> AppResult<()> {
        let _guard = self.write_lock.lock().await;
        self.remove_file().await?;
        debug!(path = %self.path.display(), "credential file cleared");
        Ok(())
    }
}
