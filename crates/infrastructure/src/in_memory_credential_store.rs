use async_trait::async_trait;
use matchdesk_application::{CredentialStore, PersistedSession};
use matchdesk_core::{AppError, AppResult};
use matchdesk_domain::{SessionUser, TokenPair};
use tokio::sync::RwLock;

/// Process-local credential store.
///
/// Used when no durable location is configured; a new process starts anonymous.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    entries: RwLock<PersistedSession>,
}

impl InMemoryCredentialStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn load(&self) -> AppResult<PersistedSession> {
        Ok(self.entries.read().await.clone())
    }

    async fn save_session(&self, tokens: &TokenPair, user: &SessionUser) -> AppResult<()> {
        let user_payload = serde_json::to_string(user).map_err(|error| {
            AppError::Storage(format!("failed to serialize cached user: {error}"))
        })?;

        *self.entries.write().await = PersistedSession {
            access_token: Some(tokens.access_token().to_owned()),
            refresh_token: Some(tokens.refresh_token().to_owned()),
            user_payload: Some(user_payload),
        };

        Ok(())
    }

    async fn save_tokens(&self, tokens: &TokenPair) -> AppResult<()> {
        let mut entries = self.entries.write().await;
        entries.access_token = Some(tokens.access_token().to_owned());
        entries.refresh_token = Some(tokens.refresh_token().to_owned());
        Ok(())
    }

    async fn save_user(&self, user: &SessionUser) -> AppResult<()> {
        let user_payload = serde_json::to_string(user).map_err(|error| {
            AppError::Storage(format!("failed to serialize cached user: {error}"))
        })?;

        self.entries.write().await.user_payload = Some(user_payload);
        Ok(())
    }

    async fn clear(&self) -> AppResult<()> {
        *self.entries.write().await = PersistedSession::default();
        Ok(())
    }
}
