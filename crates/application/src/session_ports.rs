//! Ports consumed by the session engine.
//!
//! The HTTP helper, durable client storage and the notification surface are
//! collaborators; adapters live in the infrastructure crate.

use async_trait::async_trait;
use serde::Serialize;

use matchdesk_core::AppResult;
use matchdesk_domain::{PermissionManifest, SessionUser, TokenPair};

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Username/password pair posted to the login endpoint.
#[derive(Clone, Serialize)]
pub struct LoginCredentials {
    /// Login name.
    pub username: String,
    /// Plaintext password.
    pub password: String,
}

impl LoginCredentials {
    /// Creates login credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Payload posted to the registration endpoint.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPayload {
    /// Requested login name.
    pub username: String,
    /// Plaintext password.
    pub password: String,
    /// Contact email.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Preferred display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Identity and credentials returned by login and registration.
#[derive(Debug, Clone)]
pub struct AuthSession {
    /// Authenticated user as reported by the backend.
    pub user: SessionUser,
    /// Freshly issued token pair.
    pub tokens: TokenPair,
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// Backend authentication endpoints.
///
/// Implementations map an HTTP 401 on authenticated reads to
/// `AppError::Unauthorized`, refusals to `AppError::Rejected`, transport
/// failures to `AppError::Unavailable` and undecodable bodies to
/// `AppError::InvalidPayload`.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchanges credentials for an identity and token pair.
    async fn login(&self, credentials: &LoginCredentials) -> AppResult<AuthSession>;

    /// Creates an account and signs it in.
    async fn register(&self, payload: &RegisterPayload) -> AppResult<AuthSession>;

    /// Exchanges a refresh token for a new token pair.
    async fn refresh(&self, refresh_token: &str) -> AppResult<TokenPair>;

    /// Requests a password reset email. Returns the backend message, if any.
    async fn request_password_reset(&self, email: &str) -> AppResult<Option<String>>;

    /// Reads the current profile. `None` when the backend sent no user.
    async fn fetch_current_user(&self, access_token: &str) -> AppResult<Option<SessionUser>>;

    /// Reads the role to permission manifest.
    async fn fetch_permission_manifest(&self, access_token: &str) -> AppResult<PermissionManifest>;
}

// ---------------------------------------------------------------------------
// Durable storage
// ---------------------------------------------------------------------------

/// Logical storage keys.
pub mod storage_keys {
    /// Bearer access token.
    pub const ACCESS_TOKEN: &str = "auth_token";
    /// Refresh token.
    pub const REFRESH_TOKEN: &str = "refresh_token";
    /// Serialized cached user.
    pub const USER: &str = "user_info";
}

/// Raw values read from durable storage.
///
/// The user is kept as its serialized form so a corrupt entry can be
/// discarded by the session instead of failing the whole read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedSession {
    /// Stored access token.
    pub access_token: Option<String>,
    /// Stored refresh token.
    pub refresh_token: Option<String>,
    /// Stored user JSON.
    pub user_payload: Option<String>,
}

/// Durable client storage for credentials and the cached user.
///
/// Every write method replaces its whole key set in one step.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Reads all persisted entries.
    async fn load(&self) -> AppResult<PersistedSession>;

    /// Writes tokens and user together.
    async fn save_session(&self, tokens: &TokenPair, user: &SessionUser) -> AppResult<()>;

    /// Writes only the two token entries.
    async fn save_tokens(&self, tokens: &TokenPair) -> AppResult<()>;

    /// Writes only the cached user.
    async fn save_user(&self, user: &SessionUser) -> AppResult<()>;

    /// Removes tokens and user.
    async fn clear(&self) -> AppResult<()>;
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// Toast severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    /// Completed action.
    Success,
    /// Failed action.
    Error,
}

/// User-facing toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Toast severity.
    pub level: NotificationLevel,
    /// Short heading.
    pub title: String,
    /// Body text.
    pub message: String,
}

/// Notification surface.
pub trait Notifier: Send + Sync {
    /// Shows a toast.
    fn notify(&self, notification: Notification);
}
