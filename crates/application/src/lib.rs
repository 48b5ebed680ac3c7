//! Application services and ports.

#![forbid(unsafe_code)]

mod call_outcome;
mod permission_manifest_service;
mod session_ports;
mod session_service;
mod workspace_service;

pub use call_outcome::CallOutcome;
pub use permission_manifest_service::PermissionManifestService;
pub use session_ports::{
    AuthApi, AuthSession, CredentialStore, LoginCredentials, Notification, NotificationLevel,
    Notifier, PersistedSession, RegisterPayload, storage_keys,
};
pub use session_service::{PasswordResetOutcome, SessionPhase, SessionService, SessionSnapshot};
pub use workspace_service::{RouteDecision, WorkspaceService};
