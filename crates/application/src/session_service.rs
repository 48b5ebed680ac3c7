//! Session store: identity, credentials and derived permissions.
//!
//! Owns the session lifecycle (initialize, login, registration, refresh,
//! logout, dispose). No public operation returns an error; failures are
//! reported through boolean results and the snapshot's `error` field.
//!
//! Every operation that replaces the session bumps a generation counter.
//! Continuations capture the generation when they start and only commit
//! while it is still current, so a response that arrives after a logout or
//! a newer login is dropped.

mod credentials;
mod initialize;
mod refresh;

pub use refresh::PasswordResetOutcome;


use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use matchdesk_domain::{PermissionEvaluator, RolePermissionsMap, SessionUser, TokenPair};

use crate::{
    AuthApi, CredentialStore, Notification, NotificationLevel, Notifier, PermissionManifestService,
};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Lifecycle phase of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// `initialize` has not started.
    Uninitialized,
    /// `initialize` is restoring persisted state.
    Initializing,
    /// A user and token pair are held.
    Authenticated,
    /// No identity is held.
    Anonymous,
}

#[derive(Debug, Clone)]
struct AuthenticatedIdentity {
    user: SessionUser,
    tokens: TokenPair,
}

/// Point-in-time view of the session.
///
/// User and tokens are stored together, so a snapshot either has both or
/// neither.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    phase: SessionPhase,
    identity: Option<AuthenticatedIdentity>,
    is_loading: bool,
    is_initialized: bool,
    error: Option<String>,
    role_permissions: RolePermissionsMap,
    generation: u64,
}

impl SessionSnapshot {
    fn uninitialized(generation: u64) -> Self {
        Self {
            phase: SessionPhase::Uninitialized,
            identity: None,
            is_loading: false,
            is_initialized: false,
            error: None,
            role_permissions: RolePermissionsMap::default(),
            generation,
        }
    }

    fn anonymous(generation: u64) -> Self {
        Self {
            phase: SessionPhase::Anonymous,
            is_initialized: true,
            ..Self::uninitialized(generation)
        }
    }

    /// Returns the lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Returns the authenticated user.
    #[must_use]
    pub fn user(&self) -> Option<&SessionUser> {
        self.identity.as_ref().map(|identity| &identity.user)
    }

    /// Returns the held token pair.
    #[must_use]
    pub fn tokens(&self) -> Option<&TokenPair> {
        self.identity.as_ref().map(|identity| &identity.tokens)
    }

    /// Returns the bearer access token.
    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.tokens().map(TokenPair::access_token)
    }

    /// Returns whether an identity is held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    /// Returns whether an operation is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Returns whether route guards may act on this snapshot.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.is_initialized
    }

    /// Returns the last user-facing error.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns the role mapping used to normalize the current user.
    #[must_use]
    pub fn role_permissions(&self) -> &RolePermissionsMap {
        &self.role_permissions
    }

    /// Returns the generation this snapshot was taken at.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns a permission evaluator for the current user.
    #[must_use]
    pub fn evaluator(&self) -> PermissionEvaluator {
        PermissionEvaluator::for_user(self.user())
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Process-wide session service.
///
/// Call [`SessionService::initialize`] once at startup; consumers reading
/// before that observe [`SessionPhase::Uninitialized`].
/// [`SessionService::dispose`] drops in-memory state and keeps durable
/// storage for the next process.
#[derive(Clone)]
pub struct SessionService {
    auth_api: Arc<dyn AuthApi>,
    credential_store: Option<Arc<dyn CredentialStore>>,
    notifier: Arc<dyn Notifier>,
    manifest_service: Arc<PermissionManifestService>,
    state: Arc<RwLock<SessionSnapshot>>,
}

impl SessionService {
    /// Creates a session service.
    ///
    /// Without a credential store tokens live only in memory and
    /// `initialize` always ends anonymous.
    #[must_use]
    pub fn new(
        auth_api: Arc<dyn AuthApi>,
        credential_store: Option<Arc<dyn CredentialStore>>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let manifest_service = Arc::new(PermissionManifestService::new(auth_api.clone()));

        Self {
            auth_api,
            credential_store,
            notifier,
            manifest_service,
            state: Arc::new(RwLock::new(SessionSnapshot::uninitialized(0))),
        }
    }

    /// Returns the current session state.
    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.read().await.clone()
    }

    /// Returns a permission evaluator for the current user.
    pub async fn permissions(&self) -> PermissionEvaluator {
        self.state.read().await.evaluator()
    }

    /// Returns the manifest loader shared with this session.
    #[must_use]
    pub fn manifest_service(&self) -> &PermissionManifestService {
        &self.manifest_service
    }

    /// Resets in-memory state and persisted credentials to anonymous.
    ///
    /// Safe to call from any state and more than once.
    pub async fn logout(&self) {
        self.reset_to_anonymous().await;
    }

    /// Logs out and shows a confirmation toast.
    ///
    /// When stored credentials could not be removed the toast is an error,
    /// since they would be restored on the next start.
    pub async fn sign_out(&self) {
        let notification = if self.reset_to_anonymous().await {
            Notification {
                level: NotificationLevel::Success,
                title: "Signed out".to_owned(),
                message: "You have been signed out securely.".to_owned(),
            }
        } else {
            Notification {
                level: NotificationLevel::Error,
                title: "Sign-out incomplete".to_owned(),
                message: "Stored credentials could not be removed from this device.".to_owned(),
            }
        };
        self.notifier.notify(notification);
    }

    /// Drops in-memory state back to `Uninitialized`.
    ///
    /// Durable storage is untouched; in-flight operations are discarded.
    pub async fn dispose(&self) {
        let mut state = self.state.write().await;
        let generation = state.generation.wrapping_add(1);
        *state = SessionSnapshot::uninitialized(generation);
        self.manifest_service.reset().await;
    }

    /// Returns whether persisted credentials were cleared.
    async fn reset_to_anonymous(&self) -> bool {
        let mut state = self.state.write().await;
        let was_authenticated = state.is_authenticated();
        let generation = state.generation.wrapping_add(1);
        *state = SessionSnapshot::anonymous(generation);
        // Same critical section as the generation bump, so a login that
        // observes the new generation also observes the reset manifest.
        self.manifest_service.reset().await;

        let mut cleared = true;
        if let Some(store) = &self.credential_store
            && let Err(error) = store.clear().await
        {
            warn!(error = %error, "failed to clear persisted credentials");
            cleared = false;
        }

        if was_authenticated {
            info!("session signed out");
        }
        cleared
    }

    /// Clears the user-facing error.
    pub async fn clear_error(&self) {
        self.state.write().await.error = None;
    }

    /// Overrides the loading flag.
    pub async fn set_loading(&self, loading: bool) {
        self.state.write().await.is_loading = loading;
    }

    /// Replaces the authenticated user's profile.
    ///
    /// Permissions are normalized against the role mapping. Returns `false`
    /// when no session is held, since a user without tokens is not a valid
    /// session.
    pub async fn set_user(&self, user: SessionUser) -> bool {
        let mut state = self.state.write().await;
        let user = resolve_user_permissions(user, None, &state.role_permissions);

        let Some(identity) = state.identity.as_mut() else {
            return false;
        };

        if let Some(store) = &self.credential_store
            && let Err(error) = store.save_user(&user).await
        {
            warn!(error = %error, "failed to persist updated user profile");
        }

        identity.user = user;
        true
    }

    /// Loads the permission manifest with the current or persisted access token.
    ///
    /// Returns `None` when the fetch failed; the previous mapping stays in use.
    pub async fn load_permission_manifest(&self, force: bool) -> Option<RolePermissionsMap> {
        let (generation, access_token) = {
            let state = self.state.read().await;
            (state.generation, state.access_token().map(ToOwned::to_owned))
        };

        let access_token = match access_token {
            Some(token) => Some(token),
            None => self.persisted_access_token().await,
        };

        let role_permissions = self
            .manifest_service
            .load(access_token.as_deref(), force)
            .await?;

        let mut state = self.state.write().await;
        if state.generation == generation {
            state.role_permissions = role_permissions.clone();
        }

        Some(role_permissions)
    }

    async fn persisted_access_token(&self) -> Option<String> {
        let store = self.credential_store.as_ref()?;
        match store.load().await {
            Ok(persisted) => persisted.access_token,
            Err(error) => {
                warn!(error = %error, "failed to read persisted credentials");
                None
            }
        }
    }

    /// Loads the manifest and returns the best known mapping.
    async fn role_permissions_after_load(
        &self,
        access_token: &str,
        force: bool,
    ) -> RolePermissionsMap {
        match self.manifest_service.load(Some(access_token), force).await {
            Some(role_permissions) => role_permissions,
            None => self.manifest_service.role_permissions().await,
        }
    }
}

/// Picks the permission set for an incoming user.
///
/// Precedence: the user's own non-empty set, then the previous user's
/// non-empty set, then the role defaults from the manifest.
pub(crate) fn resolve_user_permissions(
    user: SessionUser,
    previous: Option<&SessionUser>,
    role_permissions: &RolePermissionsMap,
) -> SessionUser {
    if !user.permissions().is_empty() {
        return user;
    }

    if let Some(previous) = previous.filter(|previous| !previous.permissions().is_empty()) {
        let permissions = previous.permissions().clone();
        return user.with_permissions(permissions);
    }

    let permissions = role_permissions
        .permissions_for(user.role().as_str())
        .iter()
        .cloned()
        .collect();
    user.with_permissions(permissions)
}
