use tracing::{debug, info, warn};

use matchdesk_core::{AppError, AppResult};

use crate::{AuthSession, LoginCredentials, RegisterPayload};

use super::*;

#[derive(Clone, Copy)]
enum CredentialFlow {
    Login,
    Register,
}

impl CredentialFlow {
    fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Register => "register",
        }
    }

    fn rejected_message(self) -> &'static str {
        match self {
            Self::Login => "Login failed, check your username and password",
            Self::Register => "Registration failed, please try again later",
        }
    }

    fn failure_message(self) -> &'static str {
        match self {
            Self::Login => "Login failed, please try again later",
            Self::Register => "Registration failed, please try again later",
        }
    }

    fn user_message(self, error: &AppError) -> String {
        if let Some(message) = error.backend_message() {
            return message.to_owned();
        }

        match error {
            AppError::Rejected { .. } | AppError::Unauthorized(_) => {
                self.rejected_message().to_owned()
            }
            _ => self.failure_message().to_owned(),
        }
    }
}

enum Completion {
    Committed,
    Failed(String),
    Superseded,
}

impl SessionService {
    /// Signs in with username and password.
    ///
    /// Returns `true` when the new session was committed. On failure the
    /// snapshot carries a user-facing error. The snapshot is marked
    /// initialized either way.
    pub async fn login(&self, credentials: LoginCredentials) -> bool {
        let generation = self.begin_credential_flow().await;
        let result = self.auth_api.login(&credentials).await;
        self.finish_credential_flow(CredentialFlow::Login, generation, result)
            .await
    }

    /// Creates an account and signs it in.
    ///
    /// Same contract as [`SessionService::login`].
    pub async fn register(&self, payload: RegisterPayload) -> bool {
        let generation = self.begin_credential_flow().await;
        let result = self.auth_api.register(&payload).await;
        self.finish_credential_flow(CredentialFlow::Register, generation, result)
            .await
    }

    async fn begin_credential_flow(&self) -> u64 {
        let mut state = self.state.write().await;
        state.generation = state.generation.wrapping_add(1);
        state.is_loading = true;
        state.error = None;
        state.generation
    }

    async fn finish_credential_flow(
        &self,
        flow: CredentialFlow,
        generation: u64,
        result: AppResult<AuthSession>,
    ) -> bool {
        let completion = match result {
            Ok(session) => self.commit_credentials(flow, generation, session).await,
            Err(error) => {
                warn!(flow = flow.as_str(), error = %error, "credential exchange failed");
                Completion::Failed(flow.user_message(&error))
            }
        };

        let mut state = self.state.write().await;
        let current = state.generation == generation;

        let committed = match completion {
            Completion::Committed => true,
            Completion::Failed(message) if current => {
                state.is_loading = false;
                state.error = Some(message);
                if state.identity.is_none() {
                    state.phase = SessionPhase::Anonymous;
                }
                false
            }
            Completion::Failed(_) | Completion::Superseded => false,
        };

        if current {
            state.is_loading = false;
        }
        // A disposed session stays uninitialized.
        if current || state.phase != SessionPhase::Uninitialized {
            state.is_initialized = true;
        }
        committed
    }

    async fn commit_credentials(
        &self,
        flow: CredentialFlow,
        generation: u64,
        session: AuthSession,
    ) -> Completion {
        let AuthSession { user, tokens } = session;

        let role_permissions = self
            .role_permissions_after_load(tokens.access_token(), true)
            .await;
        let user = resolve_user_permissions(user, None, &role_permissions);

        let mut state = self.state.write().await;
        if state.generation != generation {
            debug!(flow = flow.as_str(), "discarding credentials after a newer transition");
            return Completion::Superseded;
        }

        if let Some(store) = &self.credential_store
            && let Err(error) = store.save_session(&tokens, &user).await
        {
            warn!(flow = flow.as_str(), error = %error, "failed to persist session");
            if let Err(error) = store.clear().await {
                warn!(error = %error, "failed to clear partially persisted session");
            }
            state.identity = None;
            return Completion::Failed(flow.failure_message().to_owned());
        }

        info!(
            flow = flow.as_str(),
            user_id = %user.id(),
            role = %user.role(),
            "session established"
        );

        state.phase = SessionPhase::Authenticated;
        state.identity = Some(AuthenticatedIdentity { user, tokens });
        state.role_permissions = role_permissions;
        state.is_loading = false;
        state.error = None;
        state.is_initialized = true;
        Completion::Committed
    }
}
