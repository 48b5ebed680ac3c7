use chrono::Utc;
use tracing::{debug, info, warn};

use matchdesk_domain::UnverifiedAccessClaims;

use crate::{CallOutcome, PersistedSession};

use super::*;

enum RestoreOutcome {
    Restored(AuthenticatedIdentity, RolePermissionsMap),
    Rejected(&'static str),
}

impl SessionService {
    /// Restores the session from durable storage.
    ///
    /// Runs once; later calls return immediately. Ends `Authenticated` when
    /// persisted tokens are present, unexpired by their unverified `exp`
    /// claim, and a profile is available (fresh from the backend or cached).
    /// Any other path ends in a full logout.
    pub async fn initialize(&self) {
        let generation = {
            let mut state = self.state.write().await;
            if state.phase != SessionPhase::Uninitialized {
                return;
            }

            state.phase = SessionPhase::Initializing;
            state.generation = state.generation.wrapping_add(1);
            state.generation
        };

        match self.restore_persisted_session().await {
            RestoreOutcome::Restored(identity, role_permissions) => {
                self.commit_restored_session(generation, identity, role_permissions)
                    .await;
            }
            RestoreOutcome::Rejected(reason) => {
                if self.state.read().await.generation != generation {
                    debug!(reason, "session initialization superseded");
                    return;
                }

                info!(reason, "no session restored");
                self.logout().await;
            }
        }
    }

    async fn restore_persisted_session(&self) -> RestoreOutcome {
        let persisted = match &self.credential_store {
            Some(store) => match store.load().await {
                Ok(persisted) => persisted,
                Err(error) => {
                    warn!(error = %error, "failed to read persisted credentials");
                    return RestoreOutcome::Rejected("persisted credentials unreadable");
                }
            },
            None => PersistedSession::default(),
        };

        let (Some(access_token), Some(refresh_token)) =
            (persisted.access_token, persisted.refresh_token)
        else {
            return RestoreOutcome::Rejected("no persisted credentials");
        };

        let Ok(tokens) = TokenPair::new(access_token, refresh_token) else {
            return RestoreOutcome::Rejected("persisted credentials are blank");
        };

        let role_permissions = self
            .role_permissions_after_load(tokens.access_token(), false)
            .await;

        match UnverifiedAccessClaims::decode(tokens.access_token()) {
            Ok(claims) if claims.is_expired_at(Utc::now()) => {
                return RestoreOutcome::Rejected("access token expired");
            }
            Ok(_) => {}
            Err(error) => {
                warn!(error = %error, "failed to decode persisted access token");
                return RestoreOutcome::Rejected("access token undecodable");
            }
        }

        let cached_user = persisted
            .user_payload
            .and_then(|payload| match serde_json::from_str::<SessionUser>(&payload) {
                Ok(user) => Some(user),
                Err(error) => {
                    warn!(error = %error, "discarding corrupted cached user");
                    None
                }
            });

        let fetched = self
            .auth_api
            .fetch_current_user(tokens.access_token())
            .await;

        let resolved_user = match CallOutcome::classify(fetched) {
            CallOutcome::Completed(Some(remote_user)) => Some(resolve_user_permissions(
                remote_user,
                cached_user.as_ref(),
                &role_permissions,
            )),
            CallOutcome::Completed(None) => cached_user.clone(),
            CallOutcome::Invalidated(error) => {
                info!(error = %error, "backend rejected persisted session");
                return RestoreOutcome::Rejected("profile fetch unauthorized");
            }
            CallOutcome::Degraded(error) => {
                warn!(error = %error, "failed to refresh user profile, using cached profile");
                cached_user.clone()
            }
        };

        let Some(resolved_user) = resolved_user else {
            return RestoreOutcome::Rejected("no usable user profile");
        };

        let user = resolve_user_permissions(resolved_user, cached_user.as_ref(), &role_permissions);

        RestoreOutcome::Restored(AuthenticatedIdentity { user, tokens }, role_permissions)
    }

    async fn commit_restored_session(
        &self,
        generation: u64,
        identity: AuthenticatedIdentity,
        role_permissions: RolePermissionsMap,
    ) {
        let mut state = self.state.write().await;
        if state.generation != generation {
            debug!("discarding session restored after a newer transition");
            return;
        }

        if let Some(store) = &self.credential_store
            && let Err(error) = store.save_user(&identity.user).await
        {
            warn!(error = %error, "failed to persist restored user profile");
        }

        info!(
            user_id = %identity.user.id(),
            role = %identity.user.role(),
            "session restored"
        );

        state.phase = SessionPhase::Authenticated;
        state.identity = Some(identity);
        state.role_permissions = role_permissions;
        state.is_initialized = true;
    }
}
