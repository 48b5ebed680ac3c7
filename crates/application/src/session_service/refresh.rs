use serde::Serialize;
use tracing::{debug, info, warn};

use matchdesk_core::AppError;

use super::*;

const RESET_SENT_MESSAGE: &str = "Reset link sent, please check your inbox";
const RESET_REJECTED_MESSAGE: &str = "Request failed, please try again later";
const RESET_UNREACHABLE_MESSAGE: &str = "Request failed, check your network or try again later";

/// Result of a password reset request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PasswordResetOutcome {
    /// Whether the backend accepted the request.
    pub success: bool,
    /// User-facing message.
    pub message: String,
}

impl SessionService {
    /// Exchanges the refresh token for a new token pair.
    ///
    /// Returns `false` without side effects when no refresh token is held.
    /// A rejected exchange logs out. A pair that arrives after a newer
    /// session transition is dropped.
    pub async fn refresh(&self) -> bool {
        let (generation, refresh_token) = {
            let state = self.state.read().await;
            let refresh_token = state
                .tokens()
                .map(|tokens| tokens.refresh_token().to_owned());
            (state.generation, refresh_token)
        };

        let Some(refresh_token) = refresh_token else {
            return false;
        };

        match self.auth_api.refresh(&refresh_token).await {
            Ok(tokens) => {
                let mut state = self.state.write().await;
                if state.generation != generation {
                    debug!("discarding refreshed tokens after a newer transition");
                    return false;
                }

                let Some(identity) = state.identity.as_mut() else {
                    return false;
                };

                if let Some(store) = &self.credential_store
                    && let Err(error) = store.save_tokens(&tokens).await
                {
                    warn!(error = %error, "failed to persist refreshed tokens");
                }

                identity.tokens = tokens;
                state.error = None;
                debug!("access token refreshed");
                true
            }
            Err(error) => {
                warn!(error = %error, "token refresh failed");
                if self.state.read().await.generation == generation {
                    info!("logging out after failed token refresh");
                    self.logout().await;
                }
                false
            }
        }
    }

    /// Asks the backend to email a password reset link.
    ///
    /// Never touches identity or credentials.
    pub async fn request_password_reset(&self, email: &str) -> PasswordResetOutcome {
        {
            let mut state = self.state.write().await;
            state.is_loading = true;
            state.error = None;
        }

        let result = self.auth_api.request_password_reset(email).await;

        let outcome = match result {
            Ok(message) => PasswordResetOutcome {
                success: true,
                message: message
                    .filter(|message| !message.trim().is_empty())
                    .unwrap_or_else(|| RESET_SENT_MESSAGE.to_owned()),
            },
            Err(error) => {
                warn!(error = %error, "password reset request failed");
                let message = match &error {
                    AppError::Rejected { .. } => error
                        .backend_message()
                        .unwrap_or(RESET_REJECTED_MESSAGE)
                        .to_owned(),
                    _ => RESET_UNREACHABLE_MESSAGE.to_owned(),
                };
                PasswordResetOutcome {
                    success: false,
                    message,
                }
            }
        };

        let mut state = self.state.write().await;
        state.is_loading = false;
        if !outcome.success {
            state.error = Some(outcome.message.clone());
        }

        outcome
    }
}
