use std::time::Duration;

use async_trait::async_trait;
use matchdesk_application::{AuthApi, AuthSession, LoginCredentials, RegisterPayload};
use matchdesk_core::{AppError, AppResult};
use matchdesk_domain::{PermissionManifest, SessionUser, TokenPair};
use reqwest::{StatusCode, header};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

const LOGIN_PATH: &str = "auth/login";
const REGISTER_PATH: &str = "auth/register";
const REFRESH_PATH: &str = "auth/refresh";
const FORGOT_PASSWORD_PATH: &str = "auth/forgot-password";
const CURRENT_USER_PATH: &str = "auth/me";
const PERMISSION_MANIFEST_PATH: &str = "auth/permissions/manifest";

/// Response envelope shared by the authentication endpoints.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionData {
    user: SessionUser,
    tokens: TokenPair,
}

#[derive(Debug, Deserialize)]
struct RefreshData {
    tokens: TokenPair,
}

#[derive(Debug, Deserialize)]
struct CurrentUserData {
    user: Option<SessionUser>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Serialize)]
struct ForgotPasswordRequest<'a> {
    email: &'a str,
}

/// reqwest-backed implementation of the authentication endpoints.
pub struct HttpAuthApi {
    http_client: reqwest::Client,
    base_url: Url,
}

impl HttpAuthApi {
    /// Creates an adapter over an existing client.
    ///
    /// Endpoint paths are resolved relative to `base_url`, so a base of
    /// `http://host/api` reaches `http://host/api/auth/login`.
    pub fn new(http_client: reqwest::Client, base_url: &str) -> AppResult<Self> {
        let mut parsed = Url::parse(base_url).map_err(|error| {
            AppError::Validation(format!("invalid API base URL '{base_url}': {error}"))
        })?;

        if parsed.cannot_be_a_base() {
            return Err(AppError::Validation(format!(
                "API base URL '{base_url}' cannot carry endpoint paths"
            )));
        }

        if !parsed.path().ends_with('/') {
            let path = format!("{}/", parsed.path());
            parsed.set_path(&path);
        }

        Ok(Self {
            http_client,
            base_url: parsed,
        })
    }

    /// Creates an adapter with its own client and request timeout.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;

        Self::new(http_client, base_url)
    }

    /// Returns the normalized base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> AppResult<Url> {
        self.base_url.join(path).map_err(|error| {
            AppError::Internal(format!("failed to build endpoint URL for '{path}': {error}"))
        })
    }

    /// Posts a command and requires a successful envelope.
    async fn post_command<B, T>(&self, path: &str, body: &B) -> AppResult<ApiEnvelope<T>>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let endpoint = self.endpoint(path)?;
        let response = self
            .http_client
            .post(endpoint)
            .json(body)
            .send()
            .await
            .map_err(|error| AppError::Unavailable(format!("failed to call '{path}': {error}")))?;

        let status = response.status();
        let envelope = read_envelope(response, path).await;

        match envelope {
            Ok(envelope) if status.is_success() && envelope.success => {
                decode_data(envelope, path)
            }
            Ok(envelope) => Err(AppError::Rejected {
                status: Some(status.as_u16()),
                message: envelope.message,
            }),
            Err(_) if !status.is_success() => Err(AppError::Rejected {
                status: Some(status.as_u16()),
                message: None,
            }),
            Err(error) => Err(error),
        }
    }

    /// Sends an authenticated read. A 401 is reported as `Unauthorized`.
    async fn get_authorized<T>(&self, path: &str, access_token: &str) -> AppResult<ApiEnvelope<T>>
    where
        T: DeserializeOwned,
    {
        let endpoint = self.endpoint(path)?;
        let response = self
            .http_client
            .get(endpoint)
            .header(header::AUTHORIZATION, format!("Bearer {access_token}"))
            .send()
            .await
            .map_err(|error| AppError::Unavailable(format!("failed to call '{path}': {error}")))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(AppError::Unauthorized(format!(
                "'{path}' rejected the access token"
            )));
        }

        if !status.is_success() {
            let message = read_envelope(response, path)
                .await
                .ok()
                .and_then(|envelope| envelope.message);
            return Err(AppError::Rejected {
                status: Some(status.as_u16()),
                message,
            });
        }

        let envelope = read_envelope(response, path).await?;
        decode_data(envelope, path)
    }
}

/// Reads the envelope without committing to the shape of `data`, so a
/// refusal keeps its message whatever it puts in `data`.
async fn read_envelope(response: reqwest::Response, path: &str) -> AppResult<ApiEnvelope<Value>> {
    let body = response.text().await.map_err(|error| {
        AppError::Unavailable(format!("failed to read '{path}' response body: {error}"))
    })?;

    serde_json::from_str(&body).map_err(|error| {
        AppError::InvalidPayload(format!("failed to parse '{path}' response body: {error}"))
    })
}

fn decode_data<T>(envelope: ApiEnvelope<Value>, path: &str) -> AppResult<ApiEnvelope<T>>
where
    T: DeserializeOwned,
{
    let data = envelope
        .data
        .map(serde_json::from_value::<T>)
        .transpose()
        .map_err(|error| {
            AppError::InvalidPayload(format!("failed to decode '{path}' response data: {error}"))
        })?;

    Ok(ApiEnvelope {
        success: envelope.success,
        data,
        message: envelope.message,
    })
}

fn required_data<T>(envelope: ApiEnvelope<T>, path: &str) -> AppResult<T> {
    envelope.data.ok_or_else(|| {
        AppError::InvalidPayload(format!("'{path}' response is missing its data field"))
    })
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, credentials: &LoginCredentials) -> AppResult<AuthSession> {
        let envelope = self
            .post_command::<_, SessionData>(LOGIN_PATH, credentials)
            .await?;
        let data = required_data(envelope, LOGIN_PATH)?;

        Ok(AuthSession {
            user: data.user,
            tokens: data.tokens,
        })
    }

    async fn register(&self, payload: &RegisterPayload) -> AppResult<AuthSession> {
        let envelope = self
            .post_command::<_, SessionData>(REGISTER_PATH, payload)
            .await?;
        let data = required_data(envelope, REGISTER_PATH)?;

        Ok(AuthSession {
            user: data.user,
            tokens: data.tokens,
        })
    }

    async fn refresh(&self, refresh_token: &str) -> AppResult<TokenPair> {
        let envelope = self
            .post_command::<_, RefreshData>(REFRESH_PATH, &RefreshRequest { refresh_token })
            .await?;

        Ok(required_data(envelope, REFRESH_PATH)?.tokens)
    }

    async fn request_password_reset(&self, email: &str) -> AppResult<Option<String>> {
        let envelope = self
            .post_command::<_, Value>(
                FORGOT_PASSWORD_PATH,
                &ForgotPasswordRequest { email },
            )
            .await?;

        Ok(envelope.message)
    }

    async fn fetch_current_user(&self, access_token: &str) -> AppResult<Option<SessionUser>> {
        let envelope = self
            .get_authorized::<CurrentUserData>(CURRENT_USER_PATH, access_token)
            .await?;

        let user = envelope.data.and_then(|data| data.user);
        if user.is_none() {
            debug!("current user endpoint returned no profile");
        }

        Ok(user)
    }

    async fn fetch_permission_manifest(&self, access_token: &str) -> AppResult<PermissionManifest> {
        let envelope = self
            .get_authorized::<PermissionManifest>(PERMISSION_MANIFEST_PATH, access_token)
            .await?;

        if !envelope.success {
            return Err(AppError::Rejected {
                status: None,
                message: envelope.message,
            });
        }

        required_data(envelope, PERMISSION_MANIFEST_PATH)
    }
}
