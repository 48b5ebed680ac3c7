//! Matchdesk session console.

#![forbid(unsafe_code)]

mod console_command;
mod console_config;

use std::sync::Arc;

use clap::Parser;

use matchdesk_application::{
    CredentialStore, LoginCredentials, RegisterPayload, SessionService, SessionSnapshot,
    WorkspaceService,
};
use matchdesk_core::AppError;
use matchdesk_domain::PermissionEvaluator;
use matchdesk_infrastructure::{
    FileCredentialStore, HttpAuthApi, InMemoryCredentialStore, TracingNotifier,
};
use serde_json::{Value, json};
use tracing::info;

use crate::console_command::{ConsoleArgs, ConsoleCommand};
use crate::console_config::{ConsoleConfig, init_tracing};

struct CommandReport {
    succeeded: bool,
    body: Value,
}

impl CommandReport {
    fn new(succeeded: bool, body: Value) -> Self {
        Self { succeeded, body }
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let command = ConsoleArgs::parse().into_command();
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ConsoleConfig::load()?;

    let auth_api = Arc::new(HttpAuthApi::with_timeout(
        &config.api_base_url,
        config.http_timeout,
    )?);
    let credential_store: Arc<dyn CredentialStore> = match &config.session_file {
        Some(path) => Arc::new(FileCredentialStore::new(path.clone())),
        None => Arc::new(InMemoryCredentialStore::new()),
    };
    let session = SessionService::new(auth_api, Some(credential_store), Arc::new(TracingNotifier));
    let workspace = WorkspaceService::console_default(session.clone())?;

    info!(
        api_base_url = %config.api_base_url,
        command = command.name(),
        "matchdesk console starting"
    );
    session.initialize().await;

    let report = run(&command, &session, &workspace).await;
    let rendered = serde_json::to_string_pretty(&report.body)
        .map_err(|error| AppError::Internal(format!("failed to render report: {error}")))?;
    println!("{rendered}");

    session.dispose().await;

    if report.succeeded {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "'{}' did not succeed",
            command.name()
        )))
    }
}

async fn run(
    command: &ConsoleCommand,
    session: &SessionService,
    workspace: &WorkspaceService,
) -> CommandReport {
    match command {
        ConsoleCommand::Status => CommandReport::new(true, status(session, workspace).await),
        ConsoleCommand::Login { username, password } => {
            let committed = session
                .login(LoginCredentials::new(username.as_str(), password.as_str()))
                .await;
            CommandReport::new(committed, status(session, workspace).await)
        }
        ConsoleCommand::Register {
            username,
            password,
            email,
        } => {
            let committed = session
                .register(RegisterPayload {
                    username: username.clone(),
                    password: password.clone(),
                    email: email.clone(),
                    display_name: None,
                })
                .await;
            CommandReport::new(committed, status(session, workspace).await)
        }
        ConsoleCommand::Logout => {
            session.sign_out().await;
            CommandReport::new(true, status(session, workspace).await)
        }
        ConsoleCommand::Refresh => {
            let refreshed = session.refresh().await;
            CommandReport::new(
                refreshed,
                json!({ "refreshed": refreshed, "session": status(session, workspace).await }),
            )
        }
        ConsoleCommand::ForgotPassword { email } => {
            let outcome = session.request_password_reset(email).await;
            CommandReport::new(outcome.success, json!(outcome))
        }
        ConsoleCommand::Check { path } => {
            let decision = workspace.check_route(path).await;
            CommandReport::new(true, json!({ "path": path, "decision": decision }))
        }
        ConsoleCommand::Manifest => manifest(session).await,
    }
}

async fn status(session: &SessionService, workspace: &WorkspaceService) -> Value {
    let snapshot = session.snapshot().await;
    let fallback = workspace.workspace_fallback().await;
    let navigation: Vec<String> = workspace
        .visible_navigation()
        .await
        .iter()
        .filter_map(|item| item.href().map(ToOwned::to_owned))
        .collect();

    json!({
        "phase": snapshot.phase(),
        "user": snapshot.user(),
        "error": snapshot.error(),
        "roles": role_flags(&snapshot.evaluator()),
        "workspace": fallback,
        "navigation": navigation,
        "tokenPreview": token_preview(&snapshot),
    })
}

fn role_flags(evaluator: &PermissionEvaluator) -> Value {
    json!({
        "admin": evaluator.is_admin(),
        "reviewer": evaluator.is_reviewer(),
        "operator": evaluator.is_operator(),
        "viewer": evaluator.is_viewer(),
    })
}

fn token_preview(snapshot: &SessionSnapshot) -> Option<String> {
    snapshot
        .access_token()
        .map(|token| token.chars().take(12).collect::<String>() + "...")
}

async fn manifest(session: &SessionService) -> CommandReport {
    let loaded = session.load_permission_manifest(true).await;
    let manifest = session.manifest_service().manifest().await;

    match (loaded, manifest) {
        (Some(_), Some(manifest)) => CommandReport::new(true, json!(manifest.as_ref())),
        (Some(role_permissions), None) => CommandReport::new(
            false,
            json!({
                "error": "no access token available",
                "roles": role_permissions.roles().collect::<Vec<_>>(),
            }),
        ),
        (None, _) => report_failure("permission manifest could not be loaded"),
    }
}

fn report_failure(message: &str) -> CommandReport {
    CommandReport::new(false, json!({ "error": message }))
}
