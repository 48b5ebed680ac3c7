use clap::{Parser, Subcommand};

/// Matchdesk session console
#[derive(Parser, Debug)]
#[command(name = "matchdesk-console")]
#[command(version, about, long_about = None)]
pub struct ConsoleArgs {
    /// Command to run (defaults to `status`)
    #[command(subcommand)]
    command: Option<ConsoleCommand>,
}

impl ConsoleArgs {
    pub fn into_command(self) -> ConsoleCommand {
        self.command.unwrap_or(ConsoleCommand::Status)
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Show the restored session
    Status,

    /// Sign in
    Login {
        /// Account name
        #[arg(value_parser = non_blank)]
        username: String,
        /// Account password
        #[arg(value_parser = non_blank)]
        password: String,
    },

    /// Create an account and sign in
    Register {
        /// Account name
        #[arg(value_parser = non_blank)]
        username: String,
        /// Account password
        #[arg(value_parser = non_blank)]
        password: String,
        /// Contact address
        #[arg(value_parser = non_blank)]
        email: Option<String>,
    },

    /// Sign out and clear stored credentials
    Logout,

    /// Exchange the refresh token
    Refresh,

    /// Request a password reset link
    ForgotPassword {
        /// Address the link is sent to
        #[arg(value_parser = non_blank)]
        email: String,
    },

    /// Evaluate a dashboard route
    Check {
        /// Route path, for example `/dashboard/products`
        #[arg(value_parser = non_blank)]
        path: String,
    },

    /// Reload the role permission manifest
    Manifest,
}

impl ConsoleCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Login { .. } => "login",
            Self::Register { .. } => "register",
            Self::Logout => "logout",
            Self::Refresh => "refresh",
            Self::ForgotPassword { .. } => "forgot-password",
            Self::Check { .. } => "check",
            Self::Manifest => "manifest",
        }
    }
}

fn non_blank(value: &str) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("value must not be blank".to_owned());
    }
    Ok(trimmed.to_owned())
}
