use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "hhlink", version)]
#[command(about = "Link hh.ru accounts and run job-search operations on their behalf")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// JSON user store to use instead of the configured one
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,
}

#[derive(Args)]
pub struct UserArgs {
    /// Email the linked account is stored under
    #[arg(long, env = "HH_EMAIL")]
    pub email: String,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the application's own profile
    AppInfo,
    /// Print the URL a user opens to grant access
    AuthUrl {
        /// Opaque value echoed back on the redirect
        #[arg(long)]
        state: Option<String>,
    },
    /// Link an account from an authorization code
    Link {
        #[command(flatten)]
        user: UserArgs,
        /// Code from the redirect; prompted for when omitted
        #[arg(long)]
        code: Option<String>,
    },
    /// Show the linked user's profile
    Me {
        #[command(flatten)]
        user: UserArgs,
    },
    /// List the linked user's resumes
    Resumes {
        #[command(flatten)]
        user: UserArgs,
    },
    /// Search vacancies similar to a resume
    Similar {
        #[command(flatten)]
        user: UserArgs,
        /// Resume id; defaults to the user's first resume
        #[arg(long)]
        resume: Option<String>,
        /// Search filter, repeatable (e.g. -p salary=200000)
        #[arg(short = 'p', long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },
    /// Apply to a vacancy
    Apply {
        #[command(flatten)]
        user: UserArgs,
        #[arg(long)]
        resume: String,
        #[arg(long)]
        vacancy: String,
        /// Cover letter
        #[arg(long, default_value = "")]
        message: String,
    },
    /// List negotiations
    Negotiations {
        #[command(flatten)]
        user: UserArgs,
        /// Filter, repeatable (e.g. -p status=active)
        #[arg(short = 'p', long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },
    /// Show the messages of one negotiation
    Messages {
        #[command(flatten)]
        user: UserArgs,
        #[arg(long)]
        negotiation: String,
        #[arg(long)]
        text_only: bool,
    },
    /// Revoke the user's token and forget it locally
    Logout {
        #[command(flatten)]
        user: UserArgs,
    },
    /// Write the current settings (without the secret) to the config file
    Init,
    /// Manage the client secret in the OS keychain
    Secret {
        #[command(subcommand)]
        action: SecretAction,
    },
    /// Serve the account-linking callback routes
    Serve {
        #[arg(long, default_value = "127.0.0.1:5000")]
        bind: SocketAddr,
        /// Also write daily-rotated logs here
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand, Clone, Copy)]
pub enum SecretAction {
    /// Prompt for the client secret and store it
    Set,
    /// Remove the stored client secret
    Delete,
    /// Report whether a client secret is stored
    Status,
}

/// Parse a `key=value` pair.
pub fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{}`", s))?;
    if key.is_empty() {
        return Err(format!("empty key in `{}`", s));
    }
    Ok((key.to_string(), value.to_string()))
}
