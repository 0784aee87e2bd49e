//! sharebox - command-line client for the sharebox file sharing service.
//!
//! Sessions persist between runs (session file or OS keychain), so a single
//! `sharebox login` is enough until the refresh token expires.

mod commands;
mod prompt;

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sharebox_core::models::ShareType;
use sharebox_core::{ApiError, ClientConfig, PersistenceKind};

/// Log file prefix inside the cache directory
const LOG_FILE_PREFIX: &str = "sharebox.log";

#[derive(Parser, Debug)]
#[command(name = "sharebox", version, about = "Share files from the command line")]
struct Cli {
    /// API base URL (overrides config and SHAREBOX_API_URL)
    #[arg(long, global = true, value_name = "URL")]
    api_url: Option<String>,

    /// Where to keep the session: file, keyring or none
    #[arg(long, global = true, value_name = "BACKEND")]
    persistence: Option<PersistenceKind>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Also write logs to a daily file in the cache directory
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in with password and one-time code
    Login {
        #[arg(short, long)]
        username: Option<String>,
    },
    /// End the session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Show the local session state
    Status,
    /// Create an account
    Register(RegisterArgs),
    /// Confirm an email address from the verification link
    VerifyEmail { uid: String, token: String },
    /// Manage your account
    #[command(subcommand)]
    Account(AccountCommand),
    /// List, upload and download files
    #[command(subcommand)]
    Files(FilesCommand),
    /// Share a file with another user
    Share(ShareArgs),
    /// Create a passphrase-protected public link
    SharePublic {
        id: String,
        #[arg(long = "type", default_value = "download")]
        share_type: ShareType,
        /// Hours until the link expires
        #[arg(long)]
        expires_in: Option<u32>,
    },
    /// Show the live public link for a file
    PublicLink { id: String },
    /// Fetch a file shared with you
    FetchShared {
        link: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Fetch a public share (no login needed)
    FetchPublic {
        link: String,
        passphrase: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Send an email through the service
    Email {
        #[arg(long, required = true)]
        to: Vec<String>,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        message: String,
    },
    /// Administrator commands
    #[command(subcommand)]
    Admin(AdminCommand),
}

#[derive(Args, Debug)]
struct RegisterArgs {
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
    #[arg(long)]
    email: String,
}

#[derive(Args, Debug)]
struct ShareArgs {
    id: String,
    /// Recipient email
    #[arg(long = "with", value_name = "EMAIL")]
    recipient: String,
    #[arg(long = "type", default_value = "view")]
    share_type: ShareType,
    /// Hours until the link expires
    #[arg(long)]
    expires_in: Option<u32>,
    /// Link stops working after the first access
    #[arg(long)]
    one_time: bool,
}

#[derive(Subcommand, Debug)]
enum AccountCommand {
    /// Change name or email
    Update {
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Permanently delete your account
    Delete {
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum FilesCommand {
    /// Your files
    List,
    /// Files other users shared with you
    Shared,
    Upload {
        path: PathBuf,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, default_value = "")]
        description: String,
    },
    Download {
        id: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Fetch a file the way the browser viewer does
    View {
        id: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum AdminCommand {
    Users,
    User {
        id: i64,
    },
    Files,
    /// Grant superuser rights
    Promote {
        id: i64,
        /// Revoke instead of grant
        #[arg(long)]
        revoke: bool,
    },
    UpdateUser {
        id: i64,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        active: Option<bool>,
        #[arg(long)]
        staff: Option<bool>,
        #[arg(long)]
        email_verified: Option<bool>,
    },
    DeleteUser {
        id: i64,
    },
    DeleteFile {
        id: String,
    },
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_dir: Option<PathBuf>) -> Option<WorkerGuard> {
    // RUST_LOG controls the level (e.g., RUST_LOG=sharebox_core=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let config = ClientConfig::load()?.with_env_overrides()?;
    apply_flags(cli, config)
}

/// Layer command-line flags over the loaded config and validate the result.
fn apply_flags(cli: &Cli, mut config: ClientConfig) -> Result<ClientConfig> {
    if let Some(ref url) = cli.api_url {
        config.api_base_url = url.clone();
    }
    if let Some(kind) = cli.persistence {
        config.persistence = kind;
    }
    config.base_url()?;
    Ok(config)
}

#[tokio::main]
async fn main() {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    };

    let log_dir = if cli.log_file {
        config.cache_dir().ok()
    } else {
        None
    };
    let guard = init_tracing(log_dir);
    info!("sharebox starting");
    debug!(api = %config.api_base_url, persistence = ?config.persistence, "Configuration loaded");

    let result = commands::run(cli.command, config, cli.json).await;
    if let Err(ref e) = result {
        eprintln!("Error: {:#}", e);
        if e
            .downcast_ref::<ApiError>()
            .map(ApiError::requires_login)
            .unwrap_or(false)
        {
            eprintln!("Run `sharebox login` to sign in again.");
        }
    }

    // Flush the log file before exiting
    drop(guard);
    if result.is_err() {
        std::process::exit(1);
    }
}
