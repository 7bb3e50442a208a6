//! gymlog - log gym workouts from the terminal.
//!
//! Signs in against the gym API, keeps the session between runs, browses
//! exercises by muscle group and records completed exercises in the history.

use std::ffi::OsStr;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gymlog_core::{
    ApiClient, Config, CredentialStore, ProfileUpdate, SessionError, SessionManager, SignUp,
    StorageBackend,
};

// ============================================================================
// Constants
// ============================================================================

/// Shortest password the API accepts
const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Parser)]
#[command(name = "gymlog", version, about = "Log gym workouts from the terminal")]
struct Cli {
    /// API base URL, overriding the config file and GYMLOG_API_URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Also append logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and remember the session
    SignIn {
        #[arg(long)]
        email: String,
    },
    /// Create an account and sign in
    SignUp {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
    /// Forget the stored session
    SignOut,
    /// Save settings to the config file (use with --api-url)
    Config {
        /// Where to keep the session: file or keyring
        #[arg(long)]
        storage: Option<StorageBackend>,
    },
    /// Show the signed-in user
    Whoami,
    /// List muscle groups
    Groups,
    /// List exercises for a muscle group
    Exercises { group: String },
    /// Show one exercise
    Exercise { id: String },
    /// Record a completed exercise
    Log { id: String },
    /// Show the workout history
    History,
    /// Change name and optionally password
    Profile {
        #[arg(long)]
        name: Option<String>,
        /// Also change the password (prompts for current and new)
        #[arg(long)]
        password: bool,
    },
    /// Upload a new avatar image
    Avatar { path: PathBuf },
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_file: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            let file_name = path.file_name().unwrap_or_else(|| OsStr::new("gymlog.log"));
            let appender = tracing_appender::rolling::never(dir, file_name);
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

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let log_guard = init_tracing(cli.log_file.as_deref());

    if let Command::Config { storage } = cli.command {
        return save_config(cli.api_url, storage);
    }

    let mut config = Config::load()?.with_env();
    if let Some(url) = cli.api_url.clone() {
        config.api_url = url;
    }
    info!(api_url = %config.api_url, storage = ?config.storage, "gymlog starting");

    let api = ApiClient::from_config(&config).context("Failed to build HTTP client")?;
    let credentials = CredentialStore::new(config.open_store()?);
    let session = SessionManager::new(api, credentials);

    if let Err(e) = session.rehydrate().await {
        warn!(error = %e, "Could not restore the previous session");
    }

    match run(cli.command, &session).await {
        Ok(()) => Ok(()),
        Err(e) => {
            match e.downcast_ref::<SessionError>() {
                Some(session_error) => eprintln!("Error: {}", session_error.user_message()),
                None => eprintln!("Error: {:#}", e),
            }
            // flush file logs before exiting
            drop(log_guard);
            std::process::exit(1);
        }
    }
}

async fn run(command: Command, session: &SessionManager) -> Result<()> {
    match command {
        Command::SignIn { email } => {
            let password = prompt_password("Password: ")?;
            let user = session.sign_in(email.trim(), &password).await?;
            println!("Signed in as {}", user.display_name());
        }
        Command::SignUp { name, email } => {
            let sign_up = SignUp {
                name: name.trim().to_string(),
                email: email.trim().to_string(),
                password: prompt_new_password()?,
            };
            validate_sign_up(&sign_up)?;
            let user = session.sign_up(&sign_up).await?;
            println!("Welcome, {}!", user.display_name());
        }
        Command::Config { .. } => unreachable!("handled before the session is built"),
        Command::SignOut => {
            session.sign_out().await?;
            println!("Signed out");
        }
        Command::Whoami => match session.current_user() {
            Some(user) => {
                println!("{} <{}>", user.display_name(), user.email);
                if let Some(url) = session.avatar_url() {
                    println!("Avatar: {}", url);
                }
            }
            None => println!("Not signed in"),
        },
        Command::Groups => {
            require_session(session)?;
            for group in session.api().fetch_groups().await.map_err(SessionError::from)? {
                println!("{}", group);
            }
        }
        Command::Exercises { group } => {
            require_session(session)?;
            let exercises = session
                .api()
                .fetch_exercises_by_group(&group)
                .await
                .map_err(SessionError::from)?;
            if exercises.is_empty() {
                println!("No exercises for {}", group);
            }
            for exercise in exercises {
                println!("{:>4}  {:<30} {}", exercise.id, exercise.name, exercise.prescription());
            }
        }
        Command::Exercise { id } => {
            require_session(session)?;
            let exercise = session.api().fetch_exercise(&id).await.map_err(SessionError::from)?;
            println!("{} ({})", exercise.name, exercise.group);
            println!("{}", exercise.prescription());
            println!("Demo: {}", session.api().demo_url(&exercise.demo));
        }
        Command::Log { id } => {
            require_session(session)?;
            session.api().log_exercise(&id).await.map_err(SessionError::from)?;
            println!("Exercise recorded");
        }
        Command::History => {
            require_session(session)?;
            let days = session.api().fetch_history().await.map_err(SessionError::from)?;
            if days.is_empty() {
                println!("No exercises logged yet");
            }
            for day in days {
                println!("{}", day.title);
                for entry in day.data {
                    println!("  {}  {:<30} {}", entry.hour, entry.name, entry.group);
                }
            }
        }
        Command::Profile {
            name,
            password,
        } => {
            let current = require_session(session)?;
            let mut update = ProfileUpdate::rename(name.unwrap_or(current.name).trim());
            if update.name.is_empty() {
                anyhow::bail!("Name is required");
            }
            if password {
                update.old_password = Some(prompt_password("Current password: ")?);
                update.password = Some(prompt_new_password()?);
            }
            let user = session.save_profile(&update).await?;
            println!("Profile updated for {}", user.display_name());
        }
        Command::Avatar { path } => {
            require_session(session)?;
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("avatar")
                .to_string();
            session.update_avatar(&file_name, bytes).await?;
            if let Some(url) = session.avatar_url() {
                println!("Avatar updated: {}", url);
            }
        }
    }
    Ok(())
}

/// Persist `--api-url` and `--storage` to the config file
fn save_config(api_url: Option<String>, storage: Option<StorageBackend>) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(url) = api_url {
        config.api_url = url.trim().to_string();
    }
    if let Some(storage) = storage {
        config.storage = storage;
    }
    config.save()?;
    println!(
        "Saved {} (api_url = {}, storage = {:?})",
        Config::config_path()?.display(),
        config.api_url,
        config.storage
    );
    Ok(())
}

fn require_session(session: &SessionManager) -> Result<gymlog_core::User> {
    session
        .current_user()
        .ok_or_else(|| anyhow::anyhow!("Not signed in. Run `gymlog sign-in --email <email>` first."))
}

fn prompt_password(prompt: &str) -> Result<String> {
    io::stdout().flush()?;
    let password = rpassword::prompt_password(prompt)?;
    Ok(password)
}

fn prompt_new_password() -> Result<String> {
    let password = prompt_password("New password: ")?;
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        anyhow::bail!("Password must have at least {} characters", MIN_PASSWORD_LENGTH);
    }
    let confirm = prompt_password("Confirm password: ")?;
    if confirm != password {
        anyhow::bail!("Password confirmation does not match");
    }
    Ok(password)
}

fn validate_sign_up(sign_up: &SignUp) -> Result<()> {
    if sign_up.name.is_empty() {
        anyhow::bail!("Name is required");
    }
    let (local, domain) = sign_up
        .email
        .split_once('@')
        .ok_or_else(|| anyhow::anyhow!("Invalid e-mail address"))?;
    if local.is_empty() || !domain.contains('.') {
        anyhow::bail!("Invalid e-mail address");
    }
    Ok(())
}
