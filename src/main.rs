use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use fems::actions::dto::{GroupSettingsInput, RoomInput};
use fems::actions::validation::is_valid_email;
use fems::actions::{
    ActionResponse, AppState, available_rooms, create_room, list_rooms, save_calendar_id,
    save_group_email,
};
use fems::auth::{PasswordHashing, Session};
use fems::config::{AppConfig, CONFIG_FILE_NAME};
use fems::store::{SqliteStore, Store};
use fems::sync::{GoogleCalendarClient, GoogleDirectoryClient};
use fems::types::{Role, User};

#[derive(Parser)]
#[command(name = "fems")]
#[command(about = "Faculty event management: rooms, agendas, calendar and group sync")]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, default_value = CONFIG_FILE_NAME)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and the first administrator
    Init {
        /// Administrator display name
        #[arg(long)]
        admin_name: String,

        /// Administrator email
        #[arg(long)]
        admin_email: String,

        /// Administrator password (at least 8 characters)
        #[arg(long)]
        password: String,
    },

    /// Shared calendar and group settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Room management
    Rooms {
        #[command(subcommand)]
        command: RoomCommands,
    },

    /// Calendar synchronization maintenance
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },

    /// Group membership maintenance
    Group {
        #[command(subcommand)]
        command: GroupCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Set the calendar agendas are mirrored into
    Calendar {
        /// Calendar id
        calendar_id: String,
    },
    /// Set the group users are invited to
    Group {
        /// Group email address
        group_email: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        description: Option<String>,
    },
}

#[derive(Subcommand)]
enum RoomCommands {
    /// List all rooms
    List,
    /// Add a room
    Add {
        name: String,

        #[arg(long)]
        location: Option<String>,
    },
    /// Rooms free for a whole time range
    Available {
        /// Range start (RFC 3339)
        #[arg(long)]
        start: DateTime<Utc>,

        /// Range end (RFC 3339)
        #[arg(long)]
        end: DateTime<Utc>,
    },
}

#[derive(Subcommand)]
enum SyncCommands {
    /// Retry agendas whose calendar sync failed
    Retry {
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
}

#[derive(Subcommand)]
enum GroupCommands {
    /// Retry group invites that failed
    Retry {
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
}

fn open_store(config: &AppConfig) -> anyhow::Result<SqliteStore> {
    let db_path = config.db_path();
    if !db_path.exists() {
        bail!(
            "Database not found at {}. Run 'fems init' first.",
            db_path.display()
        );
    }
    let store = SqliteStore::new(&db_path)?;
    store.initialize()?;
    Ok(store)
}

/// Without a token the providers reject every request, which only matters
/// for commands that reach the external APIs.
fn build_state(config: &AppConfig, store: SqliteStore, token: String) -> anyhow::Result<AppState> {
    let state = AppState::new(
        Arc::new(store),
        Arc::new(GoogleCalendarClient::new(&config.calendar.api_base, &token)),
        Arc::new(GoogleDirectoryClient::new(&config.directory.api_base, &token)),
        config,
    )?;
    Ok(state)
}

/// Operator commands act as the first administrator by name.
fn operator_session(store: &dyn Store) -> anyhow::Result<Session> {
    let admins = store.list_users_by_role(Role::Admin)?;
    match admins.first() {
        Some(admin) => Ok(Session::for_user(admin)),
        None => bail!("No administrator found. Run 'fems init' first."),
    }
}

fn print_response<T: Serialize>(response: ActionResponse<T>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&response)?;
    match response.error {
        None => {
            println!("{json}");
            Ok(())
        }
        Some(error) => {
            eprintln!("{json}");
            bail!("{:?}: {}", error.code, error.message)
        }
    }
}

fn run_init(
    config: &AppConfig,
    admin_name: String,
    admin_email: String,
    password: String,
) -> anyhow::Result<()> {
    if !is_valid_email(&admin_email) {
        bail!("Invalid administrator email: {admin_email}");
    }
    if password.chars().count() < 8 {
        bail!("Password must be at least 8 characters");
    }

    fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating {}", config.data_dir.display()))?;

    let store = SqliteStore::new(config.db_path())?;
    store.initialize()?;

    if !store.list_users_by_role(Role::Admin)?.is_empty() {
        bail!(
            "Already initialized. Database exists at: {}",
            config.db_path().display()
        );
    }

    let now = Utc::now();
    let admin = User {
        id: Uuid::new_v4().to_string(),
        name: admin_name,
        email: Some(admin_email),
        password_hash: Some(PasswordHashing::new().hash(&password)?),
        image: None,
        role: Role::Admin,
        created_at: now,
        updated_at: now,
    };
    store.create_user(&admin)?;

    println!("Initialized database at {}", config.db_path().display());
    println!("Administrator id: {}", admin.id);
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Commands::Init {
            admin_name,
            admin_email,
            password,
        } => run_init(&config, admin_name, admin_email, password),

        Commands::Config { command } => {
            let store = open_store(&config)?;
            let session = operator_session(&store)?;
            let state = build_state(&config, store, String::new())?;
            match command {
                ConfigCommands::Calendar { calendar_id } => {
                    print_response(save_calendar_id(&state, Some(&session), &calendar_id))
                }
                ConfigCommands::Group {
                    group_email,
                    name,
                    description,
                } => print_response(save_group_email(
                    &state,
                    Some(&session),
                    GroupSettingsInput {
                        group_email,
                        group_name: name,
                        description,
                    },
                )),
            }
        }

        Commands::Rooms { command } => {
            let store = open_store(&config)?;
            let session = operator_session(&store)?;
            let state = build_state(&config, store, String::new())?;
            match command {
                RoomCommands::List => print_response(list_rooms(&state)),
                RoomCommands::Add { name, location } => print_response(create_room(
                    &state,
                    Some(&session),
                    RoomInput { name, location },
                )),
                RoomCommands::Available { start, end } => {
                    print_response(available_rooms(&state, start, end))
                }
            }
        }

        Commands::Sync {
            command: SyncCommands::Retry { limit },
        } => {
            let state = build_state(&config, open_store(&config)?, config.access_token()?)?;
            let retried = state.calendar.retry_sync_failures(limit).await?;
            info!(retried, "Calendar retry sweep finished");
            println!("Retried {retried} agenda(s)");
            Ok(())
        }

        Commands::Group {
            command: GroupCommands::Retry { limit },
        } => {
            let state = build_state(&config, open_store(&config)?, config.access_token()?)?;
            let retried = state.group.retry_failed_invites(limit).await?;
            info!(retried, "Group invite sweep finished");
            println!("Retried {retried} invite(s)");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("fems=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    run(Cli::parse()).await
}
