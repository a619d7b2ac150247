use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use canopy::auth::{
    Argon2Hasher, PasswordHasher, TokenRequest, generate_salt, generate_uid, issue_token,
};
use canopy::config::ServerConfig;
use canopy::server::{AppState, create_router};
use canopy::store::{PrincipalStore, SqliteStore, Store};
use canopy::types::{AccessGrant, Principal, PrincipalType, TokenType};

const ADMIN_TOKEN_FILE: &str = ".admin_token";
const CACHE_PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[cfg(unix)]
fn set_restrictive_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::warn!("Failed to set permissions on {}: {e}", path.display());
    }
}

#[derive(Parser)]
#[command(name = "canopy")]
#[command(about = "Access-control core of a self-hosted git server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve {
        /// TOML config file; flags override its values
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long, short)]
        port: Option<u16>,

        /// Data directory for the database and repositories
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Host name whose requests always go to the git lane (e.g. "git.example.com")
        #[arg(long)]
        git_host: Option<String>,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Initialize the server (create database, admin user and admin token)
    Init {
        /// Data directory for the database and repositories
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,

        /// Name of the admin user
        #[arg(long, default_value = "admin")]
        uid: String,

        /// Admin password; prompted for when omitted
        #[arg(long)]
        password: Option<String>,

        /// Skip interactive prompts
        #[arg(long)]
        non_interactive: bool,
    },
}

fn prompt_password(password: Option<String>, non_interactive: bool) -> anyhow::Result<String> {
    if let Some(password) = password {
        if password.is_empty() {
            bail!("Password cannot be empty");
        }
        return Ok(password);
    }
    if non_interactive {
        bail!("--password is required with --non-interactive");
    }

    let password = inquire::Password::new("Admin password:")
        .with_validator(|input: &str| {
            if input.len() < 8 {
                Err("Password must be at least 8 characters".into())
            } else {
                Ok(inquire::validator::Validation::Valid)
            }
        })
        .prompt()?;
    Ok(password)
}

fn run_init(
    data_dir: PathBuf,
    uid: String,
    password: Option<String>,
    non_interactive: bool,
) -> anyhow::Result<()> {
    fs::create_dir_all(&data_dir)?;

    let config = ServerConfig {
        data_dir: data_dir.clone(),
        ..ServerConfig::default()
    };
    let store = SqliteStore::new(config.db_path())?;
    store.initialize()?;

    let token_file = data_dir.join(ADMIN_TOKEN_FILE);

    if store.find_principal_by_uid(&uid)?.is_some() {
        bail!(
            "Server already initialized. Admin token exists at: {}",
            token_file.display()
        );
    }

    let password = prompt_password(password, non_interactive)?;

    let now = Utc::now();
    let mut admin = Principal {
        id: 0,
        uid: uid.clone(),
        display_name: uid.clone(),
        principal_type: PrincipalType::User,
        admin: true,
        blocked: false,
        salt: generate_salt(),
        password_hash: Some(Argon2Hasher::new().hash(&password)?),
        parent_type: None,
        parent_id: None,
        created_at: now,
        updated_at: now,
    };
    admin.id = store.create_principal(&admin)?;

    let (_, raw_token) = issue_token(
        &store,
        &admin,
        TokenRequest {
            uid: generate_uid(TokenType::Pat),
            token_type: TokenType::Pat,
            grants: AccessGrant::ALL,
            lifetime: None,
            created_by: admin.id,
        },
    )?;

    fs::write(&token_file, &raw_token)?;

    #[cfg(unix)]
    set_restrictive_permissions(&token_file);

    println!();
    println!("========================================");
    println!("Admin '{uid}' created. Access token (save this, it won't be shown again):");
    println!();
    println!("  {raw_token}");
    println!();
    println!("Token also written to: {}", token_file.display());
    println!("========================================");
    println!();

    Ok(())
}

async fn run_serve(config: ServerConfig) -> anyhow::Result<()> {
    let token_file = config.data_dir.join(ADMIN_TOKEN_FILE);
    if !token_file.exists() {
        bail!(
            "Server not initialized. Run 'canopy admin init' first to create the database and admin user."
        );
    }

    let store = SqliteStore::new(config.db_path())?;
    store.initialize()?;

    let state = Arc::new(AppState::new(Arc::new(store), config.clone()));

    let cache = state.permission_cache.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CACHE_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let purged = cache.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, "purged expired permission cache entries");
            }
        }
    });

    let app = create_router(state);
    let addr = config.socket_addr()?;

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("canopy=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init {
                data_dir,
                uid,
                password,
                non_interactive,
            } => {
                run_init(data_dir, uid, password, non_interactive)?;
            }
        },
        Commands::Serve {
            config,
            host,
            port,
            data_dir,
            git_host,
        } => {
            let mut config = match config {
                Some(path) => ServerConfig::load(&path)?,
                None => ServerConfig::default(),
            };
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(data_dir) = data_dir {
                config.data_dir = data_dir;
            }
            if git_host.is_some() {
                config.git_host = git_host;
            }

            run_serve(config).await?;
        }
    }

    Ok(())
}
