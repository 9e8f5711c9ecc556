use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use shortcash::auth::password::{hash_password, password_strength_errors};
use shortcash::auth::{generate_api_key, hash_api_key};
use shortcash::config::{Config, DatabaseBackend};
use shortcash::models::User;
use shortcash::storage::{PostgresStorage, SqliteStorage, Storage, StorageError};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "shortcash-admin")]
#[command(about = "ShortCash account management CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a user account
    CreateUser {
        /// Login email, must be unique
        email: String,
        /// Display name
        #[arg(long)]
        name: Option<String>,
        /// Initial password
        #[arg(long)]
        password: Option<String>,
    },
    /// Issue a new API key for a user, replacing any existing key
    IssueApiKey {
        /// Account email
        email: String,
    },
    /// Set a user's password
    SetPassword {
        /// Account email
        email: String,
        /// New password
        password: String,
    },
}

fn hash_checked(password: &str) -> Result<String> {
    let errors = password_strength_errors(password);
    if !errors.is_empty() {
        bail!("weak password: {}", errors.join("; "));
    }
    hash_password(password).context("failed to hash password")
}

async fn require_user(storage: &dyn Storage, email: &str) -> Result<User> {
    storage
        .find_user_by_email(email)
        .await?
        .with_context(|| format!("no user with email '{}'", email))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let storage: Arc<dyn Storage> = match config.database.backend {
        DatabaseBackend::Sqlite => Arc::new(
            SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
        ),
        DatabaseBackend::Postgres => Arc::new(
            PostgresStorage::new(&config.database.url, config.database.max_connections).await?,
        ),
    };

    storage.init().await?;

    match cli.command {
        Commands::CreateUser {
            email,
            name,
            password,
        } => {
            let password_hash = password.as_deref().map(hash_checked).transpose()?;
            match storage
                .create_user(&email, name.as_deref(), password_hash.as_deref())
                .await
            {
                Ok(user) => println!("✓ Created user {} ({})", user.id, user.email),
                Err(StorageError::Conflict) => bail!("a user with email '{}' already exists", email),
                Err(e) => return Err(e.into()),
            }
        }
        Commands::IssueApiKey { email } => {
            let user = require_user(storage.as_ref(), &email).await?;
            let key = generate_api_key();
            storage
                .rotate_api_key(user.id, &hash_api_key(&key), Utc::now().timestamp())
                .await?;
            println!("✓ Issued API key for {}", user.email);
            println!("{}", key);
        }
        Commands::SetPassword { email, password } => {
            let user = require_user(storage.as_ref(), &email).await?;
            let password_hash = hash_checked(&password)?;
            if storage.set_password_hash(user.id, &password_hash).await? {
                println!("✓ Password updated for {}", user.email);
            } else {
                println!("⚠ User {} disappeared before the update", user.email);
            }
        }
    }

    Ok(())
}
