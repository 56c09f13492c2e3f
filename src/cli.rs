//! Operator commands for inspecting and repairing principal rows.
//!
//! Each subcommand opens its own database handle and goes through the same
//! [`PrincipalStore`] and service functions as the production login path, so
//! there is exactly one hash/verify code path.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::auth::error::AuthError;
use crate::auth::repo::{PgPrincipalStore, PrincipalStore};
use crate::auth::services;
use crate::state;

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "storefront-auth")]
#[command(author, version, about = "Credential service for the storefront admin surface", long_about = None)]
pub struct Cli {
    /// Subcommand to run (if none, starts the server)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Principal maintenance commands
    #[command(subcommand)]
    Principal(PrincipalCommands),
}

/// Principal subcommands
#[derive(Subcommand, Debug)]
pub enum PrincipalCommands {
    /// Show whether a principal exists, its role, and a masked digest prefix
    Check {
        /// Email of the principal to inspect
        email: String,
        /// Optionally verify this password against the stored digest
        #[arg(long)]
        password: Option<String>,
    },
    /// Overwrite a principal's password with a freshly hashed one
    ResetPassword {
        /// Email of the principal to update
        email: String,
        /// New plaintext password
        new_password: String,
    },
}

/// Mask a digest for console output: algorithm and cost only, never the
/// salt or hash body.
fn mask_digest(digest: &str) -> String {
    let prefix: String = digest.chars().take(7).collect();
    format!("{prefix}…")
}

pub async fn run(command: PrincipalCommands) -> Result<()> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
    let pool = state::connect_pool(&database_url).await?;
    let store = PgPrincipalStore::new(pool);

    match command {
        PrincipalCommands::Check { email, password } => {
            check(&store, &email, password.as_deref()).await
        }
        PrincipalCommands::ResetPassword {
            email,
            new_password,
        } => reset_password(&store, &email, &new_password).await,
    }
}

async fn check(store: &dyn PrincipalStore, email: &str, password: Option<&str>) -> Result<()> {
    let principal = match store.find_by_email(email).await? {
        Some(p) => p,
        None => {
            println!("principal {email}: not found");
            return Ok(());
        }
    };

    println!("principal {}: found", principal.email);
    println!("  name:   {}", principal.name);
    println!("  role:   {}", principal.role);
    match &principal.password_hash {
        Some(digest) => println!("  digest: {}", mask_digest(digest)),
        None => println!("  digest: <none>"),
    }

    if let Some(plain) = password {
        match services::verify_login(store, email, plain).await {
            Ok(_) => println!("  password: verifies"),
            Err(AuthError::InvalidCredentials) => println!("  password: does NOT verify"),
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

async fn reset_password(store: &dyn PrincipalStore, email: &str, new_password: &str) -> Result<()> {
    if new_password.is_empty() {
        anyhow::bail!("new password must not be empty");
    }

    match services::reset_password(store, email, new_password).await {
        Ok(()) => {
            println!("password reset for {email}");
            Ok(())
        }
        Err(AuthError::NotFound) => anyhow::bail!("no principal with email {email}"),
        Err(e) => Err(e.into()),
    }
}
