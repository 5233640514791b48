//! Paperback CLI - Database migrations and permission management.
//!
//! # Usage
//!
//! ```bash
//! # Apply schema and session store migrations
//! paperback-cli migrate
//!
//! # Grant a permission to an account
//! paperback-cli permissions grant -e alice@example.com -c products:write
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `permissions grant` - Grant a permission code to a user

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "paperback-cli")]
#[command(author, version, about = "Paperback CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage user permissions
    Permissions {
        #[command(subcommand)]
        action: PermissionAction,
    },
}

#[derive(Subcommand)]
enum PermissionAction {
    /// Grant a permission to an existing user
    Grant {
        /// Account email address
        #[arg(short, long)]
        email: String,

        /// Permission code (`products:read`, `products:write`, `invoices:read`, `invoices:write`)
        #[arg(short, long)]
        code: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Permissions { action } => match action {
            PermissionAction::Grant { email, code } => {
                commands::permissions::grant(&email, &code).await?;
            }
        },
    }
    Ok(())
}
