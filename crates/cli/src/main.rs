//! openme CLI - Database migrations and order management.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! openme migrate
//!
//! # Show an order as JSON
//! openme orders show ORD-20250101120000-AB12CD
//!
//! # Move an order through fulfillment
//! openme orders advance ORD-20250101120000-AB12CD shipped
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `orders show` - Print an order
//! - `orders advance` - Apply a fulfillment status transition

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use openme_core::OrderStatus;

mod commands;

#[derive(Parser)]
#[command(name = "openme")]
#[command(author, version, about = "openme CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Inspect and manage orders
    Orders {
        #[command(subcommand)]
        action: OrderAction,
    },
}

#[derive(Subcommand)]
enum OrderAction {
    /// Print an order as JSON
    Show {
        /// Order number, e.g. ORD-20250101120000-AB12CD
        order_number: String,
    },
    /// Move an order to the next fulfillment status
    Advance {
        order_number: String,

        /// Target status (`processing`, `shipped`, `delivered`, `cancelled`, `refunded`)
        status: OrderStatus,
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
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Orders { action } => match action {
            OrderAction::Show { order_number } => {
                commands::orders::show(&order_number).await?;
            }
            OrderAction::Advance {
                order_number,
                status,
            } => {
                commands::orders::advance(&order_number, status).await?;
            }
        },
    }
    Ok(())
}
