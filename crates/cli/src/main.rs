//! Go Marketplace CLI - Inspect and edit the local cart.
//!
//! # Usage
//!
//! ```bash
//! # Show the cart and its totals
//! gm-cli cart show
//!
//! # Dump the cart record as JSON
//! gm-cli cart show --json
//!
//! # Add a product (or one more unit of it)
//! gm-cli cart add --id p1 --title "Widget" --image-url https://img/p1.png --price 9.99
//!
//! # Change quantities
//! gm-cli cart increment p1
//! gm-cli cart decrement p1
//! ```
//!
//! # Commands
//!
//! - `cart show` - Print the cart
//! - `cart add` - Add one unit of a product
//! - `cart increment` / `cart decrement` - Adjust a line's quantity

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "gm-cli")]
#[command(author, version, about = "Go Marketplace cart tools")]
struct Cli {
    /// Directory holding the cart record (overrides `CART_STORAGE_DIR`)
    #[arg(long, global = true)]
    storage_dir: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and edit the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Print the cart contents and totals
    Show {
        /// Print the raw line items as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add one unit of a product
    Add {
        /// Product ID
        #[arg(long)]
        id: String,

        /// Product display name
        #[arg(long)]
        title: String,

        /// Product image URL
        #[arg(long)]
        image_url: String,

        /// Unit price (e.g. 9.99)
        #[arg(long)]
        price: String,
    },
    /// Add one unit to a product already in the cart
    Increment {
        /// Product ID
        id: String,
    },
    /// Remove one unit of a product, dropping it at zero
    Decrement {
        /// Product ID
        id: String,
    },
}

fn init_tracing(json: bool) {
    // Logs go to stderr so `cart show --json` output stays clean
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "go_marketplace_cart=info,gm_cli=info".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.log_json);

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let provider = commands::cart::mount(cli.storage_dir).await?;

    match cli.command {
        Commands::Cart { action } => match action {
            CartAction::Show { json } => commands::cart::show(&provider, json)?,
            CartAction::Add {
                id,
                title,
                image_url,
                price,
            } => commands::cart::add(&provider, id, title, image_url, &price).await?,
            CartAction::Increment { id } => commands::cart::increment(&provider, &id).await?,
            CartAction::Decrement { id } => commands::cart::decrement(&provider, &id).await?,
        },
    }
    Ok(())
}
