//! Techshop CLI - pre-order cache inspection and management.
//!
//! # Usage
//!
//! ```bash
//! # Reconcile and print pre-order status for products
//! ts-cli status 42 43 44
//!
//! # Cancel a pre-order
//! ts-cli cancel --preorder po-9 --product 42
//!
//! # Record a pre-order created elsewhere
//! ts-cli mark-active --product 42 --preorder po-9 --status pending
//!
//! # Show or delete the persisted snapshot
//! ts-cli snapshot show
//! ts-cli snapshot clear
//!
//! # Follow status changes, refreshing when the cache gets old
//! ts-cli watch 42 43 --every 30
//! ```
//!
//! # Commands
//!
//! - `status` - Reconcile products with the backend and print their status
//! - `cancel` - Cancel a pre-order and drop it from the cart
//! - `mark-active` - Optimistically record a pre-order, then confirm it
//! - `snapshot` - Inspect or delete the persisted snapshot
//! - `watch` - Print change notifications as they happen

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use techshop_storefront::ClientConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "ts-cli")]
#[command(author, version, about = "Techshop CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile products with the backend and print their pre-order status
    Status {
        /// Product IDs
        #[arg(required = true)]
        products: Vec<String>,
    },
    /// Cancel a pre-order
    Cancel {
        /// Pre-order ID
        #[arg(long)]
        preorder: String,

        /// Product the pre-order belongs to
        #[arg(long)]
        product: String,
    },
    /// Record a pre-order created elsewhere and confirm it with the backend
    MarkActive {
        /// Product ID
        #[arg(long)]
        product: String,

        /// Pre-order ID
        #[arg(long)]
        preorder: String,

        /// Pre-order sub-state (`pending`, `confirmed`, ...)
        #[arg(long)]
        status: Option<String>,
    },
    /// Manage the persisted snapshot
    Snapshot {
        #[command(subcommand)]
        action: SnapshotAction,
    },
    /// Print change notifications, refreshing when the cache is older than the threshold
    Watch {
        /// Product IDs
        #[arg(required = true)]
        products: Vec<String>,

        /// Seconds between refresh checks
        #[arg(long, default_value_t = 30)]
        every: u64,
    },
}

#[derive(Subcommand)]
enum SnapshotAction {
    /// Print the stored entries and their age
    Show,
    /// Delete the stored snapshot
    Clear,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Configuration errors are reported after tracing is up
    let config = ClientConfig::from_env();

    let _sentry_guard = config.as_ref().ok().and_then(init_sentry);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "techshop_storefront=info,ts_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let result = match config {
        Ok(config) => run(cli, config).await,
        Err(e) => Err(commands::CommandError::from(e)),
    };

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: ClientConfig) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Status { products } => commands::preorder::status(&config, &products).await?,
        Commands::Cancel { preorder, product } => {
            commands::preorder::cancel(&config, &preorder, &product).await?;
        }
        Commands::MarkActive {
            product,
            preorder,
            status,
        } => {
            commands::preorder::mark_active(&config, &product, &preorder, status.as_deref())
                .await?;
        }
        Commands::Snapshot { action } => match action {
            SnapshotAction::Show => commands::snapshot::show(&config)?,
            SnapshotAction::Clear => commands::snapshot::clear(&config)?,
        },
        Commands::Watch { products, every } => {
            commands::preorder::watch(&config, &products, every).await?;
        }
    }
    Ok(())
}
