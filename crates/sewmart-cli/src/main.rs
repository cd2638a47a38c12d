mod stocks;
mod sync;

use clap::{Parser, Subcommand, ValueEnum};
use sewmart_db::PoolConfig;

#[derive(Debug, Parser)]
#[command(name = "sewmart-cli")]
#[command(about = "Sewing World storefront operations tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run pending database migrations.
    Migrate,
    /// One-shot order poll for a pull-driven marketplace.
    Sync {
        #[arg(long, value_enum)]
        channel: Channel,
    },
    /// One-shot stock push for a pull-driven marketplace.
    Stocks {
        #[arg(long, value_enum)]
        channel: Channel,
    },
}

/// Marketplaces the CLI can drive directly. Beru and Sber are
/// push-driven (webhooks into the server) and have nothing to poll.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Channel {
    Ozon,
    Wb,
}

impl Channel {
    fn as_str(self) -> &'static str {
        match self {
            Self::Ozon => "ozon",
            Self::Wb => "wb",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = sewmart_core::load_app_config()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.clone())),
        )
        .init();

    let cli = Cli::parse();

    let pool =
        sewmart_db::connect_pool(&config.database_url, PoolConfig::from_app_config(&config))
            .await?;

    match cli.command {
        Commands::Migrate => {
            let applied = sewmart_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
        }
        Commands::Sync { channel } => {
            let summary = sync::run(&pool, &config, channel).await?;
            println!(
                "{}: {} registered, {} status updates, {} skipped",
                channel.as_str(),
                summary.registered,
                summary.updated,
                summary.skipped
            );
        }
        Commands::Stocks { channel } => {
            let summary = stocks::run(&pool, &config, channel).await?;
            println!(
                "{}: {} figures pushed, {} rejected",
                channel.as_str(),
                summary.pushed,
                summary.rejected
            );
        }
    }

    Ok(())
}
