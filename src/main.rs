use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use revharvest::config::Config;
use revharvest::models::RecordType;
use revharvest::provider::Strategy;

mod commands;

#[derive(Parser)]
#[command(
    name = "revharvest",
    version,
    about = "Harvest domains sharing an MX or NS server from reverse-lookup APIs",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file (environment variables when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides the configured format
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest domains for one server and wait for completion
    Harvest {
        /// MX or NS server host name
        #[arg(short, long)]
        server: String,

        /// Record type (mx, ns)
        #[arg(short = 't', long = "type")]
        record_type: RecordType,

        /// Provider name (defaults to the configured provider)
        #[arg(short, long)]
        provider: Option<String>,

        /// Stop after this many pages
        #[arg(short, long)]
        max_pages: Option<u32>,

        /// Crawl strategy (paginate, scroll, bypass)
        #[arg(long)]
        strategy: Option<Strategy>,
    },

    /// Run the HTTP API
    Serve {
        /// Bind address (host:port)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Send one test request to a provider
    Check {
        /// Provider name (defaults to the configured provider)
        #[arg(short, long)]
        provider: Option<String>,

        /// Mail server to look up
        #[arg(short, long)]
        server: Option<String>,
    },

    /// Show aggregate statistics
    Stats,

    /// Print stored records as JSON lines
    Records {
        /// Record type (mx, ns)
        #[arg(short = 't', long = "type")]
        record_type: Option<RecordType>,

        /// Server host name
        #[arg(short, long)]
        server: Option<String>,
    },

    /// Delete every record and session
    Clear {
        /// Confirm the wipe
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Failed to load .env: {e}");
        }
    }

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    let log_format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| config.logging.format.clone());
    setup_tracing(&log_format, &config.logging.level, cli.verbose)?;

    if let Err(e) = revharvest::metrics::init_metrics() {
        tracing::warn!(error = %e, "Metrics disabled");
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "revharvest starting");

    match cli.command {
        Commands::Harvest {
            server,
            record_type,
            provider,
            max_pages,
            strategy,
        } => {
            tracing::info!(
                server = %server,
                record_type = %record_type,
                provider = ?provider,
                max_pages = ?max_pages,
                strategy = ?strategy,
                "Starting harvest command"
            );
            commands::harvest(
                config,
                commands::HarvestParams {
                    server,
                    record_type,
                    provider,
                    max_pages,
                    strategy,
                },
            )
            .await?;
        }

        Commands::Serve { bind } => {
            tracing::info!(bind = ?bind, "Starting serve command");
            commands::serve(config, bind).await?;
        }

        Commands::Check { provider, server } => commands::check(config, provider, server).await?,

        Commands::Stats => commands::stats(config)?,

        Commands::Records {
            record_type,
            server,
        } => commands::records(config, record_type, server)?,

        Commands::Clear { yes } => commands::clear(config, yes)?,
    }

    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("revharvest=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("revharvest={level},warn")))
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
    }

    Ok(())
}
