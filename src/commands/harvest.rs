use anyhow::{Context, Result};

use revharvest::config::Config;
use revharvest::crawler::{HarvestRequest, Harvester};
use revharvest::models::{RecordType, SessionStatus};
use revharvest::provider::Strategy;

/// Arguments of the `harvest` command
pub struct HarvestParams {
    pub server: String,
    pub record_type: RecordType,
    pub provider: Option<String>,
    pub max_pages: Option<u32>,
    pub strategy: Option<Strategy>,
}

/// Run one harvest in the foreground and print its summary
pub async fn harvest(config: Config, params: HarvestParams) -> Result<()> {
    let HarvestParams {
        server,
        record_type,
        provider,
        max_pages,
        strategy,
    } = params;

    println!("Starting Reverse {} Harvest", record_type.as_str().to_uppercase());
    println!("===========================");
    println!("  Server: {server}");
    println!(
        "  Provider: {}",
        provider.as_deref().unwrap_or(&config.provider.default)
    );
    if let Some(strategy) = strategy {
        println!("  Strategy: {strategy}");
    }
    if let Some(max_pages) = max_pages {
        println!("  Max pages: {max_pages}");
    }
    println!("  Database: {}", config.database.sqlite_path.display());
    println!();

    let harvester = Harvester::from_config(&config).context("Failed to initialize harvester")?;

    let mut request = HarvestRequest::new(server, record_type);
    request.provider = provider;
    request.max_pages = max_pages;
    request.strategy = strategy;

    let session_id = harvester
        .start_harvest(request)
        .context("Harvest request rejected")?;
    println!("Session: {session_id}");

    harvester.wait(&session_id).await;

    let session = harvester
        .get_session(&session_id)?
        .context("Session disappeared before it finished")?;

    println!();
    println!("Harvest {}", session.status);
    println!("  Domains stored: {}", session.total_domains);
    println!("  Pages fetched: {}", session.pages_fetched);
    if let Some(completed_at) = session.completed_at {
        let elapsed = completed_at - session.started_at;
        println!("  Duration: {:.1}s", elapsed.num_milliseconds() as f64 / 1000.0);
    }

    if session.status == SessionStatus::Error {
        anyhow::bail!("Harvest {session_id} failed; see log for details");
    }
    Ok(())
}
