use std::sync::Arc;

use anyhow::{Context, Result};

use revharvest::config::Config;
use revharvest::crawler::Harvester;
use revharvest::server::HarvestServer;

/// Serve the HTTP surface until Ctrl+C
pub async fn serve(mut config: Config, bind: Option<String>) -> Result<()> {
    if let Some(bind) = bind {
        config.server.bind_address = bind;
    }

    let harvester = Arc::new(Harvester::from_config(&config).context("Failed to initialize harvester")?);
    let server = HarvestServer::new(config.server.clone(), harvester.clone())
        .context("Failed to create harvest server")?;

    println!("Starting Harvest Server");
    println!("=======================");
    println!("  Bind: {}", server.bind_address());
    println!("  Database: {}", config.database.sqlite_path.display());
    println!("  Providers: {}", harvester.providers().names().join(", "));
    println!("  Default provider: {}", config.provider.default);
    println!(
        "  CORS: {}",
        if config.server.enable_cors { "enabled" } else { "disabled" }
    );
    println!();
    println!("API Endpoints:");
    println!("  GET  /api/health                  - Health check");
    println!("  POST /api/harvest                 - Start a harvest");
    println!("  GET  /api/progress/{{session_id}}   - Live progress");
    println!("  GET  /api/sessions/{{session_id}}   - Session record");
    println!("  GET  /api/stats                   - Aggregate statistics");
    println!("  GET  /api/records                 - List records (?type=&server=)");
    println!("  POST /api/clear                   - Delete all data");
    println!("  GET  /metrics                     - Prometheus metrics endpoint");
    println!();
    println!("Press Ctrl+C to stop.\n");

    server
        .start_with_shutdown(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown signal received");
                }
                Err(e) => {
                    tracing::error!("Failed to wait for Ctrl+C: {}", e);
                }
            }
        })
        .await?;

    if harvester.running() > 0 {
        tracing::warn!(
            running = harvester.running(),
            "Exiting with harvests still running; their sessions stay 'running'"
        );
    }
    println!("Harvest server stopped.");
    Ok(())
}
