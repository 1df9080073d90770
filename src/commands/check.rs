use anyhow::{Context, Result};

use revharvest::config::Config;
use revharvest::crawler::Harvester;

/// Issue one test request against a provider and print the outcome
pub async fn check(config: Config, provider: Option<String>, server: Option<String>) -> Result<()> {
    let harvester = Harvester::from_config(&config).context("Failed to initialize harvester")?;
    let name = provider.unwrap_or_else(|| config.provider.default.clone());

    let check = harvester
        .test_provider(&name, server.as_deref())
        .await
        .with_context(|| format!("Cannot check provider {name}"))?;

    println!("Provider Check");
    println!("==============");
    println!("  Provider: {}", check.provider);
    println!("  Server: {}", check.server);
    println!("  Elapsed: {} ms", check.elapsed_ms);

    if !check.ok {
        let kind = check
            .failure
            .map(|k| format!("{k:?}"))
            .unwrap_or_default();
        println!("  Result: FAILED ({kind})");
        if let Some(error) = &check.error {
            println!("  Error: {error}");
        }
        anyhow::bail!("provider {} is not usable", check.provider);
    }

    println!("  Result: OK");
    println!("  Records on page 1: {}", check.records);
    if let Some(total) = check.declared_total {
        println!("  Declared total: {total}");
    }
    Ok(())
}
