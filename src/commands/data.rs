use std::io::Write;

use anyhow::{Context, Result};

use revharvest::config::Config;
use revharvest::models::{RecordFilter, RecordType};
use revharvest::storage::repository::create_sqlite_repository;
use revharvest::storage::SharedRepository;

fn open(config: &Config) -> Result<SharedRepository> {
    create_sqlite_repository(&config.database.sqlite_path).with_context(|| {
        format!(
            "Failed to open database: {}",
            config.database.sqlite_path.display()
        )
    })
}

/// Print aggregate statistics
pub fn stats(config: Config) -> Result<()> {
    let repo = open(&config)?;
    let stats = repo.stats(10, 10)?;

    println!("Harvest Statistics");
    println!("==================");
    println!("  Total records: {}", stats.total_records);
    println!("  Unique domains: {}", stats.unique_domains);
    println!("  MX records: {}", stats.by_type.mx);
    println!("  NS records: {}", stats.by_type.ns);

    if !stats.by_provider.is_empty() {
        println!();
        println!("By provider:");
        for (provider, count) in &stats.by_provider {
            println!("  {provider:<20} {count}");
        }
    }

    for (label, servers) in [("MX", &stats.top_servers.mx), ("NS", &stats.top_servers.ns)] {
        if servers.is_empty() {
            continue;
        }
        println!();
        println!("Top {label} servers:");
        for entry in servers {
            println!("  {:<40} {}", entry.server, entry.count);
        }
    }

    if !stats.recent_sessions.is_empty() {
        println!();
        println!("Recent sessions:");
        for session in &stats.recent_sessions {
            println!(
                "  {:<60} {:<9} {:>8} domains {:>5} pages",
                session.id, session.status, session.total_domains, session.pages_fetched
            );
        }
    }

    Ok(())
}

/// Print matching records as JSON lines
pub fn records(config: Config, record_type: Option<RecordType>, server: Option<String>) -> Result<()> {
    let repo = open(&config)?;
    let records = repo.list_domains(&RecordFilter { record_type, server })?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for record in &records {
        serde_json::to_writer(&mut out, record)?;
        writeln!(out)?;
    }
    out.flush()?;

    tracing::info!(count = records.len(), "Records listed");
    Ok(())
}

/// Delete every record and session
pub fn clear(config: Config, yes: bool) -> Result<()> {
    if !yes {
        anyhow::bail!("Refusing to delete all data without --yes");
    }

    let repo = open(&config)?;
    let summary = repo.clear_all()?;
    println!(
        "Removed {} records and {} sessions.",
        summary.domains_removed, summary.sessions_removed
    );
    Ok(())
}
