//! Catalog browsing commands.

use hearth_catalog::{CatalogConfig, CatalogEntry, CatalogResolver};
use indicatif::{HumanBytes, HumanCount};

pub(crate) async fn top(limit: usize, json: bool) -> miette::Result<()> {
    let resolver = CatalogResolver::new(CatalogConfig::from_env());
    let entries = resolver.list_top(limit).await;
    print_entries(&entries, json)
}

pub(crate) async fn search(query: &str, limit: usize, json: bool) -> miette::Result<()> {
    let resolver = CatalogResolver::new(CatalogConfig::from_env());
    let entries = resolver.search(query, limit).await;
    if entries.is_empty() && !json {
        println!("No models match \"{}\".", query);
        return Ok(());
    }
    print_entries(&entries, json)
}

fn print_entries(entries: &[CatalogEntry], json: bool) -> miette::Result<()> {
    if json {
        let output = serde_json::to_string_pretty(entries)
            .map_err(|e| miette::miette!("Failed to serialize catalog: {}", e))?;
        println!("{}", output);
        return Ok(());
    }

    println!("{:<32} {:>10} {:>12}  {}", "MODEL", "SIZE", "DOWNLOADS", "DESCRIPTION");
    for entry in entries {
        let size = entry
            .size_bytes
            .map(|bytes| HumanBytes(bytes).to_string())
            .unwrap_or_else(|| "?".to_string());
        let id = if entry.works_locally {
            entry.id.clone()
        } else {
            format!("{} (cloud)", entry.id)
        };
        println!(
            "{:<32} {:>10} {:>12}  {}",
            id,
            size,
            HumanCount(entry.downloads).to_string(),
            entry.description
        );
    }
    Ok(())
}
