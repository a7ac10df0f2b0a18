//! Info command - show configuration and what was detected on this machine.

use hearth_catalog::CatalogConfig;
use hearth_runtime::{PlatformLocator, RuntimeConfig};

use crate::state::FileStateStore;

pub(crate) fn run() -> miette::Result<()> {
    let runtime = RuntimeConfig::from_env();
    let catalog = CatalogConfig::from_env();
    let locator = PlatformLocator::detect();
    let state = FileStateStore::default_location();

    println!("Hearth");
    println!("======");
    println!();
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("Runtime:");
    println!("  API:            {}", runtime.base_url);
    println!("  Start timeout:  {}s", runtime.start_timeout.as_secs());
    match locator.find_runtime_executable() {
        Some(path) => println!("  Executable:     {}", path.display()),
        None => println!("  Executable:     not found"),
    }
    println!("  Searched:");
    for candidate in locator.candidates() {
        println!("    {}", candidate.display());
    }
    println!();

    println!("Package managers:");
    let managers = locator.available_package_managers();
    if managers.is_empty() {
        println!("  none found");
    }
    for pm in managers {
        let note = if pm.invocable { "" } else { " (not invocable)" };
        println!("  {}{}", pm.name, note);
    }
    println!();

    println!("Catalog:");
    println!("  Hub:            {}", catalog.hub_url);
    match &catalog.cache_path {
        Some(path) => println!("  Snapshot:       {}", path.display()),
        None => println!("  Snapshot:       disabled"),
    }
    println!();

    println!("Local state:");
    println!("  Cache:          {}", state.cache_dir().display());
    println!("  Onboarding:     {}", state.onboarding_flag().display());

    Ok(())
}
