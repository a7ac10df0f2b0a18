//! Runtime lifecycle commands.

use hearth_runtime::{RuntimeClient, RuntimeStatus};

use super::{manager, print_status};

pub(crate) async fn install() -> miette::Result<()> {
    let manager = manager();
    println!("Installing runtime...");
    let outcome = manager.install(&print_status).await;
    let message = outcome.message.unwrap_or_default();

    if !outcome.success {
        return Err(miette::miette!("Installation failed: {}", message));
    }
    println!("{}", message);
    Ok(())
}

pub(crate) async fn start() -> miette::Result<()> {
    let manager = manager();
    if !manager.ensure_running(&print_status).await {
        return Err(miette::miette!(
            "Runtime is {} at {}",
            manager.status(),
            manager.config().base_url
        ));
    }
    println!("Runtime is running at {}", manager.config().base_url);
    Ok(())
}

pub(crate) async fn status() -> miette::Result<()> {
    let manager = manager();
    let status = manager.refresh_status().await;

    println!("Status:     {}", status);
    println!("API:        {}", manager.config().base_url);
    if status == RuntimeStatus::Running {
        let client = RuntimeClient::with_url(manager.config().base_url.clone());
        match client.version().await {
            Ok(version) => println!("Version:    {}", version),
            Err(e) => tracing::debug!("Runtime version unavailable: {}", e),
        }
    }
    match manager.locator().find_runtime_executable() {
        Some(path) => println!("Executable: {}", path.display()),
        None => println!("Executable: not found"),
    }

    if status == RuntimeStatus::NotInstalled {
        println!();
        println!("To install the runtime, run:");
        println!("  hearth install");
    }
    Ok(())
}

pub(crate) async fn uninstall() -> miette::Result<()> {
    let manager = manager();
    println!("Uninstalling runtime...");
    if !manager.uninstall(&print_status).await {
        return Err(miette::miette!(
            "The runtime could not be fully removed; see the messages above"
        ));
    }
    println!("Runtime removed.");
    Ok(())
}

pub(crate) async fn reset(confirmed: bool) -> miette::Result<()> {
    if !confirmed {
        return Err(miette::miette!(
            "Reset deletes every model, removes the runtime and clears local state. Rerun with --yes to confirm."
        ));
    }

    let manager = manager();
    let outcome = manager.reset_everything(&print_status).await;
    if !outcome.success {
        return Err(miette::miette!("{}", outcome.message));
    }
    println!("{}", outcome.message);
    Ok(())
}
