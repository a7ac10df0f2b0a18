//! Model management commands.

use hearth_runtime::PullPhase;
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};

use super::{manager, print_status};

/// Pull a model, rendering progress events as a progress bar.
pub(crate) async fn pull(model: &str) -> miette::Result<()> {
    let manager = manager();
    let mut handle = manager.pull_with_events(model, &print_status).await;

    // Ctrl-C severs the download; the final presence check still runs.
    let cancel = handle.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let style = ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
        .map_err(|e| miette::miette!("Invalid progress template: {}", e))?
        .progress_chars("=> ");
    let bar = ProgressBar::new(100).with_style(style);
    bar.set_message(format!("Pulling {}", model));

    while let Some(event) = handle.events.recv().await {
        if let Some(percent) = event.percent {
            bar.set_position(percent.round().clamp(0.0, 100.0) as u64);
        }
        match event.phase {
            PullPhase::Success => bar.finish_with_message(format!("{} is ready", model)),
            PullPhase::Failed => bar.abandon_with_message(event.status),
            _ => bar.set_message(event.status),
        }
    }

    if !handle.finish().await {
        return Err(miette::miette!("Failed to pull {}", model));
    }
    Ok(())
}

/// List installed models.
pub(crate) async fn list() -> miette::Result<()> {
    let manager = manager();
    let models = manager.list_installed().await;

    if models.is_empty() {
        println!("No models installed.");
        println!();
        println!("To find a model, run:");
        println!("  hearth catalog top");
        return Ok(());
    }

    println!("Installed models:");
    for model in models {
        match model.size {
            Some(size) => println!("  - {:<32} {}", model.name, HumanBytes(size)),
            None => println!("  - {}", model.name),
        }
    }
    Ok(())
}

pub(crate) async fn remove(model: &str) -> miette::Result<()> {
    let manager = manager();
    if !manager.delete_model(model).await {
        return Err(miette::miette!("Failed to delete {}", model));
    }
    println!("Deleted {}", model);
    Ok(())
}

pub(crate) async fn remove_all() -> miette::Result<()> {
    let manager = manager();
    let report = manager
        .delete_all(&print_status)
        .await
        .ok_or_else(|| miette::miette!("Could not list installed models; nothing was deleted"))?;

    println!("Deleted {} model(s).", report.deleted.len());
    if !report.is_clean() {
        return Err(miette::miette!(
            "Failed to delete: {}",
            report.failed.join(", ")
        ));
    }
    Ok(())
}
