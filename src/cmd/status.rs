//! The `status` subcommand: marker ledger and phase journal for a project.

use anyhow::Result;
use console::style;
use std::path::PathBuf;

use reconbox::config::Config;
use reconbox::marker::MarkerStore;
use reconbox::orchestrator::StateManager;

pub fn cmd_status(project: Option<PathBuf>, here: bool) -> Result<()> {
    let config = Config::new(project, here, None)?;
    let store = MarkerStore::new(config.stage_dir.clone());
    let state = StateManager::new(config.state_file.clone());

    println!(
        "{} {}",
        style("Project:").bold(),
        config.project_dir.display()
    );

    let present = store.present("autorecon");
    if present.is_empty() {
        println!("{}", style("No completed phases").dim());
    } else {
        println!("{}", style("Completed phases:").bold());
        for tag in present {
            println!(
                "  {} autorecon ({}) — {}",
                style("✔").green(),
                tag,
                store.marker_path("autorecon", tag).display()
            );
        }
    }

    let entries = state.get_entries()?;
    if !entries.is_empty() {
        println!("{}", style("Recent activity:").bold());
        for entry in entries.iter().rev().take(10) {
            println!(
                "  {} {} {}",
                style(entry.timestamp.to_rfc3339()).dim(),
                entry.phase,
                match entry.status.as_str() {
                    "completed" => style(entry.status.clone()).green(),
                    "failed" => style(entry.status.clone()).red(),
                    _ => style(entry.status.clone()).yellow(),
                }
            );
        }
    }

    Ok(())
}
