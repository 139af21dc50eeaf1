//! The `recon` subcommand: verify targets, then run the phase pipeline.

use anyhow::{Context, Result, bail};

use reconbox::config::{Config, parse_targets, verify_target};
use reconbox::orchestrator::{PipelineOptions, ReconPipeline};
use reconbox::ui::ReconUI;

use crate::ReconArgs;

/// A dropped SSH connection must not orphan a multi-hour scan, so recon
/// refuses to run outside tmux unless explicitly bypassed.
fn check_tmux_guard(bypass: bool) -> Result<()> {
    if bypass || std::env::var_os("TMUX").is_some() {
        return Ok(());
    }
    bail!("Not inside a tmux session. Start one, or pass --bypass-tmux to run anyway.");
}

pub async fn cmd_recon(args: &ReconArgs, verbose: bool) -> Result<()> {
    check_tmux_guard(args.bypass_tmux)?;

    let targets = parse_targets(&args.target)?;
    if targets.is_empty() {
        bail!("Target list {} is empty", args.target);
    }
    if args.skip_ip_check {
        println!(
            "{} {} target(s), IP check skipped",
            console::style("≡").dim(),
            targets.len()
        );
    } else {
        for target in &targets {
            verify_target(target)
                .context("Target verification failed (--skip-ip-check to override)")?;
        }
        println!(
            "{} {} target(s) verified",
            console::style("✔").green(),
            targets.len()
        );
    }

    let config = Config::new(args.project.clone(), args.here, args.config.as_deref())?;

    let opts = PipelineOptions {
        force: args.force_phase,
        watch: args.watch,
        hosts_file: args.hosts.clone(),
        targets_file: args.targets.clone(),
        scan_params: args.scan_params.clone(),
    };

    let pipeline = ReconPipeline::new(config, opts);
    let total = pipeline.assemble_phases().map(|p| p.len()).unwrap_or(1);
    let ui = ReconUI::new(total as u64, verbose);

    let phases = pipeline.run(&ui).await?;

    println!(
        "\n{} Recon pipeline finished: {} phase(s)",
        console::style("✔").green().bold(),
        phases.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_allows_bypass_flag() {
        check_tmux_guard(true).unwrap();
    }
}
