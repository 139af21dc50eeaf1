use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;

#[derive(Parser)]
#[command(name = "reconbox")]
#[command(version, about = "Multi-phase reconnaissance orchestrator")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the recon pipeline against a target
    Recon(ReconArgs),
    /// Show the marker ledger and phase journal for a project
    Status {
        /// Path to the project folder
        #[arg(long, conflicts_with = "here")]
        project: Option<PathBuf>,

        /// Use the current directory as the project folder
        #[arg(long)]
        here: bool,
    },
    /// Hand the terminal to the scan session for manual intervention
    Attach {
        #[arg(long, default_value = "reconbox")]
        session: String,
    },
    /// Abort the command running in the scan session's foreground
    Kill {
        #[arg(long, default_value = "reconbox")]
        session: String,
    },
}

#[derive(Args)]
pub struct ReconArgs {
    /// Path/IP/domain for target(s)
    #[arg(long)]
    pub target: String,

    /// Path to the project folder
    #[arg(long, conflicts_with = "here")]
    pub project: Option<PathBuf>,

    /// Use the current directory as the project folder
    #[arg(long)]
    pub here: bool,

    /// Bypass the tmux check
    #[arg(long)]
    pub bypass_tmux: bool,

    /// Force re-run of phases whose markers already exist
    #[arg(long)]
    pub force_phase: bool,

    /// Path to a file with a list of known hosts (bypasses discovery)
    #[arg(long)]
    pub hosts: Option<PathBuf>,

    /// Skip IP verification of targets
    #[arg(long)]
    pub skip_ip_check: bool,

    /// Path to a JSON file of orchestration settings
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Monitor the scan inside the persistent tmux session instead of
    /// blocking on a subprocess
    #[arg(long)]
    pub watch: bool,

    /// Original targets file, for grouping hosts by target (not implemented)
    #[arg(long)]
    pub targets: Option<PathBuf>,

    /// Scan-parameter config for the enumeration tool (not implemented)
    #[arg(long)]
    pub scan_params: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (writer, _guard) = tracing_appender::non_blocking(std::io::stderr());
    let default_filter = if cli.verbose {
        "reconbox=debug"
    } else {
        "reconbox=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(writer)
        .init();

    match &cli.command {
        Commands::Recon(args) => cmd::cmd_recon(args, cli.verbose).await?,
        Commands::Status { project, here } => cmd::cmd_status(project.clone(), *here)?,
        Commands::Attach { session } => cmd::cmd_attach(session).await?,
        Commands::Kill { session } => cmd::cmd_kill(session).await?,
    }

    Ok(())
}
