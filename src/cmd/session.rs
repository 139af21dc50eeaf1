//! The `attach` and `kill` subcommands: direct session manipulation.

use anyhow::Result;

use reconbox::session::{SessionDriver, TmuxBackend};

fn driver_for(session: &str) -> SessionDriver {
    // Capture dir only matters for monitored reads; manual session control
    // never opens the capture.
    let backend = TmuxBackend::new(session, &std::env::temp_dir());
    SessionDriver::new(Box::new(backend))
}

/// Hand the local terminal to the named session for manual intervention.
pub async fn cmd_attach(session: &str) -> Result<()> {
    let mut driver = driver_for(session);
    driver.interactive().await?;
    Ok(())
}

/// Abort whatever is running in the foreground of the named session.
/// The session itself survives and stays reusable.
pub async fn cmd_kill(session: &str) -> Result<()> {
    let driver = driver_for(session);
    driver.kill().await?;
    println!(
        "{} Sent interrupt sequence to session '{}'",
        console::style("✔").green(),
        session
    );
    Ok(())
}
