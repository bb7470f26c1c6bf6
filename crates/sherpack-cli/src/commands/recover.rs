//! Recover command - recover a stuck release

use console::style;
use miette::IntoDiagnostic;
use sherpack_kube::KubeClient;

use crate::error::Result;
use crate::util;

/// Run the recover command
pub async fn run(
    name: &str,
    namespace: &str,
    storage_driver: Option<&str>,
) -> Result<()> {
    println!(
        "{} Attempting to recover release {}",
        style("→").blue().bold(),
        style(name).cyan()
    );

    let storage = util::open_storage(storage_driver, util::default_file_storage_dir()).await?;

    // Create client
    let client = KubeClient::new(storage).await.into_diagnostic()?;

    // Attempt recovery
    let release = client.recover(namespace, name).await.into_diagnostic()?;

    println!(
        "{} Successfully recovered {} (now marked as {})",
        style("✓").green().bold(),
        style(&release.name).cyan(),
        style(release.state.status_name()).yellow()
    );

    println!("\nYou can now retry the operation:");
    println!("  sherpack upgrade {} <pack>", name);

    Ok(())
}
