use anyhow::Result;
use tracing::{info, trace, warn};

use crate::config::{initialize_app_state, AppConfig, ConfigOverrides};

/// One-shot sweep of every tenant; prints the report as JSON.
pub async fn sweep(overrides: ConfigOverrides, dry_run: bool) -> Result<()> {
    trace!("Entering sweep function");
    let config = AppConfig::load(overrides)?;
    let state = initialize_app_state(&config).await?;

    let report = state.desk.sweep_all_tenants(dry_run).await?;
    if report.failed_count() > 0 {
        warn!("Sweep failed for {} tenants", report.failed_count());
    }
    info!(
        "Sweep finished over {} tenants, {} sessions closed",
        report.tenants.len(),
        report.closed_count()
    );

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
