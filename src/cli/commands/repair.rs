use anyhow::Result;
use tracing::{info, trace};

use crate::config::{initialize_app_state, AppConfig, ConfigOverrides};

pub async fn repair_dates(overrides: ConfigOverrides, tenant_id: Option<i32>) -> Result<()> {
    trace!("Entering repair_dates function");
    let config = AppConfig::load(overrides)?;
    let state = initialize_app_state(&config).await?;

    let repaired = state.desk.repair_legacy_business_dates(tenant_id).await?;
    info!("Repaired business dates of {} sessions", repaired);
    println!("Repaired {} sessions", repaired);
    Ok(())
}
