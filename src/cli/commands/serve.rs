use anyhow::Result;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::{initialize_app_state, AppConfig, ConfigOverrides};
use crate::router::create_router;
use crate::scheduler::SweepScheduler;

pub async fn serve(overrides: ConfigOverrides) -> Result<()> {
    trace!("Entering serve function");
    info!("Cashdesk application starting up");

    let config = AppConfig::load(overrides)?;
    debug!("Bind address: {}", config.bind_address);

    let state = match initialize_app_state(&config).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application state: {}", e);
            return Err(e);
        }
    };

    match state.desk.repair_legacy_business_dates(None).await {
        Ok(0) => debug!("No session business dates to repair"),
        Ok(repaired) => info!("Repaired business dates of {} sessions", repaired),
        Err(e) => warn!("Business date repair failed: {}", e),
    }

    let shutdown = CancellationToken::new();
    let scheduler = if config.sweep_enabled {
        let scheduler = SweepScheduler::new(state.desk.clone(), config.sweep_time()?, shutdown.clone());
        Some(tokio::spawn(scheduler.run()))
    } else {
        info!("Nightly sweep disabled");
        None
    };

    let app = create_router(state);

    info!("Starting server on {}", config.bind_address);
    let listener = match TcpListener::bind(&config.bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to address {}: {}", config.bind_address, e);
            return Err(e.into());
        }
    };

    info!("Cashdesk API server running on http://{}", config.bind_address);
    info!("Swagger UI available at http://{}/swagger-ui", config.bind_address);

    let signal = shutdown.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received");
            signal.cancel();
        })
        .await;

    shutdown.cancel();
    if let Some(handle) = scheduler {
        if let Err(e) = handle.await {
            warn!("Sweep scheduler ended abnormally: {}", e);
        }
    }

    if let Err(e) = served {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Server shutdown gracefully");
    Ok(())
}
