//! Nightly auto-heal.
//!
//! Sweeps every tenant once at startup, then daily at the configured local
//! time of the organization timezone, until the shutdown token fires.

use chrono::NaiveTime;
use compute::CashDesk;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub struct SweepScheduler {
    desk: CashDesk,
    at: NaiveTime,
    shutdown: CancellationToken,
}

impl SweepScheduler {
    pub fn new(desk: CashDesk, at: NaiveTime, shutdown: CancellationToken) -> Self {
        Self { desk, at, shutdown }
    }

    pub async fn run(self) {
        info!("Sweep scheduler started, daily at {}", self.at);

        // Catch up on whatever was left open while the service was down
        self.sweep_once().await;

        loop {
            let now = self.desk.calendar().now();
            let next = self.desk.calendar().next_occurrence(now, self.at);
            let sleep_duration = (next - now).to_std().unwrap_or_default();
            debug!("Next sweep at {} (in {} minutes)", next, sleep_duration.as_secs() / 60);

            tokio::select! {
                _ = tokio::time::sleep(sleep_duration) => {}
                _ = self.shutdown.cancelled() => {
                    info!("Sweep scheduler received shutdown signal");
                    return;
                }
            }

            self.sweep_once().await;
        }
    }

    async fn sweep_once(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        match self.desk.sweep_all_tenants(false).await {
            Ok(report) => {
                if report.failed_count() > 0 {
                    warn!("Sweep failed for {} tenants", report.failed_count());
                }
                info!(
                    "Sweep over {} tenants closed {} sessions",
                    report.tenants.len(),
                    report.closed_count()
                );
            }
            Err(e) => error!("Sweep could not run: {}", e),
        }
    }
}
