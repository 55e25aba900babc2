// libs/appointment-cell/src/services/job.rs
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use shared_config::AppConfig;

use crate::services::generator::SlotGenerationService;

/// Run one generation pass over every approved doctor. Returns the number of slots created.
pub async fn run_generation_pass(config: &AppConfig) -> usize {
    let service = SlotGenerationService::new(config);

    match service.generate_for_all_approved(None, config.background_key()).await {
        Ok(reports) => {
            let created: usize = reports.iter().map(|r| r.created).sum();
            info!(
                "Background slot generation covered {} doctors, {} new slots",
                reports.len(),
                created
            );
            created
        }
        Err(e) => {
            error!("Background slot generation failed: {}", e);
            0
        }
    }
}

/// Spawn the periodic generation job when an interval is configured.
pub fn spawn_slot_generation_job(config: Arc<AppConfig>) -> Option<JoinHandle<()>> {
    let hours = config.slot_generation_interval_hours?;
    let period = Duration::from_secs(hours.saturating_mul(3600));

    info!("Slot generation job scheduled every {} hours", hours);

    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            debug!("Slot generation job tick");
            run_generation_pass(&config).await;
        }
    }))
}
