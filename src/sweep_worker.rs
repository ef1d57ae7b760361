//! src/sweep_worker.rs

use crate::alert_engine::{AlertEngine, SweepOutcome};
use crate::configuration::AlertSettings;
use chrono::{DateTime, Days, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;

/// Runs a sweep at every configured hour, forever. Each sweep is awaited
/// before the next firing is computed, so sweeps never overlap and firings
/// missed while one was running are dropped.
pub async fn run_sweep_worker_until_stopped(
    engine: Arc<AlertEngine>,
    settings: AlertSettings,
) -> Result<(), anyhow::Error> {
    worker_loop(engine, settings.timezone, settings.sweep_hours).await
}

async fn worker_loop(
    engine: Arc<AlertEngine>,
    timezone: Tz,
    sweep_hours: Vec<u32>,
) -> Result<(), anyhow::Error> {
    let mut last_firing = None;
    loop {
        let now = Utc::now();
        let next = following_sweep(now, last_firing, timezone, &sweep_hours).ok_or_else(|| {
            anyhow::anyhow!("No valid sweep hour configured: {:?}", sweep_hours)
        })?;
        tracing::info!(next_sweep = %next.with_timezone(&timezone), "Waiting for next sweep.");
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        tokio::time::sleep(wait).await;
        last_firing = Some(next);

        match engine.sweep(Utc::now()).await {
            Ok(SweepOutcome::Completed(_)) | Ok(SweepOutcome::Skipped) => {}
            Err(e) => {
                tracing::error!(
                    error.cause_chain = ?e,
                    error.message = %e,
                    "Sweep failed. Waiting for the next one.",
                );
            }
        }
    }
}

/// Next firing once `last_firing` has run. `tokio::time::sleep` follows the
/// monotonic clock, so the wall clock may still read just before the firing
/// that was slept for; it must not be picked again.
fn following_sweep(
    now: DateTime<Utc>,
    last_firing: Option<DateTime<Utc>>,
    timezone: Tz,
    hours: &[u32],
) -> Option<DateTime<Utc>> {
    let after = last_firing.map_or(now, |last| now.max(last));
    next_sweep_after(after, timezone, hours)
}

/// First firing strictly after `now`: the earliest of `hours` (local, on the
/// hour) in `timezone`. Local times swallowed by a DST gap are skipped;
/// repeated ones fire once, at their first occurrence. Hours above 23 are
/// ignored.
pub fn next_sweep_after(now: DateTime<Utc>, timezone: Tz, hours: &[u32]) -> Option<DateTime<Utc>> {
    let today = now.with_timezone(&timezone).date_naive();
    // Two days always contain a valid firing unless every hour is skipped.
    (0..=2)
        .filter_map(|offset| today.checked_add_days(Days::new(offset)))
        .flat_map(move |day| {
            hours
                .iter()
                .filter_map(move |&hour| NaiveTime::from_hms_opt(hour, 0, 0).map(|t| day.and_time(t)))
        })
        .filter_map(|local| timezone.from_local_datetime(&local).earliest())
        .map(|firing| firing.with_timezone(&Utc))
        .filter(|firing| *firing > now)
        .min()
}
