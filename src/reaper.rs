//! Expiry reaper — cancels stale pending bookings.
//!
//! Pending bookings never hold seats (seats are only marked sold on the paid
//! transition), so the sweep is a pure status change with no ledger release.

use std::time::Duration;

use crate::{db::Db, state::AppState};

pub fn spawn_expiry_reaper(state: AppState) {
    if !state.config.reaper_enabled {
        tracing::info!("Booking expiry reaper disabled");
        return;
    }

    let minutes = state.config.reaper_interval_minutes;
    tracing::info!(minutes, "Booking expiry reaper started");

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(minutes.saturating_mul(60)));
        // First immediate tick consumed so subsequent ticks wait the configured interval.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match run_expiry_sweep(&state.pool).await {
                Ok(count) if count > 0 => {
                    tracing::info!(count, "Cancelled expired pending bookings");
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::error!(error = %err, "Booking expiry sweep failed");
                }
            }
        }
    });
}

/// Cancel every pending booking whose hold has lapsed. Idempotent: the
/// status guard excludes already-processed rows from later sweeps.
pub async fn run_expiry_sweep(pool: &Db) -> anyhow::Result<u64> {
    let result = sqlx::query(
        "UPDATE bookings
         SET payment_status = 'cancelled', updated_at = UTC_TIMESTAMP()
         WHERE payment_status = 'pending'
           AND expires_at IS NOT NULL
           AND expires_at < UTC_TIMESTAMP()",
    )
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
