use chrono::{Duration, Utc};
use tokio::time;

use crate::broadcast::Broadcaster;

/// Clients heartbeat every ~30 s; three missed beats means gone.
pub const SWEEP_EVERY: time::Duration = time::Duration::from_secs(30);
pub const STALE_AFTER_SECS: i64 = 90;

/// Evicts visitors that stopped heartbeating without a `leave` or a
/// transport error (half-open connections never fail a send on their own).
pub async fn task(bc: Broadcaster) {
    let mut tick = time::interval(SWEEP_EVERY);
    loop {
        tick.tick().await;
        let cutoff = Utc::now() - Duration::seconds(STALE_AFTER_SECS);
        if let Err(e) = bc.evict_stale(cutoff).await {
            tracing::warn!(error = %e, "presence sweep failed");
        }
    }
}
