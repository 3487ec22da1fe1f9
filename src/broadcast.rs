use chrono::Utc;

use crate::{
    error::AppResult,
    proto::Outbound,
    state::{ClientTx, Directory},
    store::VisitorStore,
};

/// Tracks which visitors are live and fans count/event updates out to every
/// connected client, mirroring presence into `active_visitors` on the side.
///
/// The directory is the source of truth for the broadcast count; the table
/// is advisory. Nothing here is transactional across the two, and nothing
/// is retried.
#[derive(Clone)]
pub struct Broadcaster {
    directory: Directory,
    store: VisitorStore,
}

impl Broadcaster {
    pub fn new(directory: Directory, store: VisitorStore) -> Self {
        Self { directory, store }
    }

    /// Registers the connection under `visitor_id` (overwriting any earlier
    /// channel for that id without closing it), upserts the presence row,
    /// then fans out the refreshed count followed by a `visitor_joined`.
    pub async fn join(
        &self,
        visitor_id: &str,
        page: Option<&str>,
        tx: ClientTx,
    ) -> AppResult<()> {
        self.directory.insert(visitor_id.to_string(), tx).await;
        self.store.upsert(visitor_id, page, Utc::now()).await?;
        tracing::info!(visitor_id, page, "visitor joined");

        let n = self.directory.len().await;
        self.broadcast(Outbound::active_count(n)).await;
        let n = self.directory.len().await;
        self.broadcast(Outbound::visitor_joined(n, visitor_id)).await;
        Ok(())
    }

    /// Refreshes the presence row and answers the *sending* connection with
    /// the current count. A heartbeat for a visitor that never joined is a
    /// no-op: presence rows only exist for registered connections.
    pub async fn heartbeat(
        &self,
        visitor_id: &str,
        page: Option<&str>,
        tx: &ClientTx,
    ) -> AppResult<()> {
        if !self.directory.contains(visitor_id).await {
            tracing::debug!(visitor_id, "heartbeat from unregistered visitor ignored");
            return Ok(());
        }
        self.store.touch(visitor_id, page, Utc::now()).await?;

        let n = self.directory.len().await;
        if tx.send(Outbound::active_count(n).message()).is_err() {
            self.reap(visitor_id).await;
        }
        Ok(())
    }

    /// Deregisters the visitor and deletes its row, then fans out the
    /// refreshed count and a `visitor_left`. A repeated leave finds nothing
    /// to remove and the delete is a storage-level no-op.
    pub async fn leave(&self, visitor_id: &str) -> AppResult<()> {
        self.directory.remove(visitor_id).await;
        self.store.delete(visitor_id).await?;
        tracing::info!(visitor_id, "visitor left");

        let n = self.directory.len().await;
        self.broadcast(Outbound::active_count(n)).await;
        let n = self.directory.len().await;
        self.broadcast(Outbound::visitor_left(n, visitor_id)).await;
        Ok(())
    }

    /// Same cleanup as an explicit leave, run when a registered connection's
    /// stream closes or errors. Skipped when the directory entry no longer
    /// belongs to the closing connection (the visitor already left, or
    /// re-joined on a newer connection). Best-effort: persistence failures
    /// are logged and swallowed.
    pub async fn disconnect(&self, visitor_id: &str, tx: &ClientTx) {
        if !self.directory.remove_if_same(visitor_id, tx).await {
            return;
        }
        if let Err(e) = self.store.delete(visitor_id).await {
            tracing::warn!(visitor_id, error = %e, "presence cleanup failed");
        }
        tracing::info!(visitor_id, "visitor disconnected");

        let n = self.directory.len().await;
        self.broadcast(Outbound::active_count(n)).await;
        let n = self.directory.len().await;
        self.broadcast(Outbound::visitor_left(n, visitor_id)).await;
    }

    /// Evicts every visitor whose row went stale before `cutoff`. Rows with
    /// no live registration (leftovers from a crash) are just deleted;
    /// registered ones are torn down like a disconnect.
    pub async fn evict_stale(&self, cutoff: chrono::DateTime<Utc>) -> AppResult<()> {
        for visitor_id in self.store.stale_since(cutoff).await? {
            tracing::info!(visitor_id, "evicting stale visitor");
            let was_registered = self.directory.remove(&visitor_id).await.is_some();
            if let Err(e) = self.store.delete(&visitor_id).await {
                tracing::warn!(visitor_id, error = %e, "stale row cleanup failed");
            }
            if !was_registered {
                continue;
            }
            let n = self.directory.len().await;
            self.broadcast(Outbound::active_count(n)).await;
            let n = self.directory.len().await;
            self.broadcast(Outbound::visitor_left(n, &visitor_id)).await;
        }
        Ok(())
    }

    /// Two-phase fan-out: send to a snapshot of the directory, collecting
    /// ids whose send fails, then drop the dead entries and their rows after
    /// the loop. At-most-once, no ordering guarantee across channels.
    async fn broadcast(&self, out: Outbound) {
        let msg = out.message();
        let mut dead = Vec::new();
        for (visitor_id, tx) in self.directory.snapshot().await {
            if tx.send(msg.clone()).is_err() {
                dead.push(visitor_id);
            }
        }
        for visitor_id in dead {
            self.reap(&visitor_id).await;
        }
    }

    /// Drops a connection that failed a send. Best-effort on the row.
    async fn reap(&self, visitor_id: &str) {
        tracing::debug!(visitor_id, "dropping dead connection");
        self.directory.remove(visitor_id).await;
        if let Err(e) = self.store.delete(visitor_id).await {
            tracing::warn!(visitor_id, error = %e, "dead connection cleanup failed");
        }
    }
}
