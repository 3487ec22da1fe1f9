use std::{collections::HashMap, sync::Arc};

use axum::extract::ws::Message;
use tokio::sync::{mpsc, RwLock};

/// Outbound queue of one connected client.
pub type ClientTx = mpsc::UnboundedSender<Message>;

/* ------------ connection directory ------------ */

/// visitor_id → outbound channel of its live connection.
///
/// One entry per visitor: a later `join` under the same id overwrites the
/// earlier channel (last-writer-wins) and never closes the stale one.
/// Cloneable handle, shared by every connection task and the sweep.
#[derive(Clone, Default)]
pub struct Directory {
    inner: Arc<RwLock<HashMap<String, ClientTx>>>,
}

impl Directory {
    pub async fn insert(&self, visitor_id: String, tx: ClientTx) {
        self.inner.write().await.insert(visitor_id, tx);
    }

    pub async fn remove(&self, visitor_id: &str) -> Option<ClientTx> {
        self.inner.write().await.remove(visitor_id)
    }

    /// Removes the entry only if it still points at `tx`'s channel, so the
    /// teardown of an orphaned connection cannot evict a newer registration
    /// under the same visitor id.
    pub async fn remove_if_same(&self, visitor_id: &str, tx: &ClientTx) -> bool {
        let mut map = self.inner.write().await;
        match map.get(visitor_id) {
            Some(cur) if cur.same_channel(tx) => {
                map.remove(visitor_id);
                true
            }
            _ => false,
        }
    }

    pub async fn contains(&self, visitor_id: &str) -> bool {
        self.inner.read().await.contains_key(visitor_id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Clones out the current entries for a broadcast loop; the live map may
    /// change while the caller iterates.
    pub async fn snapshot(&self) -> Vec<(String, ClientTx)> {
        self.inner
            .read()
            .await
            .iter()
            .map(|(id, tx)| (id.clone(), tx.clone()))
            .collect()
    }
}
