//! Broadcast hub: owns every viewer channel and fans notifications out to them.
//!
//! Each viewer is an unbounded queue drained by that viewer's socket writer,
//! so per-viewer order is the order `broadcast` was called in. A viewer whose
//! writer has gone away is dropped the next time a broadcast fails on it.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error};
use uuid::Uuid;

use crate::protocol::ServerMsg;

pub type ViewerTx = mpsc::UnboundedSender<String>;
pub type ViewerRx = mpsc::UnboundedReceiver<String>;

#[derive(Clone, Default)]
pub struct Hub {
    viewers: Arc<RwLock<HashMap<Uuid, ViewerTx>>>,
}

impl Hub {
    pub fn new() -> Self { Self::default() }

    pub async fn register(&self, tx: ViewerTx) -> Uuid {
        let id = Uuid::new_v4();
        self.viewers.write().await.insert(id, tx);
        debug!(%id, "viewer registered");
        id
    }

    pub async fn unregister(&self, id: Uuid) {
        if self.viewers.write().await.remove(&id).is_some() {
            debug!(%id, "viewer unregistered");
        }
    }

    pub async fn len(&self) -> usize { self.viewers.read().await.len() }

    /// Sends `msg` to every viewer and returns how many accepted it.
    pub async fn broadcast(&self, msg: &ServerMsg) -> usize {
        let text = match msg.to_text() {
            Ok(t) => t,
            Err(e) => {
                error!("serialize broadcast: {e}");
                return 0;
            }
        };

        let mut viewers = self.viewers.write().await;
        viewers.retain(|id, tx| match tx.send(text.clone()) {
            Ok(()) => true,
            Err(_) => {
                debug!(%id, "pruning dead viewer");
                false
            }
        });
        viewers.len()
    }
}
