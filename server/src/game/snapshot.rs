//! Background snapshot task for game state.
//!
//! Spawns a tokio task that periodically writes every registered game to the
//! persistence gateway. A failed save is logged and never stops the loop, so
//! the durable copy may lag memory by up to one interval.

use std::sync::Arc;
use std::time::Duration;

use crate::game::registry::SessionRegistry;

/// Spawn a background task that saves all games every `interval_secs` seconds.
pub fn spawn_snapshot_task(
    registry: Arc<SessionRegistry>,
    interval_secs: u64,
) -> tokio::task::JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;

            let registry = registry.clone();
            match tokio::task::spawn_blocking(move || {
                let total = registry.len();
                (registry.snapshot_all(), total)
            })
            .await
            {
                Ok((saved, total)) if saved < total => {
                    tracing::warn!("Game snapshot: saved {} of {} games", saved, total);
                }
                Ok((saved, _)) => {
                    tracing::debug!("Game snapshot: saved {} games", saved);
                }
                Err(e) => {
                    tracing::error!("Game snapshot task join error: {}", e);
                }
            }
        }
    })
}
