// File: src/background/genesis.rs

use std::sync::Arc;

use crate::calendar::{Block, CalendarChain};
use crate::error::ServerResult;
use crate::lock::{LockKind, LockOutcome, LockScheduler};

/// Write the genesis block under the `genesis` lock
///
/// Returns `None` if another replica held the lock; that replica writes it.
pub async fn ensure_genesis(
    calendar: &Arc<CalendarChain>,
    scheduler: &LockScheduler,
) -> ServerResult<Option<Block>> {
    let outcome = scheduler
        .run_leased(LockKind::Genesis, |lease| async move {
            scheduler
                .write_ledger(&lease, calendar.blocking(|c| c.write_genesis()))
                .await
        })
        .await?;

    match outcome {
        LockOutcome::Completed(result) => result.map(Some),
        LockOutcome::Busy => {
            tracing::info!("Genesis lock held by another replica");
            Ok(None)
        }
    }
}
