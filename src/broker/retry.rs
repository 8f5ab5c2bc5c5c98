// File: src/broker/retry.rs

use std::time::Duration;

use crate::error::ServerResult;
use crate::traits::{MessageBroker, OutboundMessage};

/// Fixed backoff between publish attempts
pub const DEFAULT_PUBLISH_RETRY: Duration = Duration::from_millis(1000);

/// Publish, retrying recoverable failures with a fixed backoff
///
/// For hand-offs that follow a committed block write: the block cannot be
/// undone, so the message has to go out eventually. Errors that are not
/// recoverable are returned.
pub async fn publish_until_accepted(
    broker: &dyn MessageBroker,
    queue: &str,
    message: OutboundMessage,
    backoff: Duration,
) -> ServerResult<()> {
    let mut attempt: u32 = 0;

    loop {
        match broker.publish(queue, message.clone()).await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_recoverable() => {
                attempt += 1;
                tracing::warn!(
                    queue,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "Publish failed, retrying"
                );
                tokio::time::sleep(backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::RecordingBroker;
    use crate::traits::{QUEUE_BTC_TX, QUEUE_CALENDAR};
    use crate::anchoring::AnchorChain;

    fn submission() -> OutboundMessage {
        OutboundMessage::AnchorSubmission {
            chain: AnchorChain::Btc,
            anchor_id: 3,
            anchor_root: "ab".repeat(32),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_broker_accepts() {
        let broker = RecordingBroker::new();
        broker.fail_next_publishes(3);

        publish_until_accepted(&broker, QUEUE_BTC_TX, submission(), Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(broker.published_to(QUEUE_BTC_TX), vec![submission()]);
        assert!(broker.published_to(QUEUE_CALENDAR).is_empty());
    }
}
