// File: src/broker/settle.rs

use crate::error::ServerError;
use crate::traits::{DeliveryTag, MessageBroker};

/// Settle source deliveries once the work they fed has finished
///
/// Success acks. A failure nacks for redelivery unless the error says
/// redelivering cannot help, in which case the poison deliveries are acked.
/// Settlement failures are logged; the broker redelivers unsettled messages
/// on its own.
pub async fn settle(broker: &dyn MessageBroker, tags: &[DeliveryTag], failure: Option<&ServerError>) {
    let redeliver = failure.is_some_and(ServerError::should_redeliver);

    for &tag in tags {
        let result = if redeliver {
            broker.nack(tag).await
        } else {
            broker.ack(tag).await
        };
        if let Err(e) = result {
            tracing::warn!(tag, redeliver, error = %e, "Failed to settle delivery");
        }
    }
}
