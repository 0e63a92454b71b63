use std::future::Future;
use tracing::debug;

use super::{events::EventEnvelope, hub::HubHandle};
use crate::shared::AppError;

/// Runs a persistence write and announces it only once it has succeeded
///
/// A failed write is returned unchanged and nothing is published. After a
/// successful write the caller always sees success: delivery problems stay
/// inside the hub.
pub async fn write_then_notify<T, W, N>(
    hub: &HubHandle,
    write: W,
    notification: N,
) -> Result<T, AppError>
where
    W: Future<Output = Result<T, AppError>>,
    N: FnOnce(&T) -> EventEnvelope,
{
    let written = write.await?;

    let event = notification(&written);
    let event_type = event.event_type();
    let outcome = hub.publish(event);
    debug!(event_type = event_type, outcome = ?outcome, "Write committed, event published");

    Ok(written)
}
