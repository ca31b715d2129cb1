//! Background task that feeds reservation notifications to the admission
//! queue.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};
use turnstile_core::notification::NotificationHandler;
use turnstile_store::notification_bus::NotificationConsumer;

/// Spawns the consumer loop. The task ends once every publisher handle is
/// dropped and in-flight deliveries settle.
pub fn spawn_consumer(
    consumer: NotificationConsumer,
    handler: Arc<dyn NotificationHandler>,
) -> JoinHandle<()> {
    let dead_letters = consumer.dead_letters();
    tokio::spawn(async move {
        info!("notification consumer started");
        consumer.run(handler).await;
        let dead = dead_letters.snapshot();
        if dead.is_empty() {
            info!("notification consumer stopped");
        } else {
            warn!(dead_letters = dead.len(), "notification consumer stopped with dead letters");
        }
    })
}
