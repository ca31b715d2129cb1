//! In-process notification channel with per-key ordering.
//!
//! Deliveries sharing an ordering key are handed to the handler one at a
//! time, in publish order; different keys proceed concurrently. A delivery
//! the handler nacks is retried up to `max_deliveries` times and then parked
//! in the dead-letter list. A lane that stays idle for the configured
//! timeout is torn down, so the set of live lanes tracks the keys with
//! recent traffic rather than every key ever seen.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use turnstile_core::error::DomainError;
use turnstile_core::notification::{
    Acknowledgement, NotificationHandler, NotificationPublisher, RawNotification,
    ReservationNotification,
};

/// A delivery that exhausted its attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    /// The undeliverable notification.
    pub notification: RawNotification,
    /// How many times it was handed to the handler.
    pub deliveries: u32,
}

/// Shared handle on the dead-letter list.
#[derive(Debug, Clone, Default)]
pub struct DeadLetters {
    entries: Arc<Mutex<Vec<DeadLetter>>>,
}

impl DeadLetters {
    fn push(&self, letter: DeadLetter) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(letter);
        }
    }

    /// Returns a snapshot of the parked deliveries.
    #[must_use]
    pub fn snapshot(&self) -> Vec<DeadLetter> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

/// Shared gauge of the ordering lanes currently alive.
#[derive(Debug, Clone, Default)]
pub struct OpenLanes {
    count: Arc<AtomicUsize>,
}

impl OpenLanes {
    /// Number of lanes with a running worker.
    #[must_use]
    pub fn get(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    fn set(&self, count: usize) {
        self.count.store(count, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone)]
struct DeliveryPolicy {
    max_deliveries: u32,
    redelivery_delay: Duration,
    lane_idle_timeout: Duration,
    dead_letters: DeadLetters,
}

type Lanes = HashMap<String, mpsc::UnboundedSender<RawNotification>>;
type RetiredLane = (String, mpsc::UnboundedReceiver<RawNotification>);

/// Publishing side of the channel.
#[derive(Debug, Clone)]
pub struct NotificationBus {
    sender: mpsc::UnboundedSender<RawNotification>,
    publisher: String,
}

/// Consuming side of the channel.
#[derive(Debug)]
pub struct NotificationConsumer {
    receiver: mpsc::UnboundedReceiver<RawNotification>,
    policy: DeliveryPolicy,
    open_lanes: OpenLanes,
}

/// Creates a connected bus and consumer. `publisher` is stamped on every
/// notification's attributes.
#[must_use]
pub fn channel(publisher: &str, max_deliveries: u32) -> (NotificationBus, NotificationConsumer) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (
        NotificationBus {
            sender,
            publisher: publisher.to_owned(),
        },
        NotificationConsumer {
            receiver,
            policy: DeliveryPolicy {
                max_deliveries: max_deliveries.max(1),
                redelivery_delay: Duration::from_millis(100),
                lane_idle_timeout: Duration::from_secs(30),
                dead_letters: DeadLetters::default(),
            },
            open_lanes: OpenLanes::default(),
        },
    )
}

impl NotificationBus {
    /// Enqueues an already-encoded notification.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the consumer has shut down.
    pub fn send_raw(&self, raw: RawNotification) -> Result<(), DomainError> {
        self.sender
            .send(raw)
            .map_err(|_| DomainError::Infrastructure("notification bus closed".into()))
    }
}

#[async_trait]
impl NotificationPublisher for NotificationBus {
    #[instrument(skip(self, notification), fields(kind = %notification.kind, event_id = %notification.event_id()))]
    async fn publish(&self, notification: &ReservationNotification) -> Result<(), DomainError> {
        let raw = notification.encode(&self.publisher)?;
        self.send_raw(raw)?;
        info!("reservation notification published");
        Ok(())
    }
}

impl NotificationConsumer {
    /// Overrides the pause between redeliveries.
    #[must_use]
    pub fn with_redelivery_delay(mut self, delay: Duration) -> Self {
        self.policy.redelivery_delay = delay;
        self
    }

    /// Overrides how long an ordering lane may sit empty before it is reaped.
    #[must_use]
    pub fn with_lane_idle_timeout(mut self, timeout: Duration) -> Self {
        self.policy.lane_idle_timeout = timeout;
        self
    }

    /// Handle on the dead-letter list, usable after `run` consumes `self`.
    #[must_use]
    pub fn dead_letters(&self) -> DeadLetters {
        self.policy.dead_letters.clone()
    }

    /// Handle on the live-lane gauge, usable after `run` consumes `self`.
    #[must_use]
    pub fn open_lanes(&self) -> OpenLanes {
        self.open_lanes.clone()
    }

    /// Dispatches deliveries to `handler` until every bus handle is dropped
    /// and all in-flight deliveries have settled.
    pub async fn run(mut self, handler: Arc<dyn NotificationHandler>) {
        let mut lanes = Lanes::new();
        let mut workers: JoinSet<RetiredLane> = JoinSet::new();

        loop {
            tokio::select! {
                received = self.receiver.recv() => match received {
                    Some(raw) => self.dispatch(raw, &mut lanes, &mut workers, &handler),
                    None => break,
                },
                Some(joined) = workers.join_next(), if !workers.is_empty() => match joined {
                    Ok((key, rx)) => self.retire(&key, rx, &mut lanes, &mut workers, &handler),
                    Err(e) => error!(error = %e, "ordering lane worker failed"),
                },
            }
            self.open_lanes.set(lanes.len());
        }

        // Closing every lane lets its worker finish; a lane that went idle
        // just as the last deliveries arrived still gets them replayed.
        lanes.clear();
        while let Some(joined) = workers.join_next().await {
            if let Ok((key, rx)) = joined {
                self.retire(&key, rx, &mut lanes, &mut workers, &handler);
                lanes.clear();
            }
        }
        self.open_lanes.set(0);
    }

    fn dispatch(
        &self,
        raw: RawNotification,
        lanes: &mut Lanes,
        workers: &mut JoinSet<RetiredLane>,
        handler: &Arc<dyn NotificationHandler>,
    ) {
        let key = raw.ordering_key.clone();
        let raw = if let Some(lane) = lanes.get(&key) {
            match lane.send(raw) {
                Ok(()) => return,
                // The worker died; open a fresh lane for this key.
                Err(mpsc::error::SendError(raw)) => raw,
            }
        } else {
            raw
        };
        let lane = self.spawn_lane(key.clone(), workers, handler);
        if let Err(mpsc::error::SendError(raw)) = lane.send(raw) {
            error!(ordering_key = %raw.ordering_key, "ordering lane closed; dropping delivery");
        }
        lanes.insert(key, lane);
    }

    /// Removes a lane whose worker went idle. Deliveries that reached the
    /// lane after the worker stopped listening are replayed, in order, on a
    /// fresh lane.
    fn retire(
        &self,
        key: &str,
        mut rx: mpsc::UnboundedReceiver<RawNotification>,
        lanes: &mut Lanes,
        workers: &mut JoinSet<RetiredLane>,
        handler: &Arc<dyn NotificationHandler>,
    ) {
        lanes.remove(key);
        rx.close();
        let mut leftovers = Vec::new();
        while let Ok(raw) = rx.try_recv() {
            leftovers.push(raw);
        }
        if leftovers.is_empty() {
            debug!(ordering_key = %key, "idle ordering lane reaped");
            return;
        }
        for raw in leftovers {
            self.dispatch(raw, lanes, workers, handler);
        }
    }

    fn spawn_lane(
        &self,
        key: String,
        workers: &mut JoinSet<RetiredLane>,
        handler: &Arc<dyn NotificationHandler>,
    ) -> mpsc::UnboundedSender<RawNotification> {
        let (tx, rx) = mpsc::unbounded_channel();
        workers.spawn(drain_lane(key, rx, Arc::clone(handler), self.policy.clone()));
        tx
    }
}

/// Delivers the lane's notifications until it is closed or stays empty for
/// the idle timeout, then hands its receiver back for reaping.
async fn drain_lane(
    key: String,
    mut rx: mpsc::UnboundedReceiver<RawNotification>,
    handler: Arc<dyn NotificationHandler>,
    policy: DeliveryPolicy,
) -> RetiredLane {
    while let Ok(Some(raw)) = tokio::time::timeout(policy.lane_idle_timeout, rx.recv()).await {
        deliver(&raw, handler.as_ref(), &policy).await;
    }
    (key, rx)
}

async fn deliver(raw: &RawNotification, handler: &dyn NotificationHandler, policy: &DeliveryPolicy) {
    let max_deliveries = policy.max_deliveries;
    for attempt in 1..=max_deliveries {
        match handler.handle(raw).await {
            Acknowledgement::Ack => return,
            Acknowledgement::Nack => {
                warn!(ordering_key = %raw.ordering_key, attempt, "delivery nacked");
                if attempt < max_deliveries && !policy.redelivery_delay.is_zero() {
                    tokio::time::sleep(policy.redelivery_delay).await;
                }
            }
        }
    }
    error!(
        ordering_key = %raw.ordering_key,
        deliveries = max_deliveries,
        "delivery exhausted its attempts; dead-lettered"
    );
    policy.dead_letters.push(DeadLetter {
        notification: raw.clone(),
        deliveries: max_deliveries,
    });
}
