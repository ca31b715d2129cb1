//! Shared test fakes and utilities for the Turnstile ticketing core.
//!
//! Every store port has an in-memory implementation whose TTLs are measured
//! against an injected [`Clock`](turnstile_core::clock::Clock), so tests can
//! let locks lapse by advancing a [`ManualClock`] instead of sleeping.

mod channels;
mod clock;
mod guard;
mod lock;
mod publisher;
mod queue;
mod repository;

pub use channels::{ChannelCall, InMemoryChannelRelay, RecordingQueueChannels};
pub use clock::{FixedClock, ManualClock};
pub use guard::InMemoryIdempotencyGuard;
pub use lock::{FailingSoftLockStore, InMemorySoftLockStore};
pub use publisher::RecordingPublisher;
pub use queue::{FailingAdmissionQueue, InMemoryAdmissionQueue};
pub use repository::{InMemoryBookingRepository, ticket};
