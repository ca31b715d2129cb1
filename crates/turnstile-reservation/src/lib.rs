//! Turnstile: Reservation Engine bounded context.
//!
//! Arbitrates ticket availability with TTL-bound soft locks, records pending
//! bookings, and finalizes them in a single guarded database transaction.

pub mod application;
pub mod domain;
