//! Turnstile: Admission Controller bounded context.
//!
//! Maintains a per-event virtual waiting line, admits users one at a time as
//! reservations finish, and keeps connected clients informed of their place.

pub mod application;
pub mod domain;
