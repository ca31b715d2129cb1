//! Turnstile Core: shared domain model and store ports.
//!
//! This crate defines the types and traits that the reservation engine and
//! the admission controller depend on. It contains no infrastructure code:
//! every store is reached through a port trait so adapters can be swapped
//! between Redis/PostgreSQL and in-memory fakes.

pub mod clock;
pub mod command;
pub mod error;
pub mod guard;
pub mod lock;
pub mod model;
pub mod notification;
pub mod queue;
pub mod realtime;
pub mod repository;
