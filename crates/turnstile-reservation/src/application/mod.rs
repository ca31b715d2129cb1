//! Application layer for the Reservation Engine.

pub mod command_handlers;
pub mod query_handlers;
pub mod settings;
