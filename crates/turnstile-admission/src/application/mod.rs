//! Application layer for the Admission Controller.

pub mod command_handlers;
pub mod event_bridge;
pub mod settings;
