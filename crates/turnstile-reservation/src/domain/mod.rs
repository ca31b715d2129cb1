//! Domain layer for the Reservation Engine.

pub mod booking;
pub mod commands;
