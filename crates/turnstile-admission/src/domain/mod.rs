//! Domain layer for the Admission Controller.

pub mod commands;
pub mod outcome;
