//! tia-scheduler
//! Pushes a visit event for every enabled repository whose visit
//! frequency has elapsed.

pub mod config;
pub mod scheduler;

pub use scheduler::{run, SchedulerState};
