#![forbid(unsafe_code)]

//! Personal task service: a task state machine with priority audit trail,
//! reminder dispatch over push and email, and advisory-driven
//! re-prioritization on per-user daily schedules.

pub mod advisory;
pub mod api;
pub mod config;
pub mod errors;
pub mod insights;
pub mod models;
pub mod notify;
pub mod orchestrator;
pub mod persistence;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
