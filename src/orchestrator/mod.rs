//! Task orchestration services.
//!
//! Covers user-facing task operations, the periodic reminder scan, the
//! advisory-driven re-prioritization pass with its per-user daily
//! triggers, and natural-language task creation.

pub mod analysis;
pub mod analysis_scheduler;
pub mod nlp;
pub mod reminder_scanner;
pub mod task_service;
