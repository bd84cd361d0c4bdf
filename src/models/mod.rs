//! Domain model module declarations.

pub mod advisory;
pub mod task;
pub mod user;
