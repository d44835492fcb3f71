//! Shared utilities

pub mod angles;
pub mod time;
