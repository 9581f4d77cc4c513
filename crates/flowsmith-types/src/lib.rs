//! Shared domain types for Flowsmith.
//!
//! Workflow templates, per-execution state and traces, and engine
//! configuration. No IO here; only serde, chrono, and thiserror.

pub mod config;
pub mod error;
pub mod execution;
pub mod workflow;
