//! Logging and trace export setup for Flowsmith binaries.

pub mod tracing_setup;
