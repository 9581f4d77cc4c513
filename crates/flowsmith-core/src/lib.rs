//! Workflow engine for Flowsmith.
//!
//! Parses and validates YAML templates, generates YAML back from templates,
//! and executes them against injected agent, tool and template-loading
//! collaborators. Depends only on `flowsmith-types`; no network or model
//! client lives here.

pub mod workflow;
