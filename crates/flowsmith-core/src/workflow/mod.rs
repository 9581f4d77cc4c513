//! Workflow templates and their execution.
//!
//! - `parser` -- YAML syntax to `Template`, with classified parse errors
//! - `generator` -- `Template` back to canonical YAML
//! - `validator` -- semantic checks (references, capabilities, cycles)
//! - `dag` -- execution graph, cycle detection, wave preview
//! - `substitution` -- `{placeholder}` resolution against a scope
//! - `context` -- scope layering and per-node resolved inputs
//! - `condition` -- conditional edge rule evaluation
//! - `dispatch` -- capability to handler table
//! - `invoker` -- collaborator traits (agents, tools, sub-workflow loading)
//! - `retry` -- transient-failure retry with linear backoff
//! - `checkpoint` -- resumable execution snapshots
//! - `registry` -- named template cache with trigger lookup
//! - `executor` -- dynamic wave scheduler and sub-workflow recursion

pub mod checkpoint;
pub mod condition;
pub mod context;
pub mod dag;
pub mod dispatch;
pub mod executor;
pub mod generator;
pub mod invoker;
pub mod parser;
pub mod registry;
pub mod retry;
pub mod substitution;
pub mod validator;

#[cfg(test)]
pub(crate) mod test_support;
