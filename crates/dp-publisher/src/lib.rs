//! devpub publisher: library crate behind the `dp-publisher` binary.
//!
//! Re-exports all modules so external crates (e.g. `dp-e2e-tests`) can
//! drive the orchestrator against mock connectors.

pub mod config;
pub mod orchestrator;
pub mod publish_loop;
pub mod startup;
