//! Test-only crate: see `tests/` for end-to-end scenarios that run the
//! orchestrator, publish loops and mock brokers together.
