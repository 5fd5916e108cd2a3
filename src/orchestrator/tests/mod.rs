//! Unit tests for the orchestrator module.
