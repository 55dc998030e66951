//! Integration tests for rsgo-bot.
//!
//! These tests drive the orchestrator end to end:
//! - Signal-driven lifecycle and trade execution
//! - Degradation under resource pressure
//! - Failure isolation and bounded shutdown

pub mod common;
