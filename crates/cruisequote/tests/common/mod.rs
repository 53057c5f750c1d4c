//! Shared test utilities for cruisequote integration tests.
//!
//! This module provides:
//! - `TestHarness`: temp upload directory, in-memory database with a seeded
//!   catalog, and a scripted model client
//! - Builders for `.docx` fixtures and model replies

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{ScriptedModelClient, TestHarness};
