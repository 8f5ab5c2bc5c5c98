//! Common test utilities and fixtures
//!
//! This module provides shared test infrastructure including:
//! - Calendar stacks backed by in-memory or on-disk SQLite
//! - Leaf and confirmation builders
//! - Helpers for collecting published proof segments

pub mod fixtures;

// Re-export commonly used items
pub use fixtures::*;

// Re-export frequently used external types for convenience
pub use std::sync::Arc;
pub use std::time::Duration;
