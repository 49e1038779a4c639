//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the scheduler:
//! - Math types and the matrix helpers used for batching and shadows
//! - Frame timing
//! - Logging utilities

pub mod math;
pub mod time;
pub mod logging;
