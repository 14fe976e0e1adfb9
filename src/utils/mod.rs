//! Utility modules for common functionality.
//!
//! This module contains utility functions and helpers used throughout
//! the application, such as logging configuration.

pub mod logger;
