//! Foundation module - Core utilities and types
//!
//! - Math types and operations
//! - Pooled and keyed collections
//! - Logging setup

pub mod collections;
pub mod logging;
pub mod math;
