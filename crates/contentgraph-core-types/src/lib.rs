//! Core types shared across the content graph crates
//!
//! This crate provides foundational types used by the error and logging
//! facilities of every other crate in the workspace:
//!
//! - **Correlation ids**: RequestId, TraceId
//! - **Schema constants**: Canonical field keys and event names

pub mod correlation;
pub mod schema;

pub use correlation::{RequestId, TraceId};
