//! Structured logging facility for the content graph
//!
//! - Single initialization point via `init(profile)`
//! - Operation boundary macros (`log_op_start!`, `log_op_end!`, `log_op_error!`)
//! - Test capture mode for deterministic assertions
//!
//! # Boundary Ownership
//!
//! Only the engine emits `start`/`end`/`end_error` for an operation. Core
//! handlers and the projection fold log at debug level so that a single
//! command produces exactly one boundary pair.
//!
//! # Usage
//!
//! ```rust
//! use contentgraph_core::logging_facility::{init, Profile};
//!
//! init(Profile::Development);
//! ```

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
