//! Integrity rules over projected content graphs

pub mod invariants;
pub mod validation;

pub use invariants::{check, check_all, CheckResult, IntegrityCheck, IntegrityViolation};
pub use validation::validate_graph;
