//! Schema migrations
//!
//! Each embedded migration runs once per database. The SHA-256 of its SQL is
//! recorded next to its id; a later mismatch means the file changed after it
//! was applied and the database refuses to open.

mod checksums;
mod embedded;
mod runner;

pub use runner::apply_migrations;
