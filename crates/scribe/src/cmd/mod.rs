//! Command implementations for the scribe CLI

pub mod append;
pub mod check;
