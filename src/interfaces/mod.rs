//! Adapters binding the engine to files: the directory configuration, the
//! CSV command stream and the CSV status report.

pub mod config;
pub mod csv;
pub mod runner;
