//! Application layer containing the approval orchestration.
//!
//! `ApprovalEngine` is the primary entry point. It composes the status
//! resolver, the step transition service and the unified approval feed over
//! the boxed storage ports.

pub mod engine;
pub mod feed;
pub mod resolver;
pub mod transition;
