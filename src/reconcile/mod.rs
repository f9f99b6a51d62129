//! Reconciliation of the graph and key-value sources.
//!
//! The merge is keyed by email; see [`merger::reconcile`] for the
//! conflict rules.

pub mod merger;

pub use merger::*;
