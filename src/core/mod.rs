//! Core module - conversational relay.
//!
//! - Per-user conversation history with TTL
//! - Round-robin operator assignment
//! - Input normalization and reply generation
//! - The per-message delivery pipeline

pub mod history;
pub mod normalize;
pub mod relay;
pub mod reply;
pub mod rotation;

pub use history::{HistoryStore, Role, Turn};
pub use relay::{Outcome, Relay};
pub use rotation::OperatorRotation;
