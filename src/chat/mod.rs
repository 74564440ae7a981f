//! Conversation state
//!
//! The session that sits between the UI and the backend client.

pub mod session;

pub use session::{ChatObserver, ChatSession, ChatSnapshot, RejectReason, SendOutcome};
