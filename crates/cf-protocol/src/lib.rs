//! cf-protocol: Shared types for Coffee.
//!
//! This crate defines the chat types passed between the core assistant
//! and model backends.

pub mod chat;

pub use chat::{ChatRequest, ChatTurn, Role};
