//! cf-backend: Model provider adapters for Coffee.
//!
//! This crate provides the `ModelClient` seam and its implementations:
//! a Groq chat-completions client and a scripted mock for tests.

pub mod client;
pub mod groq;
pub mod mock;

pub use client::{ApiKeySource, BackendError, ModelClient};
pub use groq::GroqClient;
pub use mock::{MockModel, MockResponse};
