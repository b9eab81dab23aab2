//! cf-core: Main application logic for Coffee.
//!
//! Response parsing, command and plan execution, the interactive session and
//! its persisted context. Exposed as a library for integration testing.

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod plan;
pub mod prompts;
pub mod response;
pub mod session;
pub mod shell;
pub mod state;
pub mod style;
pub mod terminal;

pub use error::CoreError;
