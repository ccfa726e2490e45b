//! LLM plumbing for the Luni pet triage assistant.
//!
//! This crate knows nothing about cases or sessions. It provides the prompts,
//! a chat-completion client abstraction (with an OpenAI-compatible HTTP
//! implementation behind the `http` feature), and parsers for the
//! classifier JSON and the reply control markers.

pub mod client;
pub mod extraction;
#[cfg(feature = "http")]
pub mod http;
pub mod prompts;

pub use client::*;
pub use extraction::*;
#[cfg(feature = "http")]
pub use http::HttpLlmClient;
pub use prompts::*;
