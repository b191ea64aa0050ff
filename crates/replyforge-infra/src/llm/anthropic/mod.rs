//! Claude-class provider adapter for the Anthropic Messages API.

pub mod client;
pub mod streaming;
pub mod types;

pub use client::AnthropicAdapter;
