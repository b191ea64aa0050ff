//! Concrete provider adapters.
//!
//! - `anthropic`: Claude-class adapter speaking the Anthropic Messages API
//! - `openai_compat`: one adapter for every OpenAI-compatible backend
//!   (OpenAI-class, Llama-class via Groq, Gemini-class via Google's
//!   OpenAI-compatible endpoint)

pub mod anthropic;
pub mod openai_compat;
