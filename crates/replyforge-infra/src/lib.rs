//! Infrastructure layer for Replyforge.
//!
//! Contains implementations of the ports defined in `replyforge-core`:
//! HTTP provider adapters (native Anthropic Messages API; OpenAI-compatible
//! clients covering OpenAI, Groq, and Gemini), the SQLite durable cache
//! tier, and configuration loading plus orchestrator bootstrap.

pub mod config;
pub mod llm;
pub mod sqlite;
