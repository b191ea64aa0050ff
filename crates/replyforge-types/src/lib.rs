//! Shared domain types for Replyforge.
//!
//! This crate contains the types used across the orchestration layer:
//! provider contracts, dispatch requests and results, cache entries,
//! message classification, configuration, and their error taxonomies.
//!
//! Zero infrastructure dependencies -- only serde, serde_json, uuid,
//! chrono, thiserror.

pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod llm;
pub mod message;
