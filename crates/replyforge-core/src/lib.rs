//! Orchestration logic and port definitions for Replyforge.
//!
//! This crate defines the "ports" (the `ProviderAdapter` and
//! `DurableCacheStore` traits) that the infrastructure layer implements,
//! plus everything that coordinates them: health-aware provider ranking,
//! the two-tier cache, the single-flight dispatcher, streaming, batch
//! fan-out, and the message pipeline. It depends only on
//! `replyforge-types` -- never on `replyforge-infra` or any network/IO
//! crate.

pub mod batch;
pub mod cache;
pub mod classify;
pub mod dispatch;
pub mod fingerprint;
pub mod llm;
pub mod pipeline;
pub mod prompt;
pub mod stream;
