//! Inbound/outbound message shapes and classification types.
//!
//! These model the contract between the orchestration layer and the
//! excluded web/email layer: a normalized inbound record in, a fully
//! formed reply (synchronous, streaming, or batched) out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::dispatch::DispatchAttempt;

/// Primary intent of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Sales,
    Support,
    Partnership,
    General,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intent::Sales => write!(f, "sales"),
            Intent::Support => write!(f, "support"),
            Intent::Partnership => write!(f, "partnership"),
            Intent::General => write!(f, "general"),
        }
    }
}

impl FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sales" => Ok(Intent::Sales),
            "support" => Ok(Intent::Support),
            "partnership" => Ok(Intent::Partnership),
            "general" => Ok(Intent::General),
            other => Err(format!("invalid intent: '{other}'")),
        }
    }
}

/// Whether the sender is already known to the CRM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerType {
    NewLead,
    Existing,
}

impl CustomerType {
    pub fn is_new_lead(self) -> bool {
        matches!(self, CustomerType::NewLead)
    }
}

impl fmt::Display for CustomerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CustomerType::NewLead => write!(f, "new_lead"),
            CustomerType::Existing => write!(f, "existing"),
        }
    }
}

impl FromStr for CustomerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "new_lead" => Ok(CustomerType::NewLead),
            "existing" => Ok(CustomerType::Existing),
            other => Err(format!("invalid customer type: '{other}'")),
        }
    }
}

/// Combined classification of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub intent: Intent,
    pub customer_type: CustomerType,
}

/// A normalized inbound message, as produced by the (external) parser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Sender email address.
    pub sender: String,
    pub subject: String,
    pub body: String,
    /// When present, bypasses the intent rule engine.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification_hint: Option<Intent>,
}

/// Outcome status of processing one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Processed,
    Error,
}

/// The synchronous outbound shape returned to the web/email layer.
///
/// Always well-formed: provider exhaustion produces a deterministic
/// fallback reply with `status = Processed`, never a bare error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedReply {
    pub status: ReplyStatus,
    /// Recipient (the original sender).
    pub to: String,
    pub reply_subject: String,
    pub reply_body: String,
    pub intent: Intent,
    pub customer_type: CustomerType,
    pub is_new_lead: bool,
    /// Provider that produced the reply; `None` for the fallback template.
    pub provider_used: Option<String>,
    pub cache_hit: bool,
    pub attempts: Vec<DispatchAttempt>,
    pub processed_at: DateTime<Utc>,
}

/// One increment of a streaming reply.
///
/// The final chunk carries `done = true` and the full reply metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyChunk {
    pub text_delta: String,
    pub done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ProcessedReply>,
}
