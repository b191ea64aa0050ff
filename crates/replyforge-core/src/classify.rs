//! Intent classification and the CRM lookup port.
//!
//! Intent comes from a keyword rule engine over subject + body (an
//! explicit hint on the inbound message short-circuits it). Lead
//! classification is a lookup through the `CrmStore` port -- CRM
//! persistence itself is an external collaborator.

use replyforge_types::message::{CustomerType, InboundMessage, Intent};

/// A CRM record for a known contact.
#[derive(Debug, Clone)]
pub struct CrmRecord {
    pub email: String,
    pub name: Option<String>,
    pub customer_type: CustomerType,
}

/// Lookup port over the external CRM record store, keyed by email.
///
/// Uses RPITIT; implementations are supplied by the embedding
/// application. A sender with no record is a new lead.
pub trait CrmStore: Send + Sync {
    fn find_by_email(
        &self,
        email: &str,
    ) -> impl std::future::Future<Output = Option<CrmRecord>> + Send;
}

/// Keyword rule engine for intent extraction.
///
/// Rules are checked in declaration order; the first intent with a
/// matching keyword wins, defaulting to `General`.
pub struct IntentClassifier {
    rules: Vec<(Intent, &'static [&'static str])>,
}

const SALES_KEYWORDS: &[&str] = &[
    "demo",
    "pricing",
    "buy",
    "purchase",
    "cost",
    "price",
    "interested",
    "product",
];

const SUPPORT_KEYWORDS: &[&str] = &[
    "help",
    "issue",
    "problem",
    "bug",
    "error",
    "not working",
    "support",
];

const PARTNERSHIP_KEYWORDS: &[&str] =
    &["partnership", "collaborate", "partner", "business", "deal"];

const GENERAL_KEYWORDS: &[&str] = &["hello", "hi", "information", "question", "inquiry"];

impl IntentClassifier {
    pub fn new() -> Self {
        Self {
            rules: vec![
                (Intent::Sales, SALES_KEYWORDS),
                (Intent::Support, SUPPORT_KEYWORDS),
                (Intent::Partnership, PARTNERSHIP_KEYWORDS),
                (Intent::General, GENERAL_KEYWORDS),
            ],
        }
    }

    /// Classify the message's primary intent.
    pub fn classify(&self, message: &InboundMessage) -> Intent {
        if let Some(hint) = message.classification_hint {
            return hint;
        }

        let haystack = format!("{} {}", message.subject, message.body).to_lowercase();
        for (intent, keywords) in &self.rules {
            if keywords.iter().any(|keyword| haystack.contains(keyword)) {
                return *intent;
            }
        }
        Intent::General
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(subject: &str, body: &str) -> InboundMessage {
        InboundMessage {
            sender: "someone@example.com".to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            classification_hint: None,
        }
    }

    #[test]
    fn test_sales_keywords() {
        let classifier = IntentClassifier::new();
        assert_eq!(
            classifier.classify(&message("Pricing question", "How much does it cost?")),
            Intent::Sales
        );
        assert_eq!(
            classifier.classify(&message("", "I'd like a demo of the platform")),
            Intent::Sales
        );
    }

    #[test]
    fn test_support_keywords() {
        let classifier = IntentClassifier::new();
        assert_eq!(
            classifier.classify(&message("Login broken", "I hit an error signing in")),
            Intent::Support
        );
        assert_eq!(
            classifier.classify(&message("", "the export is not working")),
            Intent::Support
        );
    }

    #[test]
    fn test_partnership_keywords() {
        let classifier = IntentClassifier::new();
        assert_eq!(
            classifier.classify(&message("", "We'd love to collaborate with your team")),
            Intent::Partnership
        );
    }

    #[test]
    fn test_default_general() {
        let classifier = IntentClassifier::new();
        assert_eq!(
            classifier.classify(&message("Lorem", "ipsum dolor sit amet")),
            Intent::General
        );
    }

    #[test]
    fn test_rule_order_sales_wins_over_support() {
        let classifier = IntentClassifier::new();
        // Contains both "pricing" (sales) and "help" (support).
        assert_eq!(
            classifier.classify(&message("", "Can you help me with pricing?")),
            Intent::Sales
        );
    }

    #[test]
    fn test_case_insensitive() {
        let classifier = IntentClassifier::new();
        assert_eq!(
            classifier.classify(&message("DEMO REQUEST", "")),
            Intent::Sales
        );
    }

    #[test]
    fn test_hint_short_circuits_rules() {
        let classifier = IntentClassifier::new();
        let mut msg = message("Pricing", "demo demo demo");
        msg.classification_hint = Some(Intent::Support);
        assert_eq!(classifier.classify(&msg), Intent::Support);
    }
}
