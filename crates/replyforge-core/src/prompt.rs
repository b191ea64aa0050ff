//! Reply prompt construction.
//!
//! Renders the dispatch prompt for an inbound message: new leads get the
//! warm-welcome register, existing customers get a professional
//! acknowledgment. Providers are asked for a JSON reply so the pipeline
//! can pick up a structured subject/body, with the raw text as fallback.

use replyforge_types::llm::RenderedPrompt;
use replyforge_types::message::{Classification, InboundMessage};

/// System prompt for reply generation.
pub const REPLY_SYSTEM_PROMPT: &str = "You are a professional email assistant. Generate helpful, contextually appropriate replies. Respond with a JSON object: {\"subject\": \"...\", \"body\": \"...\"}.";

/// Subject line used for first-contact replies.
pub const NEW_LEAD_SUBJECT: &str = "Welcome! We're Excited to Work With You";

/// The default reply subject when the provider does not supply one.
pub fn reply_subject(original_subject: &str, classification: &Classification) -> String {
    if classification.customer_type.is_new_lead() {
        NEW_LEAD_SUBJECT.to_string()
    } else {
        format!("Re: {original_subject}")
    }
}

/// Render the reply prompt for the classified message.
pub fn build_reply_prompt(
    message: &InboundMessage,
    classification: &Classification,
) -> RenderedPrompt {
    let user = if classification.customer_type.is_new_lead() {
        format!(
            "Write a warm, personalized first reply to a NEW prospective customer.\n\
             \n\
             From: {sender}\n\
             Subject: {subject}\n\
             Intent: {intent}\n\
             Message:\n{body}\n\
             \n\
             Make them feel valued, show enthusiasm for their interest, and\n\
             offer a personal introduction to our services.",
            sender = message.sender,
            subject = message.subject,
            intent = classification.intent,
            body = message.body,
        )
    } else {
        format!(
            "Write a professional reply to an EXISTING customer.\n\
             \n\
             From: {sender}\n\
             Subject: {subject}\n\
             Intent: {intent}\n\
             Message:\n{body}\n\
             \n\
             Acknowledge their request, be helpful and informative, and\n\
             include appropriate next steps for a {intent} inquiry.",
            sender = message.sender,
            subject = message.subject,
            intent = classification.intent,
            body = message.body,
        )
    };

    RenderedPrompt {
        system: Some(REPLY_SYSTEM_PROMPT.to_string()),
        user,
    }
}
