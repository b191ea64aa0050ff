//! Request fingerprinting.
//!
//! A fingerprint is the SHA-256 of a canonical rendering of the request:
//! whitespace-normalized prompt text, the provider-agnostic constraints,
//! and the model class. Identical normalized inputs always produce
//! byte-identical fingerprints, which makes them usable both as cache keys
//! and as single-flight deduplication keys.

use sha2::{Digest, Sha256};

use replyforge_types::dispatch::RequestFingerprint;
use replyforge_types::llm::{GenerationConstraints, ProviderClass, RenderedPrompt};

/// Collapse whitespace runs and trim, so trivially reformatted prompts
/// (wrapped lines, trailing newlines) share a fingerprint. Case is
/// preserved: changing case changes meaning.
fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Compute the fingerprint for a prompt under the given constraints.
pub fn fingerprint(
    prompt: &RenderedPrompt,
    constraints: &GenerationConstraints,
    model_class: Option<ProviderClass>,
) -> RequestFingerprint {
    let canonical = format!(
        "system={}\nuser={}\nmax_tokens={}\ntemperature={:.4}\nmodel_class={}",
        normalize(prompt.system.as_deref().unwrap_or("")),
        normalize(&prompt.user),
        constraints.max_tokens,
        constraints.temperature,
        model_class.map_or_else(|| "any".to_string(), |c| c.to_string()),
    );

    let digest = Sha256::digest(canonical.as_bytes());
    RequestFingerprint::new(format!("{digest:x}"))
}
