use thiserror::Error;

/// Errors from cache tier operations.
///
/// Durable-tier failures are non-fatal: the cache degrades to
/// volatile-only operation for the affected call.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("durable cache tier unavailable: {0}")]
    DurableUnavailable(String),
}

/// Errors from configuration loading and bootstrap.
///
/// These are the only fatal errors in the system: they abort
/// initialization and never occur after startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no providers configured")]
    NoProvidersConfigured,

    #[error("missing API key for provider '{provider}' (env '{env}')")]
    MissingApiKey { provider: String, env: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to read configuration: {0}")]
    Io(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_error_display() {
        let err = CacheError::DurableUnavailable("disk full".to_string());
        assert_eq!(
            err.to_string(),
            "durable cache tier unavailable: disk full"
        );
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingApiKey {
            provider: "openai".to_string(),
            env: "OPENAI_API_KEY".to_string(),
        };
        assert!(err.to_string().contains("openai"));
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }
}
