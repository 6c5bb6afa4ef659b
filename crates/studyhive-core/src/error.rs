use thiserror::Error;

/// Failure of a generation call.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("provider error: {0:#}")]
    Provider(#[from] anyhow::Error),
    #[error("provider returned empty text for {operation}")]
    EmptyResponse { operation: &'static str },
}

/// Model output that did not match the roadmap schema. Never leaves the
/// roadmap parser.
#[derive(Debug, Error)]
pub enum RoadmapParseError {
    #[error("no JSON array found in model output")]
    NoArray,
    #[error("top-level JSON value is not an array")]
    NotAnArray,
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Submission rejected by the orchestrator's entry guard.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("input is empty")]
    EmptyInput,
    #[error("a previous message is still being answered")]
    InFlight,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing credential for provider {provider}: set api_key or GEMINI_API_KEY")]
    MissingCredential { provider: &'static str },
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}
