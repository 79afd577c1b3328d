use thiserror::Error;

/// Errors that can occur while loading HAR captures or running discovery.
#[derive(Error, Debug)]
pub enum HarmapError {
    /// IO error (file not found, permission denied, etc.).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error from invalid HAR, cookie, or oracle-response content.
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed config file.
    #[error("config error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Config serialization error (rendering the resolved config back to TOML).
    #[error("config rendering error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// Validation error for HAR/cookie data missing required fields.
    #[error("invalid HAR file: {0}")]
    InvalidHar(String),

    /// URL parsing error for malformed URLs.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// The oracle transport failed, returned malformed arguments, or chose an
    /// answer outside the options it was given.
    #[error("oracle error: {0}")]
    Oracle(String),

    /// A cycle was detected in the dependency graph.
    #[error("cycle detected in dependency graph: {0}")]
    CycleDetected(String),

    /// Invalid command-line arguments or options.
    #[error("{0}")]
    InvalidArgs(String),
}

/// Convenience result type for harmap operations.
pub type Result<T> = std::result::Result<T, HarmapError>;
