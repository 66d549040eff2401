use thiserror::Error;

/// Errors raised while reading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable required by the application is not set.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// An environment variable is set but its value cannot be parsed.
    #[error("Invalid value for environment variable {name}: {value:?} ({reason})")]
    InvalidEnvVar {
        /// Variable name.
        name: String,
        /// Raw value found in the environment.
        value: String,
        /// Parser message.
        reason: String,
    },
}
