//! Error types for the cel-engine crate.

/// Errors raised while parsing or validating CEL configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// An event name in the `events` list is not recognized
    #[error("Unknown event name '{0}'")]
    UnknownEvent(String),

    /// Applications are listed for tracking but neither APP_START nor
    /// APP_END is in the tracked event set
    #[error("Applications are listed to be tracked, but APP events are not tracked")]
    AppsWithoutAppEvents,

    /// A section other than `[general]` (or the reserved sibling sections)
    /// appeared in the configuration text
    #[error("Unknown section '[{0}]'")]
    UnknownSection(String),

    /// An option not understood by the `[general]` section
    #[error("Unknown option '{0}' in section [general]")]
    UnknownOption(String),

    /// A line that is neither a section header, an option, nor a comment
    #[error("Malformed configuration at line {line}: {message}")]
    Malformed {
        /// 1-indexed line number in the source text
        line: usize,
        /// Description of what went wrong
        message: String,
    },
}

/// Errors from backend registry operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Backends must be registered under a non-empty name
    #[error("Backend name must not be empty")]
    EmptyName,

    /// The named backend is not registered
    #[error("No backend registered under '{0}'")]
    NotFound(String),
}

/// Errors from engine lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration was rejected; the previous configuration is retained
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A backend registry operation failed
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// An error occurred during shutdown
    #[error("Shutdown error: {0}")]
    Shutdown(String),
}

/// Convenience type alias for Results using EngineError.
pub type Result<T> = std::result::Result<T, EngineError>;
