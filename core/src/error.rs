use thiserror::Error;

/// Error type for parsing dive log configuration text.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("syntax error on line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("invalid value for {key} on line {line}: '{value}'")]
    InvalidValue {
        line: usize,
        key: String,
        value: String,
    },
}

/// Error type for the cancellable decompression preload.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreloadError {
    #[error("decompression preload cancelled")]
    Cancelled,
}

/// Error type surfaced through the foreign-language session object.
///
/// Contract violations that are fatal inside the library are checked up
/// front by the session and reported as `InvalidOperation` instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("unknown dive: {0}")]
    UnknownDive(u64),

    #[error("unknown trip: {0}")]
    UnknownTrip(u64),

    #[error("invalid trip operation: {0}")]
    InvalidOperation(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<ConfigError> for SessionError {
    fn from(err: ConfigError) -> Self {
        SessionError::InvalidConfig(err.to_string())
    }
}
