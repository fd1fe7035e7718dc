use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while loading enhancement configurations.
///
/// Every variant is deterministic for a given input, so none of them are
/// worth retrying.
#[derive(Debug, Error)]
pub enum EnhancerError {
    #[error("invalid syntax near \"{text}\" (line {line}): {message}")]
    Parse { line: usize, text: String, message: String },

    #[error("invalid matcher {key}:{pattern} (line {line}): {reason}")]
    Matcher {
        line: usize,
        key: String,
        pattern: String,
        reason: String,
    },

    #[error("unknown enhancements version {version}")]
    Version { version: i64 },

    #[error("invalid stack trace rule config: {message}")]
    Decode {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("configuration error: {message}")]
    Configuration { message: String },
}

pub type Result<T> = std::result::Result<T, EnhancerError>;

impl EnhancerError {
    pub fn parse<S: Into<String>, M: Into<String>>(line: usize, text: S, message: M) -> Self {
        Self::Parse { line, text: text.into(), message: message.into() }
    }

    pub fn matcher<K, P, R>(line: usize, key: K, pattern: P, reason: R) -> Self
    where
        K: Into<String>,
        P: Into<String>,
        R: Into<String>,
    {
        Self::Matcher {
            line,
            key: key.into(),
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }

    pub fn version(version: i64) -> Self {
        Self::Version { version }
    }

    pub fn decode<S: Into<String>>(message: S) -> Self {
        Self::Decode { message: message.into(), source: None }
    }

    pub fn decode_with<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: Into<BoxError>,
    {
        Self::Decode { message: message.into(), source: Some(source.into()) }
    }

    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Re-attach a line number to a matcher error raised before the line was known.
    pub(crate) fn at_line(self, line: usize) -> Self {
        match self {
            Self::Matcher { key, pattern, reason, .. } => Self::Matcher { line, key, pattern, reason },
            Self::Parse { text, message, .. } => Self::Parse { line, text, message },
            other => other,
        }
    }

    /// Returns true if the error came from the rule set itself rather than the engine settings
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::Parse { .. } | Self::Matcher { .. } | Self::Version { .. } | Self::Decode { .. }
        )
    }

    /// Line of the offending rule, for errors raised by the DSL parser
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Parse { line, .. } | Self::Matcher { line, .. } if *line > 0 => Some(*line),
            _ => None,
        }
    }
}
