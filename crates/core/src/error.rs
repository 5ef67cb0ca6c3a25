//! Error types for DP statistic validation and release.

use std::fmt;

/// Errors that can occur while building or running a DP statistic.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DpError {
    /// Privacy budget has been exhausted.
    #[error("privacy budget exhausted (eps={eps:.4}, delta={delta:.2e})")]
    PrivacyBudgetExhausted {
        /// Epsilon that would have been committed.
        eps: f64,
        /// Delta that would have been committed.
        delta: f64,
    },

    /// Invalid parameter provided.
    #[error("invalid parameter: {msg}")]
    InvalidParameters {
        /// Human-readable error description.
        msg: String,
    },

    /// Numerical computation error.
    #[error("numerical error: {msg}")]
    NumericalError {
        /// Human-readable error description.
        msg: String,
    },

    /// The noise-scale search could not bracket a scale meeting the target.
    #[error("failed to find a noise scale in [{lower:e}, {upper:e}]")]
    ScaleSearchFailed {
        /// Lowest scale tried.
        lower: f64,
        /// Highest scale tried.
        upper: f64,
    },

    /// The raw data could not be read or coerced.
    #[error("data error: {msg}")]
    Data {
        /// Human-readable error description.
        msg: String,
    },

    /// Configuration error.
    #[error("configuration error: {msg}")]
    ConfigError {
        /// Human-readable error description.
        msg: String,
    },

    /// Unsupported statistic or variable combination.
    #[error("unsupported feature: {msg}")]
    UnsupportedFeature {
        /// Human-readable error description.
        msg: String,
    },
}

/// Result type for DP operations.
pub type Result<T> = std::result::Result<T, DpError>;

impl DpError {
    /// Create an invalid parameter error.
    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        Self::InvalidParameters { msg: msg.into() }
    }

    /// Create a numerical error.
    pub fn numerical<S: Into<String>>(msg: S) -> Self {
        Self::NumericalError { msg: msg.into() }
    }

    /// Create a data error.
    pub fn data<S: Into<String>>(msg: S) -> Self {
        Self::Data { msg: msg.into() }
    }

    /// Create a configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigError { msg: msg.into() }
    }

    /// Create an unsupported feature error.
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        Self::UnsupportedFeature { msg: msg.into() }
    }
}

/// A single failed check, carrying the message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    /// Create a validation error from a message.
    pub fn new<S: Into<String>>(msg: S) -> Self {
        Self(msg.into())
    }

    /// The user-facing message.
    pub fn message(&self) -> &str {
        &self.0
    }
}

/// Result type for validator primitives.
pub type ValidationResult = std::result::Result<(), ValidationError>;

/// Ordered, non-empty list of user-facing error messages.
///
/// Messages are only ever appended; the first one is the primary diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    messages: Vec<String>,
}

impl ValidationErrors {
    /// Create a list holding a single message.
    pub fn single<S: Into<String>>(msg: S) -> Self {
        Self {
            messages: vec![msg.into()],
        }
    }

    /// Build from collected messages; `None` when nothing failed.
    pub fn from_messages(messages: Vec<String>) -> Option<Self> {
        if messages.is_empty() {
            None
        } else {
            Some(Self { messages })
        }
    }

    /// Append a message.
    pub fn push<S: Into<String>>(&mut self, msg: S) {
        self.messages.push(msg.into());
    }

    /// All messages in the order they were recorded.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// The first recorded message.
    pub fn first(&self) -> &str {
        // never empty by construction
        self.messages.first().map(String::as_str).unwrap_or_default()
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.messages.join(" "))
    }
}

impl std::error::Error for ValidationErrors {}

impl From<ValidationError> for ValidationErrors {
    fn from(err: ValidationError) -> Self {
        Self::single(err.0)
    }
}

impl From<DpError> for ValidationErrors {
    fn from(err: DpError) -> Self {
        Self::single(err.to_string())
    }
}

/// Failure kinds when turning a confidence level into alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfidenceLevelError {
    /// No confidence level was supplied.
    #[error("The confidence level is not set.")]
    NotSet,
    /// The confidence level is not a number.
    #[error("The confidence level is not a number.")]
    NotNumeric,
    /// The confidence level is above 1.
    #[error("The confidence level must be less than or equal to 1.")]
    GreaterThanOne,
    /// The confidence level is zero or negative.
    #[error("The confidence level must be greater than 0.")]
    LessThanZero,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_keep_order() {
        let mut errs = ValidationErrors::single("first");
        errs.push("second");
        assert_eq!(errs.first(), "first");
        assert_eq!(errs.len(), 2);
        assert_eq!(errs.to_string(), "first second");
    }

    #[test]
    fn empty_message_list_is_not_an_error() {
        assert!(ValidationErrors::from_messages(Vec::new()).is_none());
    }

    #[test]
    fn scale_search_error_names_bounds() {
        let err = DpError::ScaleSearchFailed {
            lower: 1e-10,
            upper: 1e12,
        };
        let msg = err.to_string();
        assert!(msg.contains("1e-10"));
        assert!(msg.contains("1e12"));
    }
}
