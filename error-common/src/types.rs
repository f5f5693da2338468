use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad classification of an error or denial.
///
/// Request handlers use the category to decide between a client-facing
/// outcome (a denial or a missing record) and a server-side fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Ordinary authorization denial
    Denial,
    /// Requested record does not exist
    NotFound,
    /// Stored data violates a structural invariant
    Integrity,
    /// Action registry misuse at startup
    Registry,
    /// Invalid configuration or policy table
    Configuration,
}

impl ErrorCategory {
    /// Whether the enclosing request should abort with a server-side fault.
    pub fn is_server_fault(self) -> bool {
        matches!(
            self,
            ErrorCategory::Integrity | ErrorCategory::Registry | ErrorCategory::Configuration
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Denial => "denial",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::Integrity => "integrity",
            ErrorCategory::Registry => "registry",
            ErrorCategory::Configuration => "configuration",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors and outcomes that carry a stable code from [`crate::codes`].
pub trait CodedError {
    fn code(&self) -> &'static str;

    fn category(&self) -> ErrorCategory;

    fn is_server_fault(&self) -> bool {
        self.category().is_server_fault()
    }
}

/// Log a coded error at a level matching its category.
pub fn log_coded<E>(context: &str, error: &E)
where
    E: CodedError + fmt::Display,
{
    if error.is_server_fault() {
        tracing::warn!(
            context = context,
            error_code = error.code(),
            category = %error.category(),
            "{}",
            error
        );
    } else {
        tracing::debug!(
            context = context,
            error_code = error.code(),
            category = %error.category(),
            "{}",
            error
        );
    }
}
