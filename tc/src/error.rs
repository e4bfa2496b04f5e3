//! Thing client error types

use thiserror::Error;

/// Errors that can occur while talking to a Thing
#[derive(Debug, Error)]
pub enum ThingError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Device {thing} returned {status}: {message}")]
    Status { thing: String, status: u16, message: String },

    #[error("Device {thing} has no {kind} named '{name}'")]
    MissingAffordance {
        thing: String,
        kind: &'static str,
        name: String,
    },

    #[error("Invalid href '{href}': {reason}")]
    InvalidHref { href: String, reason: String },

    #[error("Device {thing} rejected '{name}': {message}")]
    Rejected {
        thing: String,
        name: String,
        message: String,
    },

    #[error("Device {thing} returned an invalid '{name}': {message}")]
    InvalidValue {
        thing: String,
        name: String,
        message: String,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ThingError {
    /// Check if this error is worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            ThingError::Network(_) => true,
            ThingError::Status { status, .. } => matches!(*status, 408 | 429) || *status >= 500,
            ThingError::MissingAffordance { .. } => false,
            ThingError::InvalidHref { .. } => false,
            ThingError::Rejected { .. } => false,
            ThingError::InvalidValue { .. } => false,
            ThingError::Json(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable() {
        // 5xx and throttling are transient
        for status in [408, 429, 500, 502, 503] {
            assert!(
                ThingError::Status {
                    thing: "belt".to_string(),
                    status,
                    message: String::new(),
                }
                .is_retryable(),
                "status {} should be retryable",
                status
            );
        }

        // 4xx errors are not
        assert!(
            !ThingError::Status {
                thing: "belt".to_string(),
                status: 404,
                message: "Not found".to_string(),
            }
            .is_retryable()
        );

        assert!(
            !ThingError::MissingAffordance {
                thing: "belt".to_string(),
                kind: "action",
                name: "fly".to_string(),
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_display_names_device() {
        let err = ThingError::Rejected {
            thing: "VirtualUR3".to_string(),
            name: "goToPosition".to_string(),
            message: "unreachable".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("VirtualUR3"));
        assert!(text.contains("goToPosition"));
    }
}
