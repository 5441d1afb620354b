//! Security-specific error types.

use super::permission::Verb;
use thiserror::Error;

/// Security-related errors.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// No permission record for the entity, or its flag for the verb is false.
    #[error("permission denied: {verb} on {entity}")]
    PermissionDenied {
        /// Storage name of the entity.
        entity: String,
        /// Requested verb.
        verb: Verb,
    },

    /// Permission target is not a registered entity.
    #[error("permission target `{0}` is not a registered entity")]
    UnknownEntity(String),

    /// Authentication failed.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid verb string.
    #[error("invalid verb: {0}")]
    InvalidVerb(String),

    /// Malformed permission document.
    #[error("invalid permission set: {0}")]
    InvalidPermissionSet(String),

    /// Storage error during permission or principal operations.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

/// Result type for security operations.
pub type SecurityResult<T> = Result<T, SecurityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SecurityError::PermissionDenied {
            entity: "demo_model".to_string(),
            verb: Verb::Read,
        };
        assert_eq!(err.to_string(), "permission denied: read on demo_model");

        let err = SecurityError::UnknownEntity("ghost".to_string());
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_security_result() {
        let ok: SecurityResult<i32> = Ok(42);
        assert_eq!(ok.unwrap(), 42);

        let err: SecurityResult<i32> =
            Err(SecurityError::AuthenticationFailed("bad password".into()));
        assert!(err.is_err());
    }
}
