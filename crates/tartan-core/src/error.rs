//! Unified error types for the tartan core.
//!
//! Every outbound capability (chat driver, emoji reactor, file uploader,
//! real-time sender) reports failures as [`ApiError`]. Directory lookups use
//! [`UserInfoError`] so callers can tell a missing user from a broken link.
//! Plugin storage reports [`StorageError`].

use thiserror::Error;

// =============================================================================
// API Errors
// =============================================================================

/// Errors reported by the remote messaging service or its transport.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The client is not connected to the remote service.
    #[error("not connected to the remote service")]
    NotConnected,

    /// The call did not complete in time.
    #[error("remote call timed out")]
    Timeout,

    /// The remote service rejected the call.
    #[error("remote error: {code}")]
    Remote {
        /// Error code returned by the service (e.g. `message_not_found`).
        code: String,
    },

    /// The service is throttling the client.
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds the service asked the client to wait.
        retry_after_secs: u64,
    },

    /// Failed to encode or decode a payload.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Transport-level failure (socket closed, DNS, TLS...).
    #[error("transport error: {0}")]
    Transport(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl ApiError {
    /// Creates a [`ApiError::Remote`] from an error code.
    pub fn remote(code: impl Into<String>) -> Self {
        Self::Remote { code: code.into() }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

// =============================================================================
// User Info Errors
// =============================================================================

/// Errors returned by a [`UserInfoFinder`](crate::UserInfoFinder).
///
/// Both variants are returned to the caller verbatim and are never cached.
#[derive(Debug, Clone, Error)]
pub enum UserInfoError {
    /// The directory has no user with this id.
    #[error("user '{user_id}' not found")]
    NotFound {
        /// The id that was looked up.
        user_id: String,
    },

    /// The lookup could not be performed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl UserInfoError {
    /// Creates a not-found error for `user_id`.
    pub fn not_found(user_id: impl Into<String>) -> Self {
        Self::NotFound {
            user_id: user_id.into(),
        }
    }
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Errors returned by a key/value store.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// The backing store could not be reached.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A stored value could not be decoded.
    #[error("corrupt value for key '{key}': {message}")]
    Corrupt {
        /// Key holding the bad value.
        key: String,
        /// Decoder message.
        message: String,
    },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for remote API calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type for user directory lookups.
pub type UserInfoResult<T> = Result<T, UserInfoError>;

/// Result type for key/value storage.
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_info_error_wraps_api_error() {
        let err: UserInfoError = ApiError::Timeout.into();
        assert!(matches!(err, UserInfoError::Api(ApiError::Timeout)));
        assert_eq!(err.to_string(), "remote call timed out");
    }

    #[test]
    fn test_not_found_names_the_user() {
        let err = UserInfoError::not_found("U123");
        assert_eq!(err.to_string(), "user 'U123' not found");
    }
}
