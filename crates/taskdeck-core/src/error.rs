use std::fmt;

use taskdeck_shared::{ErrorBody, FieldError};

pub const NETWORK_ERROR: &str = "Network error. Please check your connection.";
pub const UNAUTHORIZED: &str = "Your session has expired. Please login again.";
pub const FORBIDDEN: &str = "Access denied";
pub const NOT_FOUND: &str = "Task not found";
pub const RATE_LIMITED: &str = "Too many requests. Please try again later.";
pub const SERVER_ERROR: &str = "Server error. Please try again later.";
pub const VALIDATION_FAILED: &str = "Validation failed";
pub const GENERIC_ERROR: &str = "An error occurred";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Network,
    Unauthorized,
    Forbidden,
    NotFound,
    RateLimit,
    Server,
    Validation,
    Generic,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Network => "network_error",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::Server => "server_error",
            ErrorKind::Validation => "validation_error",
            ErrorKind::Generic => "error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport failures normalized into the client's error taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("{message}")]
    Network { message: String },

    #[error("{message}")]
    Unauthorized { message: String },

    #[error("{message}")]
    Forbidden { message: String },

    #[error("{message}")]
    NotFound { message: String },

    #[error("{message}")]
    RateLimit { message: String },

    #[error("{message}")]
    Server { status: u16, message: String },

    #[error("{message}")]
    Validation {
        message: String,
        errors: Vec<FieldError>,
    },

    #[error("{message}")]
    Generic {
        status: Option<u16>,
        message: String,
    },
}

impl ApiError {
    pub fn network(detail: impl fmt::Display) -> Self {
        tracing::debug!(detail = %detail, "network failure");
        ApiError::Network {
            message: NETWORK_ERROR.to_string(),
        }
    }

    pub fn generic(message: impl Into<String>) -> Self {
        ApiError::Generic {
            status: None,
            message: message.into(),
        }
    }

    /// Maps a non-2xx status and its (possibly empty) body onto the taxonomy.
    pub fn from_status(status: u16, body: ErrorBody) -> Self {
        let ErrorBody { message, errors } = body;
        match status {
            401 => ApiError::Unauthorized {
                message: UNAUTHORIZED.to_string(),
            },
            403 => ApiError::Forbidden {
                message: message.unwrap_or_else(|| FORBIDDEN.to_string()),
            },
            404 => ApiError::NotFound {
                message: message.unwrap_or_else(|| NOT_FOUND.to_string()),
            },
            429 => ApiError::RateLimit {
                message: RATE_LIMITED.to_string(),
            },
            s if s >= 500 => ApiError::Server {
                status: s,
                message: SERVER_ERROR.to_string(),
            },
            400 if errors.is_some() => ApiError::Validation {
                message: message.unwrap_or_else(|| VALIDATION_FAILED.to_string()),
                errors: errors.unwrap_or_default(),
            },
            s => ApiError::Generic {
                status: Some(s),
                message: message.unwrap_or_else(|| GENERIC_ERROR.to_string()),
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Network { .. } => ErrorKind::Network,
            ApiError::Unauthorized { .. } => ErrorKind::Unauthorized,
            ApiError::Forbidden { .. } => ErrorKind::Forbidden,
            ApiError::NotFound { .. } => ErrorKind::NotFound,
            ApiError::RateLimit { .. } => ErrorKind::RateLimit,
            ApiError::Server { .. } => ErrorKind::Server,
            ApiError::Validation { .. } => ErrorKind::Validation,
            ApiError::Generic { .. } => ErrorKind::Generic,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Network { .. } => None,
            ApiError::Unauthorized { .. } => Some(401),
            ApiError::Forbidden { .. } => Some(403),
            ApiError::NotFound { .. } => Some(404),
            ApiError::RateLimit { .. } => Some(429),
            ApiError::Server { status, .. } => Some(*status),
            ApiError::Validation { .. } => Some(400),
            ApiError::Generic { status, .. } => *status,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::Network { message }
            | ApiError::Unauthorized { message }
            | ApiError::Forbidden { message }
            | ApiError::NotFound { message }
            | ApiError::RateLimit { message }
            | ApiError::Server { message, .. }
            | ApiError::Validation { message, .. }
            | ApiError::Generic { message, .. } => message,
        }
    }

    /// Per-field details; empty unless this is a validation failure.
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            ApiError::Validation { errors, .. } => errors,
            _ => &[],
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(message: Option<&str>, errors: Option<Vec<FieldError>>) -> ErrorBody {
        ErrorBody {
            message: message.map(str::to_string),
            errors,
        }
    }

    #[test]
    fn status_codes_map_to_kinds() {
        let cases = [
            (401, ErrorKind::Unauthorized),
            (403, ErrorKind::Forbidden),
            (404, ErrorKind::NotFound),
            (429, ErrorKind::RateLimit),
            (500, ErrorKind::Server),
            (503, ErrorKind::Server),
            (400, ErrorKind::Generic),
            (409, ErrorKind::Generic),
        ];
        for (status, kind) in cases {
            assert_eq!(
                ApiError::from_status(status, ErrorBody::default()).kind(),
                kind,
                "status {status}"
            );
        }
    }

    #[test]
    fn bad_request_with_errors_is_validation() {
        let err = ApiError::from_status(
            400,
            body(None, Some(vec![FieldError::new("title", "too short")])),
        );
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.message(), VALIDATION_FAILED);
        assert_eq!(err.field_errors().len(), 1);
    }

    #[test]
    fn server_message_is_preferred_where_allowed() {
        let forbidden = ApiError::from_status(403, body(Some("Not your task"), None));
        assert_eq!(forbidden.message(), "Not your task");

        let server = ApiError::from_status(500, body(Some("stack trace"), None));
        assert_eq!(server.message(), SERVER_ERROR);

        let missing = ApiError::from_status(404, ErrorBody::default());
        assert_eq!(missing.to_string(), NOT_FOUND);
    }
}
