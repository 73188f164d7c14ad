use std::error::Error;
use std::fmt;

use warp::http::StatusCode;

use crate::storage::EntityId;

/// Reasons a token is refused by the codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    InvalidSignature,
    Expired,
    MalformedToken,
}

impl TokenError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidSignature => "invalid_signature",
            Self::Expired => "expired",
            Self::MalformedToken => "malformed_token",
        }
    }
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSignature => write!(f, "token signature is invalid"),
            Self::Expired => write!(f, "token has expired"),
            Self::MalformedToken => write!(f, "token is malformed"),
        }
    }
}

impl Error for TokenError {}

#[derive(Debug)]
pub enum VetClinicError {
    // Auth errors
    Unauthenticated(String),
    Forbidden(String),
    Token(TokenError),
    SigningError(String),
    HashingError(String),

    // Referential integrity
    ForeignKeyViolation {
        entity: &'static str,
        parent: &'static str,
        parent_id: EntityId,
    },

    // Record errors
    NotFound(String),
    Conflict(String),
    ValidationError(String),

    // Storage errors
    StorageError(String),

    // Configuration errors
    ConfigError(String),
}

impl VetClinicError {
    /// HTTP status the error surfaces as
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated(_) | Self::Token(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::ForeignKeyViolation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::SigningError(_)
            | Self::HashingError(_)
            | Self::StorageError(_)
            | Self::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable reason, distinct for every rejection path
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Unauthenticated(_) | Self::Token(_) => "unauthenticated",
            Self::Forbidden(_) => "forbidden",
            Self::SigningError(_) => "signing_error",
            Self::HashingError(_) => "hashing_error",
            Self::ForeignKeyViolation { .. } => "foreign_key_violation",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::ValidationError(_) => "validation_error",
            Self::StorageError(_) => "storage_error",
            Self::ConfigError(_) => "config_error",
        }
    }
}

impl fmt::Display for VetClinicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated(msg) => write!(f, "Unauthenticated: {}", msg),
            Self::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            Self::Token(err) => write!(f, "Unauthenticated: {}", err),
            Self::SigningError(msg) => write!(f, "Failed to sign token: {}", msg),
            Self::HashingError(msg) => write!(f, "Failed to hash password: {}", msg),
            Self::ForeignKeyViolation {
                entity,
                parent,
                parent_id,
            } => write!(
                f,
                "Cannot write {}: referenced {} {} does not exist",
                entity, parent, parent_id
            ),
            Self::NotFound(msg) => write!(f, "Not found: {}", msg),
            Self::Conflict(msg) => write!(f, "Conflict: {}", msg),
            Self::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            Self::StorageError(msg) => write!(f, "Storage error: {}", msg),
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl Error for VetClinicError {}

impl From<TokenError> for VetClinicError {
    fn from(err: TokenError) -> Self {
        VetClinicError::Token(err)
    }
}

impl warp::reject::Reject for VetClinicError {}

// Generic result type for the clinic backend
pub type Result<T> = std::result::Result<T, VetClinicError>;
