//! # Ledger Error Types
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the Settlement Engine                  │
//! │                                                                         │
//! │  CoreError (terms, transitions, validation) ──┐                         │
//! │                                               ├──► LedgerError ──► caller
//! │  DbError (sqlx, constraints, contention) ─────┘        │               │
//! │                                                         ▼               │
//! │                                                  code() → ErrorCode     │
//! │                                                  "INSUFFICIENT_STOCK"   │
//! │                                                                         │
//! │  Every LedgerError raised inside a unit of work rolls it back.         │
//! │  Audit and broadcast failures never become a LedgerError.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use thiserror::Error;

use bozor_core::{CoreError, Money, ValidationError};
use bozor_db::DbError;

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Everything a ledger or coordinator call can fail with.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A referenced product, debtor, market or sale does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A decrement asked for more than is on hand.
    #[error("Insufficient stock for {product_name}: {available} available, {requested} requested")]
    InsufficientStock {
        product_id: String,
        product_name: String,
        available: i64,
        requested: i64,
    },

    /// A payoff is larger than the debtor's balance.
    #[error("Payment of {requested} exceeds debt of {current_debt} for debtor {debtor_id}")]
    AmountExceedsDebt {
        debtor_id: String,
        current_debt: Money,
        requested: Money,
    },

    /// The request is malformed or its payment terms are inconsistent.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The sale's state does not allow the change.
    #[error("Invalid transition for sale {sale_id}: {reason}")]
    InvalidTransition { sale_id: String, reason: String },

    /// Stored state contradicts itself. Indicates a bug, not bad input.
    #[error("Internal invariant violated: {0}")]
    InternalInvariantViolation(String),

    /// Storage failed. `retryable` is set for lock contention and
    /// connection trouble, where repeating the call unchanged may succeed.
    #[error("Storage error: {message}")]
    Storage { message: String, retryable: bool },

    /// The engine was started with an unusable configuration. An operator
    /// problem, never a caller's.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Machine-readable error kind for callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    InsufficientStock,
    AmountExceedsDebt,
    BadRequest,
    InvalidTransition,
    InternalInvariantViolation,
    StorageUnavailable,
    StorageError,
    ConfigError,
}

impl LedgerError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        LedgerError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        LedgerError::BadRequest(message.into())
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        LedgerError::InternalInvariantViolation(message.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            LedgerError::NotFound { .. } => ErrorCode::NotFound,
            LedgerError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
            LedgerError::AmountExceedsDebt { .. } => ErrorCode::AmountExceedsDebt,
            LedgerError::BadRequest(_) => ErrorCode::BadRequest,
            LedgerError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            LedgerError::InternalInvariantViolation(_) => ErrorCode::InternalInvariantViolation,
            LedgerError::Storage { retryable: true, .. } => ErrorCode::StorageUnavailable,
            LedgerError::Storage { retryable: false, .. } => ErrorCode::StorageError,
            LedgerError::Config(_) => ErrorCode::ConfigError,
        }
    }

    /// Returns true if the caller may repeat the same call.
    ///
    /// Nothing has been committed when this is true: the failed unit of
    /// work was rolled back in full.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Storage { retryable: true, .. })
    }
}

impl From<DbError> for LedgerError {
    fn from(err: DbError) -> Self {
        let retryable = err.is_transient();
        match err {
            DbError::NotFound { entity, id } => LedgerError::NotFound { entity, id },
            DbError::UniqueViolation { field, .. } => {
                LedgerError::BadRequest(format!("{} already exists", field))
            }
            DbError::ForeignKeyViolation { message } => {
                tracing::warn!(%message, "Foreign key violation");
                LedgerError::BadRequest("Invalid reference".to_string())
            }
            DbError::CheckViolation { message } => LedgerError::InternalInvariantViolation(message),
            other => LedgerError::Storage {
                message: other.to_string(),
                retryable,
            },
        }
    }
}

impl From<CoreError> for LedgerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidPaymentTerms { reason } => LedgerError::BadRequest(reason),
            CoreError::Validation(e) => LedgerError::BadRequest(e.to_string()),
            CoreError::InvalidTransition { sale_id, reason } => {
                LedgerError::InvalidTransition { sale_id, reason }
            }
            // Callers check balances before allocating; reaching this means the
            // items no longer cover the balance.
            e @ CoreError::AmountExceedsDebt { .. } => {
                LedgerError::InternalInvariantViolation(e.to_string())
            }
        }
    }
}

impl From<ValidationError> for LedgerError {
    fn from(err: ValidationError) -> Self {
        LedgerError::BadRequest(err.to_string())
    }
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Failures while loading or applying configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to initialise logging: {0}")]
    Logging(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_database_is_retryable() {
        let err = LedgerError::from(DbError::Busy("database is locked".into()));
        assert!(err.is_retryable());
        assert_eq!(err.code(), ErrorCode::StorageUnavailable);

        let err = LedgerError::from(DbError::QueryFailed("syntax error".into()));
        assert!(!err.is_retryable());
        assert_eq!(err.code(), ErrorCode::StorageError);
    }

    #[test]
    fn test_core_errors_map_to_kinds() {
        let err = LedgerError::from(CoreError::terms("debtorId is required"));
        assert_eq!(err.code(), ErrorCode::BadRequest);

        let err = LedgerError::from(CoreError::transition("s1", "already returned"));
        assert_eq!(err.code(), ErrorCode::InvalidTransition);

        let err = LedgerError::from(CoreError::Validation(ValidationError::MustBePositive {
            field: "quantity".into(),
        }));
        assert_eq!(err.code(), ErrorCode::BadRequest);
    }

    #[test]
    fn test_db_not_found_passes_through() {
        let err = LedgerError::from(DbError::not_found("Sale", "s9"));
        assert!(matches!(err, LedgerError::NotFound { ref id, .. } if id == "s9"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_code_wire_format() {
        let json = serde_json::to_string(&ErrorCode::InsufficientStock).unwrap();
        assert_eq!(json, "\"INSUFFICIENT_STOCK\"");
        let json = serde_json::to_string(&ErrorCode::ConfigError).unwrap();
        assert_eq!(json, "\"CONFIG_ERROR\"");
    }

    #[test]
    fn test_config_errors_keep_their_own_kind() {
        let err = LedgerError::from(ConfigError::Invalid(
            "database.max_connections must be greater than 0".into(),
        ));
        assert_eq!(err.code(), ErrorCode::ConfigError);
        assert!(!err.is_retryable());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: database.max_connections must be greater than 0"
        );
    }

    #[test]
    fn test_insufficient_stock_message_names_product() {
        let err = LedgerError::InsufficientStock {
            product_id: "apple".into(),
            product_name: "Apple".into(),
            available: 10,
            requested: 12,
        };
        let msg = err.to_string();
        assert!(msg.contains("Apple"));
        assert!(msg.contains("10 available"));
    }
}
