//! Error types for TESSERA operations

use crate::{AccessDecision, NetworkToggle, Role};
use thiserror::Error;

/// Cache layer errors.
///
/// Loader failures are not represented here: `get_or_load` hands the loader's
/// own error back to the caller untouched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Invalid cache capacity: {max} (must be greater than 0)")]
    InvalidCapacity { max: usize },

    #[error("Invalid cache TTL: must be greater than zero")]
    InvalidTtl,

    #[error("Cache lock poisoned")]
    LockPoisoned,
}

/// Errors reported by the remote document-store transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Document not found: {path}")]
    NotFound { path: String },

    #[error("Transport unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Request rejected by remote store: {reason}")]
    Rejected { reason: String },

    #[error("Failed to {toggle} network: {reason}")]
    ToggleFailed { toggle: NetworkToggle, reason: String },

    #[error("Subscription teardown failed: {reason}")]
    CancelFailed { reason: String },
}

/// A subscription's cancel callback failed.
///
/// These are logged and collected, never propagated to the code that
/// triggered the teardown.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TeardownError {
    #[error("Teardown failed for subscription {key}: {source}")]
    Failed {
        key: String,
        #[source]
        source: TransportError,
    },

    #[error("Teardown panicked for subscription {key}: {message}")]
    Panicked { key: String, message: String },
}

impl TeardownError {
    /// Key of the subscription whose teardown failed.
    pub fn key(&self) -> &str {
        match self {
            TeardownError::Failed { key, .. } | TeardownError::Panicked { key, .. } => key,
        }
    }
}

/// Subscription registry errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Subscription registry lock poisoned")]
    LockPoisoned,

    #[error("Invalid subscription key: {reason}")]
    InvalidKey { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to initialize {component}: {reason}")]
    InitFailed { component: String, reason: String },
}

/// Access denied on a path that must fail hard (writes, server actions).
///
/// View entry points branch on [`AccessDecision`] directly instead.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("Access denied ({decision}): requires role {required}")]
    Denied {
        decision: AccessDecision,
        required: Role,
    },
}

/// Master error type for all TESSERA errors.
#[derive(Debug, Clone, Error)]
pub enum TesseraError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Teardown error: {0}")]
    Teardown(#[from] TeardownError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Access error: {0}")]
    Access(#[from] AccessError),
}

impl TesseraError {
    /// True when the underlying cause is a missing remote document.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TesseraError::Transport(TransportError::NotFound { .. }))
    }
}

/// Result type alias for TESSERA operations.
pub type TesseraResult<T> = Result<T, TesseraError>;

// =============================================================================
// TESTS
// =============================================================================
