use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Store connection error: {0}")]
    StoreConnection(String),

    #[error("Store query error: {0}")]
    StoreQuery(String),

    #[error("Store timeout: {0}")]
    StoreTimeout(String),

    #[error("Cross-tenant violation: expected tenant {expected:?}, got {actual:?}")]
    CrossTenantViolation {
        expected: Option<String>,
        actual: Option<String>,
    },

    #[error("Circuit open: {0}")]
    CircuitOpen(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Connection failures and timeouts may succeed when repeated unchanged.
    #[inline]
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::StoreConnection(_) | Error::StoreTimeout(_))
    }

    /// Failures that count against a circuit breaker
    #[inline]
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            Error::StoreConnection(_) | Error::StoreQuery(_) | Error::StoreTimeout(_)
        )
    }

    pub fn cross_tenant(expected: Option<&str>, actual: Option<&str>) -> Self {
        Error::CrossTenantViolation {
            expected: expected.map(str::to_string),
            actual: actual.map(str::to_string),
        }
    }
}
