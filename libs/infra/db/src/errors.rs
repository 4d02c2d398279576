//! The closed set of failure modes a repository can report. Every variant
//! maps to one of §7's three categories (data-absence, contract violation,
//! transient) so callers can apply the right response policy without
//! inspecting error internals.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// Network or authentication failure establishing the pool.
    #[error("database connection failed: {0}")]
    ConnectionError(String),

    /// `DATABASE_URL` (or another required environment input) absent or malformed.
    #[error("database configuration error: {0}")]
    ConfigurationError(String),

    /// Propagated verbatim from sqlx; covers constraint violations, syntax
    /// errors and transport failures alike — callers that need to tell a
    /// unique-key conflict apart from a dead connection should match on
    /// `sqlx::Error` via `.source()`.
    #[error("query failed: {0}")]
    QueryError(#[from] sqlx::Error),

    /// A row could not be translated into its domain type.
    #[error("row mapping failed: {0}")]
    MappingError(String),

    /// Referenced entity does not exist — the data-absence case from §7,
    /// callers log and skip rather than treat this as fatal.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A unique constraint was violated by design (duplicate inbox
    /// `message_id`, duplicate open `SettlementIssue` key, ...).
    #[error("duplicate {0}")]
    Conflict(&'static str),

    /// A domain-level state-machine invariant was violated
    /// (`mark_invoiced` on a non-`Calculated` settlement, ...).
    #[error(transparent)]
    InvalidState(#[from] settlement_domain_models::SettlementStateError),
}

impl DbError {
    /// True for the constraint-violation shape Postgres reports on a
    /// unique-index conflict (SQLSTATE 23505) — used to translate a raw
    /// `QueryError` into the more specific `Conflict` at the call site.
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            DbError::QueryError(sqlx::Error::Database(db_err))
                if db_err.code().as_deref() == Some("23505")
        )
    }
}
