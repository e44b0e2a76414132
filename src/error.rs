//! Typed failure taxonomy for ledger operations.
//!
//! Business-rule violations carry the available/requested detail the caller
//! needs to react; not-found and ownership misses are indistinguishable so the
//! API never leaks whether an entity exists for another user.

use rust_decimal::Decimal;

use crate::models::{DayStatus, OrderStatus};

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Malformed or out-of-range input, rejected before any state is read.
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("insufficient fiat: {available} available, {requested} requested")]
    InsufficientFiat { available: Decimal, requested: Decimal },

    #[error("insufficient asset balance: {available} available, {requested} requested")]
    InsufficientAsset { available: Decimal, requested: Decimal },

    #[error("insufficient vault funds: {available} available, {requested} requested")]
    InsufficientVaultFunds { available: Decimal, requested: Decimal },

    #[error("insufficient cycle funds: {available} available, {requested} requested")]
    InsufficientCycleFunds { available: Decimal, requested: Decimal },

    #[error("sell price {computed} would not clear break-even {break_even}")]
    UnprofitableQuote { computed: Decimal, break_even: Decimal },

    #[error("competitor-based price {candidate} is at or below break-even {break_even}")]
    CompetitorPriceTooLow { candidate: Decimal, break_even: Decimal },

    #[error("{pending} active order(s) must be completed or cancelled before closing the day")]
    ActiveOrdersRemaining { pending: i64 },

    #[error("order in status {status:?} cannot be cancelled")]
    OrderNotCancellable { status: OrderStatus },

    #[error("order in status {status:?} cannot accept new executions")]
    OrderNotExecutable { status: OrderStatus },

    #[error("execution of {requested} exceeds remaining order quantity {remaining}")]
    ExecutionExceedsOrder { remaining: Decimal, requested: Decimal },

    #[error("daily cycle in status {status:?} is not active")]
    DayNotActive { status: DayStatus },

    #[error("general cycle has no active daily cycle")]
    NoActiveDay,

    #[error("order not found")]
    OrderNotFound,

    #[error("cycle not found")]
    CycleNotFound,

    /// Concurrent-modification retries exhausted; the caller may retry.
    #[error("conflicting concurrent update, please retry")]
    Conflict,

    /// A state transition would break a ledger invariant. Fatal; the enclosing
    /// transaction rolls back entirely.
    #[error("ledger invariant violated: {0}")]
    Invariant(String),

    #[error("database error")]
    Database(#[from] sqlx::Error),
}

impl LedgerError {
    pub(crate) fn from_validation(errors: validator::ValidationErrors) -> Self {
        LedgerError::Validation(errors.to_string())
    }
}
