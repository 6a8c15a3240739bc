use thiserror::Error;
use uuid::Uuid;

use crate::decimal::Money;
use crate::types::{Format, Period};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("contract not found: {message}")]
    ContractNotFound {
        message: String,
    },

    #[error("invalid sales data for {format}, data reconciliation required: {message}")]
    InvalidSalesData {
        format: Format,
        message: String,
    },

    #[error("tier configuration error for {format}: {message}")]
    TierConfigurationError {
        format: Format,
        message: String,
    },

    #[error("arithmetic overflow during {operation}")]
    ArithmeticOverflow {
        operation: &'static str,
    },

    #[error("invalid advance state: {message}")]
    InvalidAdvanceState {
        message: String,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },

    #[error("invalid period: {message}")]
    InvalidPeriod {
        message: String,
    },

    #[error("stale advance state for contract {contract_id}: expected version {expected}, found {found}")]
    StaleAdvanceState {
        contract_id: Uuid,
        expected: u64,
        found: u64,
    },

    #[error("recouped amount would decrease for contract {contract_id}: {current} -> {proposed}")]
    NonMonotonicRecoupment {
        contract_id: Uuid,
        current: Money,
        proposed: Money,
    },

    #[error("period {period} for contract {contract_id} overlaps committed period {committed}")]
    PeriodAlreadyCommitted {
        contract_id: Uuid,
        period: Period,
        committed: Period,
    },

    #[error("breakdown does not re-derive: {message}")]
    BreakdownMismatch {
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, EngineError>;
