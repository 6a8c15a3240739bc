use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{EngineError, Result};

/// snapshot of an author's advance as read from the contract store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AdvanceState {
    pub total_advance: Money,
    pub recouped_to_date: Money,
}

impl AdvanceState {
    pub fn new(total_advance: Money, recouped_to_date: Money) -> Result<Self> {
        let state = Self { total_advance, recouped_to_date };
        state.validate()?;
        Ok(state)
    }

    /// contract without an advance
    pub fn none() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.total_advance.is_negative() {
            return Err(EngineError::InvalidAdvanceState {
                message: format!("total advance {} is negative", self.total_advance),
            });
        }
        if self.recouped_to_date.is_negative() {
            return Err(EngineError::InvalidAdvanceState {
                message: format!("recouped to date {} is negative", self.recouped_to_date),
            });
        }
        if self.recouped_to_date > self.total_advance {
            return Err(EngineError::InvalidAdvanceState {
                message: format!(
                    "recouped to date {} exceeds total advance {}",
                    self.recouped_to_date, self.total_advance
                ),
            });
        }
        Ok(())
    }

    /// advance still to be earned out
    pub fn outstanding(&self) -> Result<Money> {
        self.total_advance.checked_sub(self.recouped_to_date)
    }

    pub fn is_fully_recouped(&self) -> bool {
        self.recouped_to_date >= self.total_advance
    }

    /// next snapshot after a period's recoupment.
    ///
    /// The recouped amount only ever grows and never passes the advance.
    pub fn apply(&self, outcome: &RecoupmentOutcome) -> Result<AdvanceState> {
        if outcome.advance_recouped_this_period.is_negative() {
            return Err(EngineError::InvalidAdvanceState {
                message: format!(
                    "recoupment {} is negative",
                    outcome.advance_recouped_this_period
                ),
            });
        }
        let next = AdvanceState {
            total_advance: self.total_advance,
            recouped_to_date: self
                .recouped_to_date
                .checked_add(outcome.advance_recouped_this_period)?,
        };
        next.validate()?;
        Ok(next)
    }
}

/// what one period's royalty did to the advance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoupmentOutcome {
    pub advance_recouped_this_period: Money,
    pub advance_remaining_after: Money,
    pub net_payable: Money,
}

/// offsets earned royalty against the unrecouped advance
pub struct AdvanceRecoupmentTracker;

impl AdvanceRecoupmentTracker {
    /// recoup up to the outstanding advance from this period's earnings.
    ///
    /// Never recoups more than is outstanding, never leaves a negative
    /// remainder, and `recouped + net_payable == earned` always holds.
    pub fn recoup(total_royalty_earned: Money, state: &AdvanceState) -> Result<RecoupmentOutcome> {
        state.validate()?;
        if total_royalty_earned.is_negative() {
            return Err(EngineError::InvalidAdvanceState {
                message: format!("earned royalty {} is negative", total_royalty_earned),
            });
        }

        let outstanding = state.outstanding()?;
        let recoupable = total_royalty_earned.min(outstanding);
        let advance_recouped_this_period = recoupable.max(Money::ZERO);
        let advance_remaining_after = outstanding.checked_sub(advance_recouped_this_period)?;
        let net_payable = total_royalty_earned.checked_sub(advance_recouped_this_period)?;

        tracing::debug!(
            earned = %total_royalty_earned,
            recouped = %advance_recouped_this_period,
            remaining = %advance_remaining_after,
            payable = %net_payable,
            "applied advance recoupment"
        );

        Ok(RecoupmentOutcome {
            advance_recouped_this_period,
            advance_remaining_after,
            net_payable,
        })
    }
}
