use serde::{Deserialize, Serialize};

use crate::advance::{AdvanceState, RecoupmentOutcome};
use crate::decimal::Money;
use crate::errors::{EngineError, Result};
use crate::royalty::FormatRoyalty;
use crate::types::{ContractId, Format, Period, UnitsByFormat};

/// complete, immutable royalty result for one contract and period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoyaltyCalculation {
    pub contract_id: ContractId,
    pub period: Period,
    pub per_format: Vec<FormatRoyalty>,
    pub total_royalty_earned: Money,
    pub advance_recouped_this_period: Money,
    pub advance_remaining_after: Money,
    pub net_payable: Money,
}

impl RoyaltyCalculation {
    pub fn format(&self, format: &Format) -> Option<&FormatRoyalty> {
        self.per_format.iter().find(|f| &f.format == format)
    }

    /// re-derive every total from its breakdown rows.
    ///
    /// Checks tier rows against format totals, format totals against the
    /// grand total, conservation of recouped plus payable, and that nothing
    /// is negative or carries sub-cent precision.
    pub fn verify(&self) -> Result<()> {
        let mismatch = |message: String| EngineError::BreakdownMismatch { message };

        for format in &self.per_format {
            if let Some(row) = format
                .tier_breakdown
                .iter()
                .find(|row| row.royalty_amount.is_negative() || !row.royalty_amount.is_whole_cents())
            {
                return Err(mismatch(format!(
                    "{} tier {} royalty {} is negative or not whole cents",
                    format.format, row.tier_index, row.royalty_amount
                )));
            }
            let rows = format.breakdown_total()?;
            if rows != format.format_royalty_total {
                return Err(mismatch(format!(
                    "{} rows sum to {} but total is {}",
                    format.format, rows, format.format_royalty_total
                )));
            }
            let units: u64 = format.tier_breakdown.iter().map(|row| row.units_in_tier).sum();
            if units != format.net_units {
                return Err(mismatch(format!(
                    "{} rows hold {} units but net units are {}",
                    format.format, units, format.net_units
                )));
            }
        }

        let formats = Money::checked_sum(self.per_format.iter().map(|f| f.format_royalty_total))?;
        if formats != self.total_royalty_earned {
            return Err(mismatch(format!(
                "formats sum to {} but total earned is {}",
                formats, self.total_royalty_earned
            )));
        }

        let conserved = self
            .advance_recouped_this_period
            .checked_add(self.net_payable)?;
        if conserved != self.total_royalty_earned {
            return Err(mismatch(format!(
                "recouped {} plus payable {} is not earned {}",
                self.advance_recouped_this_period, self.net_payable, self.total_royalty_earned
            )));
        }

        let amounts = [
            self.total_royalty_earned,
            self.advance_recouped_this_period,
            self.advance_remaining_after,
            self.net_payable,
        ];
        if amounts.iter().any(|m| m.is_negative() || !m.is_whole_cents()) {
            return Err(mismatch("amounts must be non-negative whole cents".to_string()));
        }

        Ok(())
    }

    /// cumulative lifetime units to feed into the next period
    pub fn cumulative_units_after(&self, before: &UnitsByFormat) -> Result<UnitsByFormat> {
        let mut after = before.clone();
        for format in &self.per_format {
            let entry = after.entry(format.format.clone()).or_insert(0);
            *entry = entry
                .checked_add(format.net_units)
                .ok_or(EngineError::ArithmeticOverflow { operation: "cumulative unit count" })?;
        }
        Ok(after)
    }

    /// advance snapshot after this period's recoupment
    pub fn advance_after(&self, before: &AdvanceState) -> Result<AdvanceState> {
        before.apply(&RecoupmentOutcome {
            advance_recouped_this_period: self.advance_recouped_this_period,
            advance_remaining_after: self.advance_remaining_after,
            net_payable: self.net_payable,
        })
    }

    /// convert to pretty-printed json string
    pub fn to_json_pretty(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// puts the finished pieces into a `RoyaltyCalculation`
pub struct CalculationAssembler;

impl CalculationAssembler {
    pub fn assemble(
        contract_id: ContractId,
        period: Period,
        per_format: Vec<FormatRoyalty>,
        total_royalty_earned: Money,
        recoupment: RecoupmentOutcome,
    ) -> RoyaltyCalculation {
        RoyaltyCalculation {
            contract_id,
            period,
            per_format,
            total_royalty_earned,
            advance_recouped_this_period: recoupment.advance_recouped_this_period,
            advance_remaining_after: recoupment.advance_remaining_after,
            net_payable: recoupment.net_payable,
        }
    }
}
