//! Single entry point of the royalty engine.
//!
//! `calculate` is pure: it reads its input snapshots, allocates its own
//! output and touches nothing else, so it can run for many contracts at once
//! and returns the same result for the same inputs every time.

use std::collections::BTreeSet;

use crate::advance::{AdvanceRecoupmentTracker, AdvanceState};
use crate::calculation::{CalculationAssembler, RoyaltyCalculation};
use crate::config::ContractTerms;
use crate::errors::{EngineError, Result};
use crate::royalty::{total_royalty, RoyaltyCalculator};
use crate::sales::NetSalesByFormat;
use crate::types::{Period, UnitsByFormat};

/// calculate royalties for one contract and period.
///
/// Net sales are resolved against each format's tier schedule starting at
/// that format's cumulative units (zero when absent), priced under the
/// contract's rate basis, totalled, and offset against the advance. Any
/// failure aborts before a result is assembled.
pub fn calculate(
    terms: &ContractTerms,
    advance: &AdvanceState,
    net_sales: &[NetSalesByFormat],
    cumulative_units: &UnitsByFormat,
    period: &Period,
) -> Result<RoyaltyCalculation> {
    period.validate()?;
    advance.validate()?;

    let mut ordered: Vec<&NetSalesByFormat> = net_sales.iter().collect();
    ordered.sort_by(|a, b| a.format.cmp(&b.format));

    let mut seen = BTreeSet::new();
    for sales in &ordered {
        if !seen.insert(&sales.format) {
            return Err(EngineError::InvalidSalesData {
                format: sales.format.clone(),
                message: "format appears more than once in net sales".to_string(),
            });
        }
        sales.validate()?;
    }

    let calculator = RoyaltyCalculator::new(terms.rate_basis());
    let mut per_format = Vec::with_capacity(ordered.len());
    for sales in ordered {
        let schedule = terms.schedule(&sales.format)?;
        let before = cumulative_units.get(&sales.format).copied().unwrap_or(0);
        let allocations = schedule.resolve(&sales.format, before, sales.net_units)?;
        per_format.push(calculator.calculate_format(sales, &allocations)?);
    }

    let total_royalty_earned = total_royalty(&per_format)?;
    let recoupment = AdvanceRecoupmentTracker::recoup(total_royalty_earned, advance)?;

    tracing::debug!(
        contract_id = %terms.contract_id(),
        period = %period,
        formats = per_format.len(),
        earned = %total_royalty_earned,
        payable = %recoupment.net_payable,
        "royalty calculation complete"
    );

    Ok(CalculationAssembler::assemble(
        terms.contract_id(),
        *period,
        per_format,
        total_royalty_earned,
        recoupment,
    ))
}
