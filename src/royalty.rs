use serde::{Deserialize, Serialize};

use crate::config::RateBasis;
use crate::decimal::{Money, Rate};
use crate::errors::{EngineError, Result};
use crate::sales::NetSalesByFormat;
use crate::tiers::TierAllocation;
use crate::types::{Format, Units};

/// royalty earned by one tier of one format in the period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierBreakdown {
    pub tier_index: usize,
    pub units_in_tier: Units,
    pub rate: Rate,
    pub royalty_amount: Money,
}

/// royalty earned by one format in the period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatRoyalty {
    pub format: Format,
    pub net_units: Units,
    pub net_revenue: Money,
    pub tier_breakdown: Vec<TierBreakdown>,
    pub format_royalty_total: Money,
}

impl FormatRoyalty {
    /// sum of the breakdown rows
    pub fn breakdown_total(&self) -> Result<Money> {
        Money::checked_sum(self.tier_breakdown.iter().map(|row| row.royalty_amount))
    }
}

/// applies tier rates to tier allocations
pub struct RoyaltyCalculator<'a> {
    basis: &'a RateBasis,
}

impl<'a> RoyaltyCalculator<'a> {
    pub fn new(basis: &'a RateBasis) -> Self {
        Self { basis }
    }

    /// royalty for one format.
    ///
    /// The format total is the unrounded sum of the tier amounts rounded once.
    /// Rows start at their exact amount truncated to the cent; the cents still
    /// owed to reach the total go one at a time to the rows with the largest
    /// truncated remainder, earlier tiers first on ties. Rows therefore sum to
    /// the total exactly, never go negative, and a 0% tier stays at zero.
    pub fn calculate_format(
        &self,
        sales: &NetSalesByFormat,
        allocations: &[TierAllocation],
    ) -> Result<FormatRoyalty> {
        let mut rows = Vec::with_capacity(allocations.len());
        let mut remainders = Vec::with_capacity(allocations.len());
        let mut exact_total = Money::ZERO;

        for allocation in allocations.iter().filter(|a| a.units > 0) {
            let base = self.tier_base(sales, allocation.units)?;
            let exact = base.checked_mul_rate(allocation.rate)?;
            let truncated = exact.truncate_to_cent();
            exact_total = exact_total.checked_add(exact)?;
            remainders.push((rows.len(), exact.checked_sub(truncated)?));
            rows.push(TierBreakdown {
                tier_index: allocation.tier_index,
                units_in_tier: allocation.units,
                rate: allocation.rate,
                royalty_amount: truncated,
            });
        }

        let format_royalty_total = exact_total.round_to_cent();
        let truncated_total = Money::checked_sum(rows.iter().map(|row| row.royalty_amount))?;
        let owed = format_royalty_total.checked_sub(truncated_total)?;
        distribute_cents(&mut rows, &mut remainders, owed)?;

        tracing::debug!(
            format = %sales.format,
            net_units = sales.net_units,
            tiers = rows.len(),
            total = %format_royalty_total,
            "calculated format royalty"
        );

        Ok(FormatRoyalty {
            format: sales.format.clone(),
            net_units: sales.net_units,
            net_revenue: sales.net_revenue,
            tier_breakdown: rows,
            format_royalty_total,
        })
    }

    /// amount the tier rate is applied to
    fn tier_base(&self, sales: &NetSalesByFormat, units_in_tier: Units) -> Result<Money> {
        match self.basis {
            RateBasis::RealizedAveragePrice => {
                sales.net_revenue.checked_mul_ratio(units_in_tier, sales.net_units)
            }
            RateBasis::ReferencePrice { prices } => {
                let price = prices.get(&sales.format).ok_or_else(|| EngineError::InvalidConfiguration {
                    message: format!("no reference price for format {}", sales.format),
                })?;
                price.checked_mul_units(units_in_tier)
            }
        }
    }
}

/// hand out `owed` one cent at a time by descending remainder.
///
/// `owed` is the rounded total minus the truncated rows, so it is never
/// negative and never exceeds the number of rows with a non-zero remainder.
fn distribute_cents(
    rows: &mut [TierBreakdown],
    remainders: &mut [(usize, Money)],
    owed: Money,
) -> Result<()> {
    if owed.is_zero() {
        return Ok(());
    }
    // stable sort keeps tier order among equal remainders
    remainders.sort_by(|a, b| b.1.cmp(&a.1));

    let mut left = owed;
    for (index, remainder) in remainders.iter() {
        if left.is_zero() || remainder.is_zero() {
            break;
        }
        let row = &mut rows[*index];
        row.royalty_amount = row.royalty_amount.checked_add(Money::CENT)?;
        left = left.checked_sub(Money::CENT)?;
        tracing::trace!(tier = row.tier_index, %remainder, "rounding cent assigned");
    }

    if !left.is_zero() {
        return Err(EngineError::BreakdownMismatch {
            message: format!("{} of rounding left unassigned across tier rows", left),
        });
    }
    Ok(())
}

/// grand total across formats
pub fn total_royalty(formats: &[FormatRoyalty]) -> Result<Money> {
    Money::checked_sum(formats.iter().map(|f| f.format_royalty_total))
}
