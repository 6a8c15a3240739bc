use serde::{Deserialize, Serialize};

use crate::decimal::Rate;
use crate::errors::{EngineError, Result};
use crate::types::{Format, Units};

/// one band of cumulative lifetime units.
///
/// The band covers units `from_units..to_units` (upper bound exclusive), so a
/// tier written as "0-5000" followed by "5001+" is `0..5000` then `5000..`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    pub from_units: Units,
    /// `None` for the final, unbounded tier
    pub to_units: Option<Units>,
    pub rate: Rate,
}

impl Tier {
    pub fn bounded(from_units: Units, to_units: Units, rate: Rate) -> Self {
        Self { from_units, to_units: Some(to_units), rate }
    }

    pub fn unbounded(from_units: Units, rate: Rate) -> Self {
        Self { from_units, to_units: None, rate }
    }

    /// number of units the tier can hold, `None` when unbounded
    pub fn capacity(&self) -> Option<Units> {
        self.to_units.map(|to| to.saturating_sub(self.from_units))
    }

    pub fn contains(&self, unit_position: Units) -> bool {
        unit_position >= self.from_units && self.to_units.map_or(true, |to| unit_position < to)
    }
}

/// units of one period allocated to one tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierAllocation {
    pub tier_index: usize,
    pub units: Units,
    pub rate: Rate,
}

/// validated, ascending, gapless tier list for one format
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierSchedule {
    tiers: Vec<Tier>,
}

impl TierSchedule {
    /// validate and wrap a tier list.
    ///
    /// The list must start at unit 0, be contiguous and non-overlapping, and
    /// only its last tier may be unbounded. Rates must lie in [0, 1].
    pub fn new(format: &Format, tiers: Vec<Tier>) -> Result<Self> {
        let config_error = |message: String| EngineError::TierConfigurationError {
            format: format.clone(),
            message,
        };

        let first = tiers
            .first()
            .ok_or_else(|| config_error("schedule has no tiers".to_string()))?;
        if first.from_units != 0 {
            return Err(config_error(format!(
                "first tier starts at {} instead of 0",
                first.from_units
            )));
        }

        for (index, tier) in tiers.iter().enumerate() {
            if !tier.rate.is_valid_royalty_rate() {
                return Err(config_error(format!(
                    "tier {} rate {} is outside [0, 1]",
                    index,
                    tier.rate.as_decimal()
                )));
            }

            if let Some(to) = tier.to_units {
                if to <= tier.from_units {
                    return Err(config_error(format!(
                        "tier {} is empty or inverted: {}..{}",
                        index, tier.from_units, to
                    )));
                }
            }

            if let Some(next) = tiers.get(index + 1) {
                match tier.to_units {
                    None => {
                        return Err(config_error(format!(
                            "tier {} is unbounded but is not the last tier",
                            index
                        )));
                    }
                    Some(to) if to < next.from_units => {
                        return Err(config_error(format!(
                            "gap between tier {} (ends {}) and tier {} (starts {})",
                            index,
                            to,
                            index + 1,
                            next.from_units
                        )));
                    }
                    Some(to) if to > next.from_units => {
                        return Err(config_error(format!(
                            "tier {} (ends {}) overlaps tier {} (starts {})",
                            index,
                            to,
                            index + 1,
                            next.from_units
                        )));
                    }
                    Some(_) => {}
                }
            }
        }

        Ok(Self { tiers })
    }

    /// single unbounded tier
    pub fn flat(rate: Rate) -> Self {
        Self { tiers: vec![Tier::unbounded(0, rate)] }
    }

    /// escalator from a base rate and `(threshold, rate)` steps, each step
    /// applying from its threshold onwards
    pub fn escalating(format: &Format, base_rate: Rate, steps: &[(Units, Rate)]) -> Result<Self> {
        let mut tiers = Vec::with_capacity(steps.len() + 1);
        let mut from = 0;
        let mut rate = base_rate;
        for &(threshold, next_rate) in steps {
            tiers.push(Tier::bounded(from, threshold, rate));
            from = threshold;
            rate = next_rate;
        }
        tiers.push(Tier::unbounded(from, rate));
        Self::new(format, tiers)
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    /// rate applied to the unit at the given lifetime position
    pub fn rate_at(&self, unit_position: Units) -> Option<Rate> {
        self.tiers.iter().find(|t| t.contains(unit_position)).map(|t| t.rate)
    }

    /// split a period's net units across tier boundaries.
    ///
    /// Walks tiers in ascending order and gives each tier the overlap of
    /// `[cumulative_before, cumulative_before + net_units)` with its own range.
    /// Tiers the period does not touch produce no allocation. Fails when the
    /// tiers cannot absorb every unit of the period.
    pub fn resolve(
        &self,
        format: &Format,
        cumulative_before: Units,
        net_units: Units,
    ) -> Result<Vec<TierAllocation>> {
        let period_start = cumulative_before;
        let period_end = cumulative_before
            .checked_add(net_units)
            .ok_or(EngineError::ArithmeticOverflow { operation: "cumulative unit count" })?;

        let mut allocations = Vec::new();
        let mut allocated: Units = 0;

        for (tier_index, tier) in self.tiers.iter().enumerate() {
            if allocated == net_units {
                break;
            }
            let upper = tier.to_units.unwrap_or(Units::MAX);
            let lower = tier.from_units;
            let overlap_start = lower.max(period_start);
            let overlap_end = upper.min(period_end);
            if overlap_end <= overlap_start {
                continue;
            }

            let units = overlap_end - overlap_start;
            allocated += units;
            tracing::trace!(%format, tier_index, units, rate = %tier.rate, "allocated units to tier");
            allocations.push(TierAllocation {
                tier_index,
                units,
                rate: tier.rate,
            });
        }

        if allocated != net_units {
            return Err(EngineError::TierConfigurationError {
                format: format.clone(),
                message: format!(
                    "tiers account for {} of {} units starting at cumulative {}",
                    allocated, net_units, cumulative_before
                ),
            });
        }

        Ok(allocations)
    }
}
