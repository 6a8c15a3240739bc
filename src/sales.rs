use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::decimal::Money;
use crate::errors::{EngineError, Result};
use crate::types::{Format, Period, Units};

/// whether a ledger line adds or removes units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleKind {
    Sale,
    Return,
}

/// raw sale or return line for one contract.
///
/// `amount` is a non-negative magnitude; the kind decides whether it adds to
/// or removes from revenue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub format: Format,
    pub kind: SaleKind,
    pub units: Units,
    pub amount: Money,
    pub occurred_on: NaiveDate,
}

impl SaleRecord {
    pub fn sale(format: Format, units: Units, amount: Money, occurred_on: NaiveDate) -> Self {
        Self { format, kind: SaleKind::Sale, units, amount, occurred_on }
    }

    pub fn sale_return(format: Format, units: Units, amount: Money, occurred_on: NaiveDate) -> Self {
        Self { format, kind: SaleKind::Return, units, amount, occurred_on }
    }
}

/// net sales of one format in one period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetSalesByFormat {
    pub format: Format,
    pub gross_units: Units,
    pub returned_units: Units,
    pub net_units: Units,
    pub net_revenue: Money,
}

impl NetSalesByFormat {
    /// build from gross and returned units, deriving net units
    pub fn new(format: Format, gross_units: Units, returned_units: Units, net_revenue: Money) -> Result<Self> {
        let net_units = gross_units.checked_sub(returned_units).ok_or_else(|| {
            EngineError::InvalidSalesData {
                format: format.clone(),
                message: format!(
                    "returned units {} exceed gross units {}",
                    returned_units, gross_units
                ),
            }
        })?;

        let sales = Self { format, gross_units, returned_units, net_units, net_revenue };
        sales.validate()?;
        Ok(sales)
    }

    /// re-check values that may have been assembled by the caller
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| EngineError::InvalidSalesData {
            format: self.format.clone(),
            message,
        };

        if self.returned_units > self.gross_units {
            return Err(invalid(format!(
                "returned units {} exceed gross units {}",
                self.returned_units, self.gross_units
            )));
        }
        if self.net_units != self.gross_units - self.returned_units {
            return Err(invalid(format!(
                "net units {} do not equal gross {} minus returned {}",
                self.net_units, self.gross_units, self.returned_units
            )));
        }
        if self.net_revenue.is_negative() {
            return Err(invalid(format!("net revenue {} is negative", self.net_revenue)));
        }
        Ok(())
    }

    /// realized average price per net unit, unrounded
    pub fn average_price(&self) -> Result<Option<Money>> {
        if self.net_units == 0 {
            return Ok(None);
        }
        self.net_revenue.checked_mul_ratio(1, self.net_units).map(Some)
    }
}

#[derive(Default)]
struct FormatTotals {
    gross_units: Units,
    returned_units: Units,
    revenue: Money,
}

/// folds raw sale and return lines into per-format net sales
pub struct NetSalesAggregator {
    period: Period,
}

impl NetSalesAggregator {
    pub fn new(period: Period) -> Self {
        Self { period }
    }

    /// aggregate records into one row per format, ordered by format.
    ///
    /// Revenue is summed line by line rather than derived from an average
    /// price. Returns that outweigh sales are rejected, never clamped.
    pub fn aggregate(&self, records: &[SaleRecord]) -> Result<Vec<NetSalesByFormat>> {
        let mut totals: BTreeMap<Format, FormatTotals> = BTreeMap::new();

        for record in records {
            if !self.period.contains(record.occurred_on) {
                return Err(EngineError::InvalidSalesData {
                    format: record.format.clone(),
                    message: format!(
                        "record dated {} falls outside period {}",
                        record.occurred_on, self.period
                    ),
                });
            }
            if record.amount.is_negative() {
                return Err(EngineError::InvalidSalesData {
                    format: record.format.clone(),
                    message: format!("record amount {} is negative", record.amount),
                });
            }

            let entry = totals.entry(record.format.clone()).or_default();
            match record.kind {
                SaleKind::Sale => {
                    entry.gross_units = entry
                        .gross_units
                        .checked_add(record.units)
                        .ok_or(EngineError::ArithmeticOverflow { operation: "gross unit count" })?;
                    entry.revenue = entry.revenue.checked_add(record.amount)?;
                }
                SaleKind::Return => {
                    entry.returned_units = entry
                        .returned_units
                        .checked_add(record.units)
                        .ok_or(EngineError::ArithmeticOverflow { operation: "returned unit count" })?;
                    entry.revenue = entry.revenue.checked_sub(record.amount)?;
                }
            }
        }

        let net_sales = totals
            .into_iter()
            .map(|(format, t)| NetSalesByFormat::new(format, t.gross_units, t.returned_units, t.revenue))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(period = %self.period, formats = net_sales.len(), "aggregated net sales");
        Ok(net_sales)
    }
}
