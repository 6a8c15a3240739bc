use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::advance::AdvanceState;
use crate::errors::{EngineError, Result};
use crate::types::{ContractId, Period, UnitsByFormat};

/// persisted per-contract position between statement periods
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub advance: AdvanceState,
    pub cumulative_units: UnitsByFormat,
    /// bumped on every commit, checked for optimistic concurrency
    pub version: u64,
    pub last_period: Option<Period>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl LedgerEntry {
    pub fn opening(advance: AdvanceState) -> Self {
        Self {
            advance,
            cumulative_units: UnitsByFormat::new(),
            version: 0,
            last_period: None,
            updated_at: None,
        }
    }
}

/// in-memory store of advance balances and cumulative units.
///
/// Stands in for the caller's contract store: a commit must name the
/// version it read, so two runs against the same snapshot cannot both
/// recoup the same advance.
#[derive(Debug, Default)]
pub struct AdvanceLedger {
    entries: HashMap<ContractId, LedgerEntry>,
}

impl AdvanceLedger {
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    /// register a contract's opening advance
    pub fn open(&mut self, contract_id: ContractId, advance: AdvanceState) -> Result<()> {
        advance.validate()?;
        if self.entries.contains_key(&contract_id) {
            return Err(EngineError::InvalidConfiguration {
                message: format!("contract {} already has a ledger entry", contract_id),
            });
        }
        self.entries.insert(contract_id, LedgerEntry::opening(advance));
        Ok(())
    }

    /// copy of the current entry, the snapshot a run works from
    pub fn snapshot(&self, contract_id: &ContractId) -> Result<LedgerEntry> {
        self.entries
            .get(contract_id)
            .cloned()
            .ok_or_else(|| EngineError::ContractNotFound {
                message: format!("no ledger entry for contract {}", contract_id),
            })
    }

    /// replace an entry if it is still at `expected_version`.
    ///
    /// Rejects stale versions, periods that do not start after the last
    /// committed one, and any decrease of the recouped amount.
    pub fn commit(
        &mut self,
        contract_id: ContractId,
        expected_version: u64,
        advance: AdvanceState,
        cumulative_units: UnitsByFormat,
        period: Period,
        timestamp: DateTime<Utc>,
    ) -> Result<u64> {
        advance.validate()?;
        period.validate()?;
        let entry = self.entries.get_mut(&contract_id).ok_or_else(|| EngineError::ContractNotFound {
            message: format!("no ledger entry for contract {}", contract_id),
        })?;

        if entry.version != expected_version {
            tracing::warn!(%contract_id, expected_version, found = entry.version, "rejected stale ledger commit");
            return Err(EngineError::StaleAdvanceState {
                contract_id,
                expected: expected_version,
                found: entry.version,
            });
        }
        if let Some(committed) = entry.last_period {
            if period.start <= committed.end {
                tracing::warn!(%contract_id, %period, %committed, "rejected ledger commit for an already committed period");
                return Err(EngineError::PeriodAlreadyCommitted { contract_id, period, committed });
            }
        }
        if advance.recouped_to_date < entry.advance.recouped_to_date {
            tracing::warn!(%contract_id, "rejected ledger commit that lowers recoupment");
            return Err(EngineError::NonMonotonicRecoupment {
                contract_id,
                current: entry.advance.recouped_to_date,
                proposed: advance.recouped_to_date,
            });
        }

        entry.advance = advance;
        entry.cumulative_units = cumulative_units;
        entry.version += 1;
        entry.last_period = Some(period);
        entry.updated_at = Some(timestamp);
        Ok(entry.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Money;
    use chrono::{NaiveDate, TimeZone};
    use uuid::Uuid;

    fn period() -> Period {
        Period::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
        )
        .unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 15, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_commit_bumps_version() {
        let id = Uuid::new_v4();
        let mut ledger = AdvanceLedger::new();
        ledger.open(id, AdvanceState::new(Money::from_major(1_000), Money::ZERO).unwrap()).unwrap();

        let next = AdvanceState::new(Money::from_major(1_000), Money::from_major(400)).unwrap();
        let version = ledger.commit(id, 0, next, UnitsByFormat::new(), period(), now()).unwrap();
        assert_eq!(version, 1);

        let entry = ledger.snapshot(&id).unwrap();
        assert_eq!(entry.advance, next);
        assert_eq!(entry.last_period, Some(period()));
        assert_eq!(entry.updated_at, Some(now()));
    }

    #[test]
    fn test_stale_commit_rejected() {
        let id = Uuid::new_v4();
        let mut ledger = AdvanceLedger::new();
        ledger.open(id, AdvanceState::new(Money::from_major(1_000), Money::ZERO).unwrap()).unwrap();

        let next = AdvanceState::new(Money::from_major(1_000), Money::from_major(400)).unwrap();
        ledger.commit(id, 0, next, UnitsByFormat::new(), period(), now()).unwrap();

        // a second run that read version 0 must not recoup again
        let err = ledger.commit(id, 0, next, UnitsByFormat::new(), period(), now()).unwrap_err();
        assert_eq!(
            err,
            EngineError::StaleAdvanceState { contract_id: id, expected: 0, found: 1 }
        );
    }

    #[test]
    fn test_same_period_cannot_commit_twice() {
        let id = Uuid::new_v4();
        let mut ledger = AdvanceLedger::new();
        ledger.open(id, AdvanceState::new(Money::from_major(1_000), Money::ZERO).unwrap()).unwrap();

        let first = AdvanceState::new(Money::from_major(1_000), Money::from_major(400)).unwrap();
        ledger.commit(id, 0, first, UnitsByFormat::new(), period(), now()).unwrap();

        // a fresh snapshot does not make the period new again
        let second = AdvanceState::new(Money::from_major(1_000), Money::from_major(800)).unwrap();
        let err = ledger.commit(id, 1, second, UnitsByFormat::new(), period(), now()).unwrap_err();
        assert_eq!(
            err,
            EngineError::PeriodAlreadyCommitted { contract_id: id, period: period(), committed: period() }
        );
        assert_eq!(ledger.snapshot(&id).unwrap().advance, first);
        assert_eq!(ledger.snapshot(&id).unwrap().version, 1);
    }

    #[test]
    fn test_overlapping_period_rejected_and_next_period_accepted() {
        let id = Uuid::new_v4();
        let mut ledger = AdvanceLedger::new();
        ledger.open(id, AdvanceState::none()).unwrap();
        ledger.commit(id, 0, AdvanceState::none(), UnitsByFormat::new(), period(), now()).unwrap();

        let overlapping = Period::new(
            NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        )
        .unwrap();
        let err = ledger.commit(id, 1, AdvanceState::none(), UnitsByFormat::new(), overlapping, now()).unwrap_err();
        assert!(matches!(err, EngineError::PeriodAlreadyCommitted { .. }));

        let next = Period::new(
            NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        )
        .unwrap();
        assert_eq!(ledger.commit(id, 1, AdvanceState::none(), UnitsByFormat::new(), next, now()).unwrap(), 2);
    }

    #[test]
    fn test_recoupment_cannot_decrease() {
        let id = Uuid::new_v4();
        let mut ledger = AdvanceLedger::new();
        ledger.open(id, AdvanceState::new(Money::from_major(1_000), Money::from_major(500)).unwrap()).unwrap();

        let lower = AdvanceState::new(Money::from_major(1_000), Money::from_major(100)).unwrap();
        let err = ledger.commit(id, 0, lower, UnitsByFormat::new(), period(), now()).unwrap_err();
        assert!(matches!(err, EngineError::NonMonotonicRecoupment { .. }));
    }

    #[test]
    fn test_unknown_contract() {
        let ledger = AdvanceLedger::new();
        assert!(matches!(
            ledger.snapshot(&Uuid::new_v4()),
            Err(EngineError::ContractNotFound { .. })
        ));
    }

    #[test]
    fn test_double_open_rejected() {
        let id = Uuid::new_v4();
        let mut ledger = AdvanceLedger::new();
        ledger.open(id, AdvanceState::none()).unwrap();
        assert!(ledger.open(id, AdvanceState::none()).is_err());
    }
}
