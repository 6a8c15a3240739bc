use chrono::{DateTime, Utc};
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};

use crate::advance::AdvanceState;
use crate::calculation::RoyaltyCalculation;
use crate::config::ContractTerms;
use crate::engine::calculate;
use crate::errors::Result;
use crate::events::{Event, EventStore};
use crate::ledger::AdvanceLedger;
use crate::sales::NetSalesByFormat;
use crate::types::{Period, UnitsByFormat};

/// whether a statement run writes its outcome back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunMode {
    /// real statement generation, persisted to the ledger
    Committing,
    /// inspection only, the ledger is never written
    DryRun,
}

/// outcome of one statement run
#[derive(Debug, Clone)]
pub struct StatementRun {
    pub mode: RunMode,
    pub calculation: RoyaltyCalculation,
    pub advance_after: AdvanceState,
    pub cumulative_units_after: UnitsByFormat,
    /// ledger version written by a committing run
    pub committed_version: Option<u64>,
    pub generated_at: DateTime<Utc>,
    pub events: Vec<Event>,
}

/// wraps `calculate` for statement generation.
///
/// Both modes run the identical calculation; the only difference is
/// whether the next advance snapshot is committed to the ledger.
pub struct StatementRunner<'a> {
    time: &'a SafeTimeProvider,
}

impl<'a> StatementRunner<'a> {
    pub fn new(time: &'a SafeTimeProvider) -> Self {
        Self { time }
    }

    /// calculate and derive next-period state without writing anything
    pub fn prepare(
        &self,
        mode: RunMode,
        terms: &ContractTerms,
        advance: &AdvanceState,
        net_sales: &[NetSalesByFormat],
        cumulative_units: &UnitsByFormat,
        period: &Period,
    ) -> Result<StatementRun> {
        let calculation = calculate(terms, advance, net_sales, cumulative_units, period)?;
        let advance_after = calculation.advance_after(advance)?;
        let cumulative_units_after = calculation.cumulative_units_after(cumulative_units)?;
        let generated_at = self.time.now();

        let mut events = EventStore::new();
        record_events(&mut events, mode, &calculation, generated_at);

        Ok(StatementRun {
            mode,
            calculation,
            advance_after,
            cumulative_units_after,
            committed_version: None,
            generated_at,
            events: events.take_events(),
        })
    }

    /// run against the ledger's current snapshot without changing it
    pub fn dry_run(
        &self,
        ledger: &AdvanceLedger,
        terms: &ContractTerms,
        net_sales: &[NetSalesByFormat],
        period: &Period,
    ) -> Result<StatementRun> {
        let entry = ledger.snapshot(&terms.contract_id())?;
        let mut run = self.prepare(
            RunMode::DryRun,
            terms,
            &entry.advance,
            net_sales,
            &entry.cumulative_units,
            period,
        )?;
        run.events.push(Event::DryRunCompleted {
            contract_id: terms.contract_id(),
            period: *period,
            timestamp: run.generated_at,
        });
        Ok(run)
    }

    /// run against the ledger's current snapshot and commit the result.
    ///
    /// The commit names the version that was read, so a concurrent run that
    /// committed first makes this one fail with `StaleAdvanceState`. A period
    /// that does not start after the last committed one fails with
    /// `PeriodAlreadyCommitted`.
    pub fn commit(
        &self,
        ledger: &mut AdvanceLedger,
        terms: &ContractTerms,
        net_sales: &[NetSalesByFormat],
        period: &Period,
    ) -> Result<StatementRun> {
        let contract_id = terms.contract_id();
        let entry = ledger.snapshot(&contract_id)?;
        let mut run = self.prepare(
            RunMode::Committing,
            terms,
            &entry.advance,
            net_sales,
            &entry.cumulative_units,
            period,
        )?;

        let version = ledger.commit(
            contract_id,
            entry.version,
            run.advance_after,
            run.cumulative_units_after.clone(),
            *period,
            run.generated_at,
        )?;

        tracing::info!(
            %contract_id,
            period = %period,
            version,
            payable = %run.calculation.net_payable,
            "committed royalty statement"
        );

        run.committed_version = Some(version);
        run.events.push(Event::StatementCommitted {
            contract_id,
            period: *period,
            version,
            timestamp: run.generated_at,
        });
        Ok(run)
    }

    pub fn run(
        &self,
        mode: RunMode,
        ledger: &mut AdvanceLedger,
        terms: &ContractTerms,
        net_sales: &[NetSalesByFormat],
        period: &Period,
    ) -> Result<StatementRun> {
        match mode {
            RunMode::Committing => self.commit(ledger, terms, net_sales, period),
            RunMode::DryRun => self.dry_run(ledger, terms, net_sales, period),
        }
    }
}

fn record_events(
    events: &mut EventStore,
    mode: RunMode,
    calculation: &RoyaltyCalculation,
    timestamp: DateTime<Utc>,
) {
    let contract_id = calculation.contract_id;

    events.emit(Event::CalculationCompleted {
        contract_id,
        period: calculation.period,
        mode,
        total_royalty_earned: calculation.total_royalty_earned,
        net_payable: calculation.net_payable,
        timestamp,
    });

    // the first row sits in the tier the period started in; every later
    // row is a tier reached during this period
    for format in &calculation.per_format {
        for row in format.tier_breakdown.iter().skip(1) {
            events.emit(Event::TierThresholdCrossed {
                contract_id,
                format: format.format.clone(),
                tier_index: row.tier_index,
                rate: row.rate,
                timestamp,
            });
        }
    }

    if !calculation.advance_recouped_this_period.is_zero() {
        events.emit(Event::AdvanceRecouped {
            contract_id,
            amount: calculation.advance_recouped_this_period,
            remaining: calculation.advance_remaining_after,
            timestamp,
        });
        if calculation.advance_remaining_after.is_zero() {
            events.emit(Event::AdvanceFullyRecouped {
                contract_id,
                period: calculation.period,
                timestamp,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::{Money, Rate};
    use crate::errors::EngineError;
    use crate::tiers::Tier;
    use crate::types::Format;
    use chrono::{Duration, NaiveDate, TimeZone};
    use hourglass_rs::TimeSource;
    use rust_decimal_macros::dec;

    fn half(year: i32, first: bool) -> Period {
        let (start, end) = if first {
            (NaiveDate::from_ymd_opt(year, 1, 1), NaiveDate::from_ymd_opt(year, 6, 30))
        } else {
            (NaiveDate::from_ymd_opt(year, 7, 1), NaiveDate::from_ymd_opt(year, 12, 31))
        };
        Period::new(start.unwrap(), end.unwrap()).unwrap()
    }

    fn terms() -> ContractTerms {
        ContractTerms::builder()
            .format(
                Format::Physical,
                vec![
                    Tier::bounded(0, 5_000, Rate::from_percentage(10)),
                    Tier::unbounded(5_000, Rate::from_percentage(12)),
                ],
            )
            .build()
            .unwrap()
    }

    fn physical(net_units: u64, revenue: Money) -> Vec<NetSalesByFormat> {
        vec![NetSalesByFormat::new(Format::Physical, net_units, 0, revenue).unwrap()]
    }

    fn ledger_for(terms: &ContractTerms, advance: Money) -> AdvanceLedger {
        let mut ledger = AdvanceLedger::new();
        ledger
            .open(terms.contract_id(), AdvanceState::new(advance, Money::ZERO).unwrap())
            .unwrap();
        ledger
    }

    #[test]
    fn test_dry_run_and_commit_calculate_identically() {
        let time = SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2024, 7, 15, 0, 0, 0).unwrap()
        ));
        let terms = terms();
        let mut ledger = ledger_for(&terms, Money::from_major(2_000));
        let sales = physical(4_000, Money::from_major(100_000));
        let runner = StatementRunner::new(&time);

        let dry = runner.dry_run(&ledger, &terms, &sales, &half(2024, true)).unwrap();
        // dry run leaves the ledger untouched
        assert_eq!(ledger.snapshot(&terms.contract_id()).unwrap().version, 0);

        let committed = runner.commit(&mut ledger, &terms, &sales, &half(2024, true)).unwrap();
        assert_eq!(dry.calculation, committed.calculation);
        assert_eq!(dry.committed_version, None);
        assert_eq!(committed.committed_version, Some(1));

        let entry = ledger.snapshot(&terms.contract_id()).unwrap();
        assert_eq!(entry.advance.recouped_to_date, Money::from_major(2_000));
        assert_eq!(entry.cumulative_units[&Format::Physical], 4_000);
    }

    #[test]
    fn test_multi_period_recoupment_is_monotonic() {
        let time = SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2024, 7, 15, 0, 0, 0).unwrap()
        ));
        let control = time.test_control().unwrap();
        let terms = terms();
        let mut ledger = ledger_for(&terms, Money::from_decimal(dec!(5000.00)));
        let runner = StatementRunner::new(&time);

        let periods = [half(2024, true), half(2024, false), half(2025, true)];
        // 4,800 units at $10 then 950 straddling the boundary then 1,000 more
        let sales = [
            physical(4_800, Money::from_major(48_000)),
            physical(950, Money::from_decimal(dec!(23750.00))),
            physical(1_000, Money::from_major(10_000)),
        ];

        let mut previous = Money::ZERO;
        let mut runs = Vec::new();
        for (period, sales) in periods.iter().zip(sales.iter()) {
            let run = runner.commit(&mut ledger, &terms, sales, period).unwrap();
            run.calculation.verify().unwrap();
            assert!(run.advance_after.recouped_to_date >= previous);
            previous = run.advance_after.recouped_to_date;
            runs.push(run);
            control.advance(Duration::days(182));
        }

        // period 1 earns 4,800.00, all recouped
        assert_eq!(runs[0].calculation.total_royalty_earned, Money::from_major(4_800));
        assert_eq!(runs[0].calculation.net_payable, Money::ZERO);
        // period 2 is scenario a: 2,750.00 earned, last 200.00 of advance recouped
        assert_eq!(runs[1].calculation.total_royalty_earned, Money::from_major(2_750));
        assert_eq!(runs[1].calculation.advance_recouped_this_period, Money::from_major(200));
        assert_eq!(runs[1].calculation.net_payable, Money::from_major(2_550));
        // period 3 is fully in the top tier with nothing left to recoup
        assert_eq!(runs[2].calculation.total_royalty_earned, Money::from_major(1_200));
        assert_eq!(runs[2].calculation.advance_recouped_this_period, Money::ZERO);
        assert_eq!(runs[2].calculation.net_payable, Money::from_major(1_200));

        let entry = ledger.snapshot(&terms.contract_id()).unwrap();
        assert_eq!(entry.version, 3);
        assert_eq!(entry.cumulative_units[&Format::Physical], 6_750);
        assert!(entry.advance.is_fully_recouped());
        assert!(runs[2].generated_at > runs[0].generated_at);
    }

    #[test]
    fn test_events_describe_the_run() {
        let time = SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2024, 7, 15, 0, 0, 0).unwrap()
        ));
        let terms = terms();
        let mut ledger = AdvanceLedger::new();
        ledger
            .open(
                terms.contract_id(),
                AdvanceState::new(Money::from_major(5_000), Money::from_major(4_700)).unwrap(),
            )
            .unwrap();
        ledger
            .commit(
                terms.contract_id(),
                0,
                AdvanceState::new(Money::from_major(5_000), Money::from_major(4_700)).unwrap(),
                [(Format::Physical, 4_800)].into_iter().collect(),
                half(2023, false),
                time.now(),
            )
            .unwrap();

        let run = StatementRunner::new(&time)
            .commit(&mut ledger, &terms, &physical(950, Money::from_decimal(dec!(23750.00))), &half(2024, true))
            .unwrap();

        assert!(matches!(run.events[0], Event::CalculationCompleted { mode: RunMode::Committing, .. }));
        assert!(run.events.iter().any(|e| matches!(
            e,
            Event::TierThresholdCrossed { tier_index: 1, format: Format::Physical, .. }
        )));
        assert!(run.events.iter().any(|e| matches!(e, Event::AdvanceFullyRecouped { .. })));
        assert!(matches!(run.events.last(), Some(Event::StatementCommitted { version: 2, .. })));
    }

    #[test]
    fn test_threshold_event_for_lower_rate_tier() {
        let time = SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2024, 7, 15, 0, 0, 0).unwrap()
        ));
        // a de-escalating schedule still crosses into its next tier
        let terms = ContractTerms::builder()
            .format(
                Format::Audiobook,
                vec![
                    Tier::bounded(0, 100, Rate::from_percentage(25)),
                    Tier::unbounded(100, Rate::from_percentage(20)),
                ],
            )
            .build()
            .unwrap();
        let ledger = ledger_for(&terms, Money::ZERO);
        let sales = vec![NetSalesByFormat::new(Format::Audiobook, 150, 0, Money::from_major(1_500)).unwrap()];

        let run = StatementRunner::new(&time).dry_run(&ledger, &terms, &sales, &half(2024, true)).unwrap();
        let crossed: Vec<&Event> = run
            .events
            .iter()
            .filter(|e| matches!(e, Event::TierThresholdCrossed { .. }))
            .collect();
        assert_eq!(crossed.len(), 1);
        assert!(matches!(
            crossed[0],
            Event::TierThresholdCrossed { format: Format::Audiobook, tier_index: 1, rate, .. }
                if *rate == Rate::from_percentage(20)
        ));
    }

    #[test]
    fn test_stale_snapshot_cannot_recoup_twice() {
        let time = SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2024, 7, 15, 0, 0, 0).unwrap()
        ));
        let terms = terms();
        let mut ledger = ledger_for(&terms, Money::from_major(1_000));
        let runner = StatementRunner::new(&time);
        let sales = physical(100, Money::from_major(2_000));

        // two workers read the same snapshot
        let stale = ledger.snapshot(&terms.contract_id()).unwrap();
        runner.commit(&mut ledger, &terms, &sales, &half(2024, true)).unwrap();

        let late = runner
            .prepare(RunMode::Committing, &terms, &stale.advance, &sales, &stale.cumulative_units, &half(2024, true))
            .unwrap();
        let err = ledger
            .commit(
                terms.contract_id(),
                stale.version,
                late.advance_after,
                late.cumulative_units_after,
                half(2024, true),
                late.generated_at,
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::StaleAdvanceState { .. }));
    }

    #[test]
    fn test_recommitting_a_period_is_rejected() {
        let time = SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2024, 7, 15, 0, 0, 0).unwrap()
        ));
        let terms = terms();
        let mut ledger = ledger_for(&terms, Money::from_major(1_000));
        let runner = StatementRunner::new(&time);
        let sales = physical(100, Money::from_major(2_000));

        runner.commit(&mut ledger, &terms, &sales, &half(2024, true)).unwrap();
        // second run reads the fresh snapshot, so only the period guard stops it
        let err = runner.commit(&mut ledger, &terms, &sales, &half(2024, true)).unwrap_err();
        assert!(matches!(err, EngineError::PeriodAlreadyCommitted { .. }));

        let entry = ledger.snapshot(&terms.contract_id()).unwrap();
        assert_eq!(entry.version, 1);
        assert_eq!(entry.advance.recouped_to_date, Money::from_major(200));
        assert_eq!(entry.cumulative_units[&Format::Physical], 100);
    }

    #[test]
    fn test_failed_run_writes_nothing() {
        let time = SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2024, 7, 15, 0, 0, 0).unwrap()
        ));
        let terms = terms();
        let mut ledger = ledger_for(&terms, Money::from_major(1_000));
        let bad = vec![NetSalesByFormat::new(Format::Ebook, 10, 0, Money::from_major(50)).unwrap()];

        let err = StatementRunner::new(&time)
            .run(RunMode::Committing, &mut ledger, &terms, &bad, &half(2024, true))
            .unwrap_err();
        assert!(matches!(err, EngineError::ContractNotFound { .. }));
        assert_eq!(ledger.snapshot(&terms.contract_id()).unwrap().version, 0);
    }
}
