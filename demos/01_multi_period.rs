/// multi period - dry runs and committed statements against a ledger
use royalty_engine_rs::chrono::{Duration, NaiveDate, TimeZone, Utc};
use royalty_engine_rs::{
    AdvanceLedger, AdvanceState, ContractTerms, Format, Money, NetSalesByFormat, Period, Rate,
    SafeTimeProvider, StatementRunner, TierSchedule, TimeSource,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 7, 15, 0, 0, 0).unwrap()
    ));
    let controller = time.test_control().unwrap();

    let hardcover = TierSchedule::escalating(
        &Format::Hardcover,
        Rate::from_percentage(10),
        &[(5_000, Rate::from_bps(1_250)), (10_000, Rate::from_percentage(15))],
    )?;
    let terms = ContractTerms::builder()
        .format(Format::Hardcover, hardcover.tiers().to_vec())
        .format(Format::Ebook, TierSchedule::flat(Rate::from_percentage(25)).tiers().to_vec())
        .build()?;

    let mut ledger = AdvanceLedger::new();
    ledger.open(terms.contract_id(), AdvanceState::new(Money::from_major(15_000), Money::ZERO)?)?;

    let runner = StatementRunner::new(&time);
    let periods = [
        (NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(), 3_200_u64, 2_100_u64),
        (NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(), NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(), 4_100, 1_300),
        (NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(), NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(), 3_900, 900),
    ];

    for (start, end, hardcover_units, ebook_units) in periods {
        let period = Period::new(start, end)?;
        let sales = vec![
            NetSalesByFormat::new(Format::Hardcover, hardcover_units, 0, Money::from_major(hardcover_units as i64 * 27))?,
            NetSalesByFormat::new(Format::Ebook, ebook_units, 0, Money::from_major(ebook_units as i64 * 12))?,
        ];

        // preview first, then commit the same calculation
        let preview = runner.dry_run(&ledger, &terms, &sales, &period)?;
        let run = runner.commit(&mut ledger, &terms, &sales, &period)?;
        assert_eq!(preview.calculation, run.calculation);

        println!(
            "{}: earned {} recouped {} payable {} (advance left {})",
            period,
            run.calculation.total_royalty_earned,
            run.calculation.advance_recouped_this_period,
            run.calculation.net_payable,
            run.calculation.advance_remaining_after,
        );
        for event in &run.events {
            println!("  {:?}", event);
        }

        controller.advance(Duration::days(182));
    }

    Ok(())
}
