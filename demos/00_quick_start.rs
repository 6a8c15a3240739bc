/// quick start - one contract, one period
use royalty_engine_rs::chrono::NaiveDate;
use royalty_engine_rs::{
    calculate, AdvanceState, ContractTerms, Format, Money, NetSalesAggregator, Period, Rate,
    SaleRecord, Tier, UnitsByFormat,
};
use rust_decimal_macros::dec;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // 10% up to 5,000 copies, 12% after
    let terms = ContractTerms::builder()
        .format(
            Format::Physical,
            vec![
                Tier::bounded(0, 5_000, Rate::from_percentage(10)),
                Tier::unbounded(5_000, Rate::from_percentage(12)),
            ],
        )
        .build()?;

    let period = Period::new(
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
    )?;

    let records = vec![
        SaleRecord::sale(Format::Physical, 1_000, Money::from_decimal(dec!(24750.00)), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
        SaleRecord::sale_return(Format::Physical, 50, Money::from_decimal(dec!(1000.00)), NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()),
    ];
    let net_sales = NetSalesAggregator::new(period).aggregate(&records)?;

    let mut cumulative = UnitsByFormat::new();
    cumulative.insert(Format::Physical, 4_800);

    let advance = AdvanceState::new(Money::from_major(5_000), Money::from_major(4_700))?;

    let calc = calculate(&terms, &advance, &net_sales, &cumulative, &period)?;
    calc.verify()?;

    println!("{}", calc.to_json_pretty()?);
    Ok(())
}
