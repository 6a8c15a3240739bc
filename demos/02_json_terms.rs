/// json terms - contract terms parsed once at the boundary
use royalty_engine_rs::chrono::NaiveDate;
use royalty_engine_rs::{calculate, AdvanceState, ContractTerms, Format, Money, NetSalesByFormat, Period, UnitsByFormat};

const TERMS: &str = r#"{
    "contract_id": "0b7f6a52-8f0e-4b8e-9d53-3f1c9a2e7d10",
    "rate_basis": {
        "basis": "reference_price",
        "prices": { "paperback": "16.99", "audiobook": "24.00" }
    },
    "formats": {
        "paperback": [
            { "from_units": 0, "to_units": 10000, "rate": "0.075" },
            { "from_units": 10000, "to_units": null, "rate": "0.10" }
        ],
        "audiobook": [
            { "from_units": 0, "to_units": null, "rate": "0.20" }
        ]
    }
}"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let terms = ContractTerms::from_json_str(TERMS)?;

    let period = Period::new(
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
    )?;
    let sales = vec![
        NetSalesByFormat::new(Format::Paperback, 2_600, 140, Money::from_major(30_000))?,
        NetSalesByFormat::new(Format::Audiobook, 800, 12, Money::from_major(11_000))?,
    ];
    let mut cumulative = UnitsByFormat::new();
    cumulative.insert(Format::Paperback, 9_000);

    let calc = calculate(&terms, &AdvanceState::none(), &sales, &cumulative, &period)?;
    for format in &calc.per_format {
        println!("{}: {}", format.format, format.format_royalty_total);
        for row in &format.tier_breakdown {
            println!("  tier {} {} units @ {} = {}", row.tier_index, row.units_in_tier, row.rate, row.royalty_amount);
        }
    }
    println!("total payable: {}", calc.net_payable);
    Ok(())
}
