pub mod advance;
pub mod calculation;
pub mod config;
pub mod decimal;
pub mod engine;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod royalty;
pub mod sales;
pub mod statement;
pub mod tiers;
pub mod types;

// re-export key types
pub use advance::{AdvanceRecoupmentTracker, AdvanceState, RecoupmentOutcome};
pub use calculation::{CalculationAssembler, RoyaltyCalculation};
pub use config::{ContractTerms, ContractTermsBuilder, ContractTermsDocument, RateBasis};
pub use decimal::{Money, Rate};
pub use engine::calculate;
pub use errors::{EngineError, Result};
pub use events::{Event, EventStore};
pub use ledger::{AdvanceLedger, LedgerEntry};
pub use royalty::{FormatRoyalty, RoyaltyCalculator, TierBreakdown};
pub use sales::{NetSalesAggregator, NetSalesByFormat, SaleKind, SaleRecord};
pub use statement::{RunMode, StatementRun, StatementRunner};
pub use tiers::{Tier, TierAllocation, TierSchedule};
pub use types::{ContractId, Format, Period, Units, UnitsByFormat};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
