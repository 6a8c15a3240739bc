use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::statement::RunMode;
use crate::types::{ContractId, Format, Period};

/// events emitted by statement runs for downstream notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    CalculationCompleted {
        contract_id: ContractId,
        period: Period,
        mode: RunMode,
        total_royalty_earned: Money,
        net_payable: Money,
        timestamp: DateTime<Utc>,
    },
    /// a format's sales crossed into the next tier during the period
    TierThresholdCrossed {
        contract_id: ContractId,
        format: Format,
        tier_index: usize,
        rate: Rate,
        timestamp: DateTime<Utc>,
    },
    AdvanceRecouped {
        contract_id: ContractId,
        amount: Money,
        remaining: Money,
        timestamp: DateTime<Utc>,
    },
    AdvanceFullyRecouped {
        contract_id: ContractId,
        period: Period,
        timestamp: DateTime<Utc>,
    },
    StatementCommitted {
        contract_id: ContractId,
        period: Period,
        version: u64,
        timestamp: DateTime<Utc>,
    },
    DryRunCompleted {
        contract_id: ContractId,
        period: Period,
        timestamp: DateTime<Utc>,
    },
}

/// event store for collecting events during runs
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
