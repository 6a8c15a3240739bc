use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::{EngineError, Result};

/// unique identifier for a contract
pub type ContractId = Uuid;

/// unit counts are whole copies
pub type Units = u64;

/// lifetime units per format, keyed in a stable order
pub type UnitsByFormat = BTreeMap<Format, Units>;

/// product format a contract tiers independently
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Format {
    Physical,
    Hardcover,
    Paperback,
    Ebook,
    Audiobook,
    Other(String),
}

impl Format {
    /// format from a free-form name, trimmed and lowercased, mapping the
    /// named formats to their variants
    pub fn other(name: &str) -> Format {
        match name.parse() {
            Ok(format) => format,
            Err(never) => match never {},
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Format::Physical => "physical",
            Format::Hardcover => "hardcover",
            Format::Paperback => "paperback",
            Format::Ebook => "ebook",
            Format::Audiobook => "audiobook",
            Format::Other(name) => name,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Other(name) => f.write_str(&name.trim().to_ascii_lowercase()),
            named => f.write_str(named.as_str()),
        }
    }
}

impl FromStr for Format {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Ok(match normalized.as_str() {
            "physical" => Format::Physical,
            "hardcover" => Format::Hardcover,
            "paperback" => Format::Paperback,
            "ebook" => Format::Ebook,
            "audiobook" => Format::Audiobook,
            _ => Format::Other(normalized),
        })
    }
}

impl From<String> for Format {
    fn from(s: String) -> Self {
        Format::other(&s)
    }
}

// written in the same normalized form that parsing produces
impl From<Format> for String {
    fn from(format: Format) -> Self {
        format.to_string()
    }
}

/// statement period, both ends inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        let period = Self { start, end };
        period.validate()?;
        Ok(period)
    }

    /// fields are public, so anything built without `new` is re-checked here
    pub fn validate(&self) -> Result<()> {
        if self.start > self.end {
            return Err(EngineError::InvalidPeriod {
                message: format!("start {} is after end {}", self.start, self.end),
            });
        }
        Ok(())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}
