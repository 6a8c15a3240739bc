use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{EngineError, Result};
use crate::tiers::{Tier, TierSchedule};
use crate::types::{ContractId, Format};

/// what a tier rate is multiplied against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "basis", rename_all = "snake_case")]
pub enum RateBasis {
    /// the period's realized revenue, shared across tiers by unit count
    #[default]
    RealizedAveragePrice,
    /// a fixed list or reference price per format, times units in tier
    ReferencePrice { prices: BTreeMap<Format, Money> },
}

/// validated royalty terms of one contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractTerms {
    contract_id: ContractId,
    schedules: BTreeMap<Format, TierSchedule>,
    rate_basis: RateBasis,
}

impl ContractTerms {
    pub fn builder() -> ContractTermsBuilder {
        ContractTermsBuilder::new()
    }

    /// validate raw schedules into contract terms
    pub fn new(
        contract_id: ContractId,
        schedules: BTreeMap<Format, Vec<Tier>>,
        rate_basis: RateBasis,
    ) -> Result<Self> {
        if schedules.is_empty() {
            return Err(EngineError::ContractNotFound {
                message: format!("contract {} has no royalty terms", contract_id),
            });
        }

        let schedules = schedules
            .into_iter()
            .map(|(format, tiers)| -> Result<(Format, TierSchedule)> {
                let schedule = TierSchedule::new(&format, tiers)?;
                Ok((format, schedule))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        if let RateBasis::ReferencePrice { prices } = &rate_basis {
            for format in schedules.keys() {
                match prices.get(format) {
                    None => {
                        return Err(EngineError::InvalidConfiguration {
                            message: format!("no reference price for format {}", format),
                        });
                    }
                    Some(price) if price.is_negative() => {
                        return Err(EngineError::InvalidConfiguration {
                            message: format!("reference price {} for format {} is negative", price, format),
                        });
                    }
                    Some(_) => {}
                }
            }
        }

        Ok(Self { contract_id, schedules, rate_basis })
    }

    /// parse and validate terms from a json document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let document: ContractTermsDocument =
            serde_json::from_str(json).map_err(|e| EngineError::InvalidConfiguration {
                message: format!("unreadable contract terms: {}", e),
            })?;
        document.into_terms()
    }

    pub fn contract_id(&self) -> ContractId {
        self.contract_id
    }

    pub fn rate_basis(&self) -> &RateBasis {
        &self.rate_basis
    }

    pub fn schedules(&self) -> &BTreeMap<Format, TierSchedule> {
        &self.schedules
    }

    /// tier schedule for a format, `ContractNotFound` when the contract
    /// does not cover it
    pub fn schedule(&self, format: &Format) -> Result<&TierSchedule> {
        self.schedules.get(format).ok_or_else(|| EngineError::ContractNotFound {
            message: format!(
                "contract {} has no royalty terms for format {}",
                self.contract_id, format
            ),
        })
    }

    pub fn formats(&self) -> impl Iterator<Item = &Format> {
        self.schedules.keys()
    }
}

/// serialized shape of contract terms as stored by the contract system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractTermsDocument {
    pub contract_id: ContractId,
    #[serde(default)]
    pub rate_basis: RateBasis,
    pub formats: BTreeMap<Format, Vec<Tier>>,
}

impl ContractTermsDocument {
    pub fn into_terms(self) -> Result<ContractTerms> {
        ContractTerms::new(self.contract_id, self.formats, self.rate_basis)
    }
}

impl From<&ContractTerms> for ContractTermsDocument {
    fn from(terms: &ContractTerms) -> Self {
        Self {
            contract_id: terms.contract_id,
            rate_basis: terms.rate_basis.clone(),
            formats: terms
                .schedules
                .iter()
                .map(|(format, schedule)| (format.clone(), schedule.tiers().to_vec()))
                .collect(),
        }
    }
}

pub struct ContractTermsBuilder {
    contract_id: Option<ContractId>,
    schedules: BTreeMap<Format, Vec<Tier>>,
    reference_prices: BTreeMap<Format, Money>,
    use_reference_price: bool,
}

impl ContractTermsBuilder {
    pub fn new() -> Self {
        Self {
            contract_id: None,
            schedules: BTreeMap::new(),
            reference_prices: BTreeMap::new(),
            use_reference_price: false,
        }
    }

    pub fn contract_id(mut self, id: ContractId) -> Self {
        self.contract_id = Some(id);
        self
    }

    pub fn format(mut self, format: Format, tiers: Vec<Tier>) -> Self {
        self.schedules.insert(format, tiers);
        self
    }

    /// switch the contract to reference-price royalties and set the price
    /// for one format
    pub fn reference_price(mut self, format: Format, price: Money) -> Self {
        self.use_reference_price = true;
        self.reference_prices.insert(format, price);
        self
    }

    /// build terms, generating a contract id if none was given
    pub fn build(self) -> Result<ContractTerms> {
        let rate_basis = if self.use_reference_price {
            RateBasis::ReferencePrice { prices: self.reference_prices }
        } else {
            RateBasis::RealizedAveragePrice
        };
        ContractTerms::new(
            self.contract_id.unwrap_or_else(Uuid::new_v4),
            self.schedules,
            rate_basis,
        )
    }
}

impl Default for ContractTermsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
