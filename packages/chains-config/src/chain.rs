use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::contract::ContractRecord;
use crate::gas::RawGasOptions;

pub const EVM_CHAIN_TYPE: &str = "evm";

const DEFAULT_CONFIRMATIONS: usize = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainStatus {
    #[default]
    Active,
    Deactive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfig {
    pub name: String,
    pub axelar_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    pub rpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ChainStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmations: Option<usize>,
    /// Milliseconds to wait for a transaction to be confirmed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_options: Option<RawGasOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_gas_options: Option<RawGasOptions>,
    #[serde(default)]
    pub contracts: BTreeMap<String, ContractRecord>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl ChainConfig {
    pub fn is_evm(&self) -> bool {
        self.chain_type
            .as_deref()
            .map_or(true, |chain_type| chain_type.eq_ignore_ascii_case(EVM_CHAIN_TYPE))
    }

    pub fn is_active(&self) -> bool {
        self.status.unwrap_or_default() == ChainStatus::Active
    }

    pub fn confirmations(&self) -> usize {
        self.confirmations.unwrap_or(DEFAULT_CONFIRMATIONS)
    }

    /// Time to wait for a transaction to be confirmed, falling back to the given default.
    pub fn tx_timeout_or(&self, default: Duration) -> Duration {
        self.tx_timeout.map_or(default, Duration::from_millis)
    }

    pub fn contract(&self, name: &str) -> Option<&ContractRecord> {
        self.contracts.get(name)
    }

    /// Returns the record for the given contract, creating an empty one if it doesn't exist yet.
    pub fn contract_mut(&mut self, name: &str) -> &mut ContractRecord {
        self.contracts.entry(name.to_string()).or_default()
    }
}
