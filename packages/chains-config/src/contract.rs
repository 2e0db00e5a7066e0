use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use ethers_core::types::{Address, H256};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;
use crate::gas::RawGasOptions;

/// Strategy used to derive the address of a deployed contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployMethod {
    /// Sender and nonce
    Create,
    /// Factory, sender-mixed salt and init code hash
    Create2,
    /// Factory and sender-mixed salt only, via an intermediate proxy
    Create3,
}

impl DeployMethod {
    pub fn uses_factory(&self) -> bool {
        !matches!(self, DeployMethod::Create)
    }
}

impl Display for DeployMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DeployMethod::Create => write!(f, "create"),
            DeployMethod::Create2 => write!(f, "create2"),
            DeployMethod::Create3 => write!(f, "create3"),
        }
    }
}

impl FromStr for DeployMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" => Ok(DeployMethod::Create),
            "create2" => Ok(DeployMethod::Create2),
            "create3" => Ok(DeployMethod::Create3),
            other => Err(Error::UnsupportedMethod(other.to_string())),
        }
    }
}

/// Metadata of one deployed contract instance on one chain.
///
/// Once `address` is set it is treated as the truth for that chain. Deployment code only fills an
/// empty record; it never replaces a populated address.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractRecord {
    #[serde(
        default,
        with = "crate::address",
        skip_serializing_if = "Option::is_none"
    )]
    pub address: Option<Address>,
    #[serde(
        default,
        with = "crate::address",
        skip_serializing_if = "Option::is_none"
    )]
    pub deployer: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_method: Option<DeployMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codehash: Option<H256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predeploy_codehash: Option<H256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_options: Option<RawGasOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_gas_options: Option<RawGasOptions>,
    /// Contract specific settings (owner, signers, governance chain, ...), kept verbatim
    #[serde(flatten)]
    pub settings: Map<String, Value>,
}

impl ContractRecord {
    pub fn is_deployed(&self) -> bool {
        self.address.is_some()
    }

    pub fn setting(&self, key: &str) -> Option<&Value> {
        self.settings.get(key)
    }

    pub fn set_setting(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.settings.insert(key.into(), value.into());
    }

    /// Overlays caller supplied settings on top of the stored ones.
    pub fn merge_settings(&mut self, overrides: Map<String, Value>) {
        self.settings.extend(overrides);
    }
}
