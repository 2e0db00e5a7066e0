//! Serde helpers that keep addresses EIP-55 checksummed in the chains info file.

use std::str::FromStr;

use ethers_core::types::Address;
use ethers_core::utils::to_checksum;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S>(address: &Option<Address>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match address {
        Some(address) => serializer.serialize_str(&to_checksum(address, None)),
        None => serializer.serialize_none(),
    }
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Address>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|address| Address::from_str(address.trim()).map_err(D::Error::custom))
        .transpose()
}
