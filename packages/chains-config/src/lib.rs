//! Data model of the per-environment chains info file and the store that persists it.
//!
//! The aggregate file (`<env>.json`) is the single source of truth for every chain's
//! configuration and deployed contract records. Fragments (`<env>-<chain>.json`) only
//! exist while a parallel run is in flight and are merged back into the aggregate file.

mod address;
mod chain;
mod contract;
mod error;
mod gas;
mod store;

pub use chain::{ChainConfig, ChainStatus, EVM_CHAIN_TYPE};
pub use contract::{ContractRecord, DeployMethod};
pub use error::Error;
pub use gas::RawGasOptions;
pub use store::{ChainsInfo, Fragments, Store};
