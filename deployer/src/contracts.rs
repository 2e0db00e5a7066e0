//! Registry of the contracts the deployer knows how to construct.

use std::str::FromStr;

use chains_config::{ChainConfig, ContractRecord, DeployMethod};
use error_stack::{report, Result};
use ethers::abi::{encode, Token};
use ethers::types::{Address, Bytes, U256};
use ethers::utils::{id, keccak256, to_checksum};
use serde_json::Value;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use thiserror::Error;

const AXELAR_GATEWAY: &str = "AxelarGateway";
const AXELAR_GAS_SERVICE: &str = "AxelarGasService";
const CREATE2_DEPLOYER: &str = "Create2Deployer";

const DEFAULT_GOVERNANCE_CHAIN: &str = "Axelarnet";
const DEFAULT_GOVERNANCE_ADDRESS: &str = "axelar10d07y265gmmuvt4z0w9aw880jnsr700j7v9daj";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("missing {0} address in the chain info")]
    MissingDependency(String),
    #[error("missing or invalid {contract}.{setting} in the chain info")]
    InvalidSetting { contract: String, setting: String },
    #[error("no deployer contract for {0} in the chain info")]
    MissingFactory(DeployMethod),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr)]
pub enum ContractKind {
    ConstAddressDeployer,
    Create3Deployer,
    Operators,
    Multisig,
    InterchainGovernance,
    AxelarServiceGovernance,
    InterchainProposalSender,
    TokenDeployer,
}

/// A read-only call whose result must match the contract's configuration after deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDeployCheck {
    pub description: String,
    pub calldata: Bytes,
    pub expected: Bytes,
}

impl PostDeployCheck {
    fn new(signature: &str, expected: Token) -> Self {
        PostDeployCheck {
            description: signature.trim_end_matches("()").to_string(),
            calldata: id(signature).to_vec().into(),
            expected: encode(&[expected]).into(),
        }
    }
}

impl ContractKind {
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// Builds the constructor arguments from the contract's record on `chain`. Defaults that are
    /// filled in are written back to the record so they end up in the chains info.
    pub fn constructor_args(
        &self,
        chain: &mut ChainConfig,
        wallet: Address,
    ) -> Result<Vec<Token>, Error> {
        match self {
            ContractKind::ConstAddressDeployer
            | ContractKind::Create3Deployer
            | ContractKind::TokenDeployer => Ok(vec![]),
            ContractKind::Operators => {
                let record = chain.contract_mut(self.name());
                if is_unset(record, "owner") {
                    record.set_setting("owner", to_checksum(&wallet, None));
                }
                let owner = self.address_setting(record, "owner")?;

                Ok(vec![Token::Address(owner)])
            }
            ContractKind::Multisig => {
                let record = chain.contract_mut(self.name());
                let signers = record
                    .setting("signers")
                    .and_then(Value::as_array)
                    .filter(|signers| !signers.is_empty())
                    .and_then(|signers| {
                        signers
                            .iter()
                            .map(|signer| signer.as_str().and_then(parse_address))
                            .collect::<Option<Vec<_>>>()
                    })
                    .ok_or_else(|| self.invalid_setting("signers"))?;
                let threshold = self.uint_setting(record, "threshold")?;

                Ok(vec![
                    Token::Array(signers.into_iter().map(Token::Address).collect()),
                    Token::Uint(threshold),
                ])
            }
            ContractKind::InterchainGovernance | ContractKind::AxelarServiceGovernance => {
                let gateway = dependency(chain, AXELAR_GATEWAY)?;

                let record = chain.contract_mut(self.name());
                let governance_chain =
                    self.string_setting_or(record, "governanceChain", DEFAULT_GOVERNANCE_CHAIN)?;
                let governance_address = self.string_setting_or(
                    record,
                    "governanceAddress",
                    DEFAULT_GOVERNANCE_ADDRESS,
                )?;
                let minimum_time_delay = self.uint_setting(record, "minimumTimeDelay")?;

                let mut args = vec![
                    Token::Address(gateway),
                    Token::String(governance_chain),
                    Token::String(governance_address),
                    Token::Uint(minimum_time_delay),
                ];

                if *self == ContractKind::AxelarServiceGovernance {
                    args.push(Token::Address(self.address_setting(record, "multisig")?));
                }

                Ok(args)
            }
            ContractKind::InterchainProposalSender => Ok(vec![
                Token::Address(dependency(chain, AXELAR_GATEWAY)?),
                Token::Address(dependency(chain, AXELAR_GAS_SERVICE)?),
            ]),
        }
    }

    /// Calls that verify the deployed contract was initialized with the recorded settings.
    pub fn post_deploy_checks(&self, record: &ContractRecord) -> Result<Vec<PostDeployCheck>, Error> {
        match self {
            ContractKind::Operators => Ok(vec![PostDeployCheck::new(
                "owner()",
                Token::Address(self.address_setting(record, "owner")?),
            )]),
            ContractKind::InterchainGovernance | ContractKind::AxelarServiceGovernance => {
                let governance_chain = self.string_setting(record, "governanceChain")?;
                let governance_address = self.string_setting(record, "governanceAddress")?;

                Ok(vec![
                    PostDeployCheck::new(
                        "governanceChain()",
                        Token::String(governance_chain.clone()),
                    ),
                    PostDeployCheck::new(
                        "governanceChainHash()",
                        Token::FixedBytes(keccak256(governance_chain).to_vec()),
                    ),
                    PostDeployCheck::new(
                        "governanceAddress()",
                        Token::String(governance_address.clone()),
                    ),
                    PostDeployCheck::new(
                        "governanceAddressHash()",
                        Token::FixedBytes(keccak256(governance_address).to_vec()),
                    ),
                    PostDeployCheck::new(
                        "minimumTimeLockDelay()",
                        Token::Uint(self.uint_setting(record, "minimumTimeDelay")?),
                    ),
                ])
            }
            ContractKind::ConstAddressDeployer
            | ContractKind::Create3Deployer
            | ContractKind::Multisig
            | ContractKind::InterchainProposalSender
            | ContractKind::TokenDeployer => Ok(vec![]),
        }
    }

    fn invalid_setting(&self, setting: &str) -> error_stack::Report<Error> {
        report!(Error::InvalidSetting {
            contract: self.name().to_string(),
            setting: setting.to_string(),
        })
    }

    fn address_setting(&self, record: &ContractRecord, key: &str) -> Result<Address, Error> {
        record
            .setting(key)
            .and_then(Value::as_str)
            .and_then(parse_address)
            .ok_or_else(|| self.invalid_setting(key))
    }

    fn uint_setting(&self, record: &ContractRecord, key: &str) -> Result<U256, Error> {
        record
            .setting(key)
            .and_then(Value::as_u64)
            .map(U256::from)
            .ok_or_else(|| self.invalid_setting(key))
    }

    fn string_setting(&self, record: &ContractRecord, key: &str) -> Result<String, Error> {
        record
            .setting(key)
            .and_then(Value::as_str)
            .filter(|value| !value.trim().is_empty())
            .map(str::to_string)
            .ok_or_else(|| self.invalid_setting(key))
    }

    fn string_setting_or(
        &self,
        record: &mut ContractRecord,
        key: &str,
        default: &str,
    ) -> Result<String, Error> {
        if is_unset(record, key) {
            record.set_setting(key, default);
        }

        self.string_setting(record, key)
    }
}

/// Resolves the factory contract used by `method` from the chain's records.
pub fn factory_address(chain: &ChainConfig, method: DeployMethod) -> Result<Option<Address>, Error> {
    let candidates: &[&str] = match method {
        DeployMethod::Create => return Ok(None),
        DeployMethod::Create2 => &[ContractKind::ConstAddressDeployer.name(), CREATE2_DEPLOYER],
        DeployMethod::Create3 => &[ContractKind::Create3Deployer.name()],
    };

    candidates
        .iter()
        .find_map(|name| chain.contract(name).and_then(|record| record.address))
        .map(Some)
        .ok_or_else(|| report!(Error::MissingFactory(method)))
}

fn dependency(chain: &ChainConfig, name: &str) -> Result<Address, Error> {
    chain
        .contract(name)
        .and_then(|record| record.address)
        .ok_or_else(|| report!(Error::MissingDependency(name.to_string())))
}

fn is_unset(record: &ContractRecord, key: &str) -> bool {
    match record.setting(key) {
        None | Some(Value::Null) => true,
        Some(Value::String(value)) => value.is_empty(),
        Some(_) => false,
    }
}

fn parse_address(s: &str) -> Option<Address> {
    Address::from_str(s.trim()).ok()
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chains_config::{ChainConfig, DeployMethod};
    use ethers::abi::{encode, Token};
    use ethers::types::{Address, U256};
    use ethers::utils::{id, keccak256};
    use serde_json::{json, Value};
    use strum::IntoEnumIterator;

    use super::{factory_address, ContractKind, Error};

    const GATEWAY: &str = "0x4F4495243837681061C4743b74B3eEdf548D56A5";
    const GAS_SERVICE: &str = "0x2d5d7d31F671F86C782533cc367F14109a082712";
    const WALLET: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    fn address(s: &str) -> Address {
        Address::from_str(s).unwrap()
    }

    fn chain(contracts: Value) -> ChainConfig {
        serde_json::from_value(json!({
            "name": "Ethereum",
            "axelarId": "Ethereum",
            "rpc": "http://localhost:8545",
            "contracts": contracts,
        }))
        .unwrap()
    }

    #[test]
    fn contract_names_should_round_trip() {
        for kind in ContractKind::iter() {
            assert_eq!(ContractKind::from_str(kind.name()).unwrap(), kind);
            assert_eq!(kind.to_string(), kind.name());
        }

        assert!(ContractKind::from_str("AxelarGateway").is_err());
    }

    #[test]
    fn factory_less_contracts_should_have_no_args() {
        let mut chain = chain(json!({}));

        for kind in [
            ContractKind::ConstAddressDeployer,
            ContractKind::Create3Deployer,
            ContractKind::TokenDeployer,
        ] {
            assert_eq!(kind.constructor_args(&mut chain, address(WALLET)).unwrap(), vec![]);
        }
    }

    #[test]
    fn operators_owner_should_default_to_the_wallet() {
        let mut chain = chain(json!({}));

        let args = ContractKind::Operators
            .constructor_args(&mut chain, address(WALLET))
            .unwrap();

        assert_eq!(args, vec![Token::Address(address(WALLET))]);
        assert_eq!(
            chain.contract("Operators").unwrap().setting("owner"),
            Some(&json!(WALLET))
        );

        let checks = ContractKind::Operators
            .post_deploy_checks(chain.contract("Operators").unwrap())
            .unwrap();
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].calldata.as_ref(), &id("owner()"));
        assert_eq!(
            checks[0].expected.as_ref(),
            encode(&[Token::Address(address(WALLET))]).as_slice()
        );
    }

    #[test]
    fn operators_should_reject_an_invalid_owner() {
        let mut chain = chain(json!({ "Operators": { "owner": "not an address" } }));

        let err = ContractKind::Operators
            .constructor_args(&mut chain, address(WALLET))
            .unwrap_err();

        assert_eq!(
            err.current_context(),
            &Error::InvalidSetting {
                contract: "Operators".to_string(),
                setting: "owner".to_string()
            }
        );
    }

    #[test]
    fn multisig_should_use_signers_and_threshold() {
        let mut chain = chain(json!({
            "Multisig": { "signers": [WALLET, GATEWAY], "threshold": 2 }
        }));

        let args = ContractKind::Multisig
            .constructor_args(&mut chain, address(WALLET))
            .unwrap();

        assert_eq!(
            args,
            vec![
                Token::Array(vec![
                    Token::Address(address(WALLET)),
                    Token::Address(address(GATEWAY))
                ]),
                Token::Uint(U256::from(2))
            ]
        );

        let mut missing_threshold = self::chain(json!({ "Multisig": { "signers": [WALLET] } }));
        assert!(ContractKind::Multisig
            .constructor_args(&mut missing_threshold, address(WALLET))
            .is_err());
    }

    #[test]
    fn governance_should_fill_in_defaults_and_require_the_gateway() {
        let mut without_gateway = chain(json!({
            "InterchainGovernance": { "minimumTimeDelay": 300 }
        }));
        assert_eq!(
            ContractKind::InterchainGovernance
                .constructor_args(&mut without_gateway, address(WALLET))
                .unwrap_err()
                .current_context(),
            &Error::MissingDependency("AxelarGateway".to_string())
        );

        let mut chain = chain(json!({
            "AxelarGateway": { "address": GATEWAY },
            "InterchainGovernance": { "minimumTimeDelay": 300 }
        }));
        let args = ContractKind::InterchainGovernance
            .constructor_args(&mut chain, address(WALLET))
            .unwrap();

        assert_eq!(
            args,
            vec![
                Token::Address(address(GATEWAY)),
                Token::String("Axelarnet".to_string()),
                Token::String("axelar10d07y265gmmuvt4z0w9aw880jnsr700j7v9daj".to_string()),
                Token::Uint(U256::from(300)),
            ]
        );

        let record = chain.contract("InterchainGovernance").unwrap();
        assert_eq!(record.setting("governanceChain"), Some(&json!("Axelarnet")));

        let checks = ContractKind::InterchainGovernance
            .post_deploy_checks(record)
            .unwrap();
        let descriptions: Vec<_> = checks.iter().map(|check| check.description.as_str()).collect();
        assert_eq!(
            descriptions,
            vec![
                "governanceChain",
                "governanceChainHash",
                "governanceAddress",
                "governanceAddressHash",
                "minimumTimeLockDelay"
            ]
        );
        assert_eq!(checks[1].expected.as_ref(), &keccak256("Axelarnet"));
    }

    #[test]
    fn service_governance_should_require_the_multisig() {
        let mut chain = chain(json!({
            "AxelarGateway": { "address": GATEWAY },
            "AxelarServiceGovernance": {
                "governanceChain": "Axelar",
                "minimumTimeDelay": 3600
            }
        }));

        assert!(ContractKind::AxelarServiceGovernance
            .constructor_args(&mut chain, address(WALLET))
            .is_err());

        chain
            .contract_mut("AxelarServiceGovernance")
            .set_setting("multisig", GAS_SERVICE);
        let args = ContractKind::AxelarServiceGovernance
            .constructor_args(&mut chain, address(WALLET))
            .unwrap();

        assert_eq!(args.len(), 5);
        assert_eq!(args[1], Token::String("Axelar".to_string()));
        assert_eq!(args[4], Token::Address(address(GAS_SERVICE)));
    }

    #[test]
    fn proposal_sender_should_use_gateway_and_gas_service() {
        let mut chain = chain(json!({
            "AxelarGateway": { "address": GATEWAY },
            "AxelarGasService": { "address": GAS_SERVICE }
        }));

        assert_eq!(
            ContractKind::InterchainProposalSender
                .constructor_args(&mut chain, address(WALLET))
                .unwrap(),
            vec![
                Token::Address(address(GATEWAY)),
                Token::Address(address(GAS_SERVICE))
            ]
        );
    }

    #[test]
    fn factory_should_be_resolved_per_method() {
        let chain = chain(json!({
            "Create2Deployer": { "address": GATEWAY },
            "Create3Deployer": { "address": GAS_SERVICE }
        }));

        assert_eq!(factory_address(&chain, DeployMethod::Create).unwrap(), None);
        assert_eq!(
            factory_address(&chain, DeployMethod::Create2).unwrap(),
            Some(address(GATEWAY))
        );
        assert_eq!(
            factory_address(&chain, DeployMethod::Create3).unwrap(),
            Some(address(GAS_SERVICE))
        );

        let without_factories = self::chain(json!({}));
        assert_eq!(
            factory_address(&without_factories, DeployMethod::Create3)
                .unwrap_err()
                .current_context(),
            &Error::MissingFactory(DeployMethod::Create3)
        );
    }
}
