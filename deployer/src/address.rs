//! Deterministic deployment address derivation.
//!
//! The offline predictor derives addresses locally from the factory, the deployer and the salt;
//! the online predictor asks the factory itself. For the same inputs both must agree.

use std::path::Path;

use async_trait::async_trait;
use chains_config::DeployMethod;
use error_stack::{bail, report, Result, ResultExt};
use ethers::abi::{encode, AbiDecode, AbiEncode, Token};
use ethers::types::{Address, Bytes, H256, U256};
use ethers::utils::{get_contract_address, get_create2_address_from_hash, keccak256};
use thiserror::Error;
use typed_builder::TypedBuilder;

use crate::artifact::Artifact;
use crate::evm::abi::deployer::{DeployedAddressCall, DeployedAddressReturn};
use crate::evm::json_rpc::ChainReader;
use crate::gas::GasOptions;

/// Nonce of the first contract created by the create3 proxy.
const CREATE3_PROXY_NONCE: u64 = 1;
const CREATE_DEPLOY: &str = "CreateDeploy";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("nonce must be provided for an offline create deployment")]
    MissingNonce,
    #[error("deployer contract address was not provided for a {0} deployment")]
    MissingFactory(DeployMethod),
    #[error("salt was not provided for a {0} deployment")]
    MissingSalt(DeployMethod),
    #[error("the CreateDeploy bytecode hash is required to predict create3 addresses offline")]
    MissingCreateDeployCodeHash,
    #[error("failed to load the CreateDeploy artifact")]
    CreateDeployArtifact,
    #[error("failed to query the chain")]
    Network,
    #[error("unexpected response from the deployer contract")]
    InvalidResponse,
}

/// Everything needed to predict and perform the deployment of one contract on one chain.
#[derive(Debug, Clone, PartialEq, TypedBuilder)]
pub struct DeploymentRequest {
    #[builder(setter(into))]
    pub contract_name: String,
    pub method: DeployMethod,
    #[builder(default, setter(into, strip_option))]
    pub salt_key: Option<String>,
    #[builder(default)]
    pub constructor_args: Vec<Token>,
    /// Creation code followed by the encoded constructor arguments
    pub init_code: Bytes,
    /// Address of the deployer factory, required for create2 and create3
    #[builder(default, setter(strip_option))]
    pub factory: Option<Address>,
    /// Explicit nonce for create deployments
    #[builder(default, setter(into, strip_option))]
    pub nonce: Option<U256>,
    #[builder(default)]
    pub gas_options: GasOptions,
}

impl DeploymentRequest {
    pub fn factory_and_salt(&self) -> Result<(Address, H256), Error> {
        let factory = self
            .factory
            .ok_or_else(|| report!(Error::MissingFactory(self.method)))?;
        let salt_key = self
            .salt_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| report!(Error::MissingSalt(self.method)))?;

        Ok((factory, salt_from_key(salt_key)))
    }
}

/// Hash of the CreateDeploy proxy's creation code, which fixes the proxy address of a create3
/// deployment. An explicit hash takes precedence over the artifact.
pub fn create_deploy_code_hash(
    explicit: Option<H256>,
    artifact_path: &Path,
) -> Result<H256, Error> {
    if let Some(hash) = explicit {
        return Ok(hash);
    }

    let artifact = Artifact::load(artifact_path, CREATE_DEPLOY)
        .change_context(Error::CreateDeployArtifact)?;

    Ok(H256(keccak256(&artifact.bytecode)))
}

/// `keccak256(abi.encode(key))`
pub fn salt_from_key(key: &str) -> H256 {
    H256(keccak256(encode(&[Token::String(key.to_string())])))
}

/// The salt the factory actually uses, which binds the deployment to its sender.
pub fn deploy_salt(deployer: Address, salt: H256) -> H256 {
    H256(keccak256(encode(&[
        Token::Address(deployer),
        Token::FixedBytes(salt.as_bytes().to_vec()),
    ])))
}

#[async_trait]
pub trait AddressPredictor: Send + Sync {
    async fn predict(&self, deployer: Address, request: &DeploymentRequest) -> Result<Address, Error>;
}

/// Derives addresses without touching the network.
#[derive(Debug, Clone, Default)]
pub struct OfflinePredictor {
    create_deploy_code_hash: Option<H256>,
}

impl OfflinePredictor {
    pub fn new(create_deploy_code_hash: Option<H256>) -> Self {
        OfflinePredictor {
            create_deploy_code_hash,
        }
    }
}

#[async_trait]
impl AddressPredictor for OfflinePredictor {
    async fn predict(&self, deployer: Address, request: &DeploymentRequest) -> Result<Address, Error> {
        match request.method {
            DeployMethod::Create => {
                let nonce = request.nonce.ok_or_else(|| report!(Error::MissingNonce))?;

                Ok(get_contract_address(deployer, nonce))
            }
            DeployMethod::Create2 => {
                let (factory, salt) = request.factory_and_salt()?;

                Ok(get_create2_address_from_hash(
                    factory,
                    deploy_salt(deployer, salt),
                    keccak256(&request.init_code),
                ))
            }
            DeployMethod::Create3 => {
                let (factory, salt) = request.factory_and_salt()?;
                let Some(create_deploy_code_hash) = self.create_deploy_code_hash else {
                    bail!(Error::MissingCreateDeployCodeHash);
                };

                // the factory deploys a fixed proxy with create2, which then creates the contract
                let proxy = get_create2_address_from_hash(
                    factory,
                    deploy_salt(deployer, salt),
                    create_deploy_code_hash,
                );

                Ok(get_contract_address(proxy, CREATE3_PROXY_NONCE))
            }
        }
    }
}

/// Asks the chain: the current nonce for create, the factory's `deployedAddress` otherwise.
pub struct OnlinePredictor<R> {
    reader: R,
}

impl<R> OnlinePredictor<R>
where
    R: ChainReader,
{
    pub fn new(reader: R) -> Self {
        OnlinePredictor { reader }
    }

    async fn deployed_address(
        &self,
        factory: Address,
        bytecode: Bytes,
        sender: Address,
        salt: H256,
    ) -> Result<Address, Error> {
        let call = DeployedAddressCall {
            bytecode,
            sender,
            salt: salt.0,
        };

        let response = self
            .reader
            .call(factory, call.encode().into())
            .await
            .change_context(Error::Network)?;

        DeployedAddressReturn::decode(&response)
            .map(|DeployedAddressReturn(address)| address)
            .change_context(Error::InvalidResponse)
    }
}

#[async_trait]
impl<R> AddressPredictor for OnlinePredictor<R>
where
    R: ChainReader,
{
    async fn predict(&self, deployer: Address, request: &DeploymentRequest) -> Result<Address, Error> {
        match request.method {
            DeployMethod::Create => {
                let nonce = match request.nonce {
                    Some(nonce) => nonce,
                    None => self
                        .reader
                        .transaction_count(deployer)
                        .await
                        .change_context(Error::Network)?,
                };

                Ok(get_contract_address(deployer, nonce))
            }
            DeployMethod::Create2 => {
                let (factory, salt) = request.factory_and_salt()?;

                self.deployed_address(factory, request.init_code.clone(), deployer, salt)
                    .await
            }
            DeployMethod::Create3 => {
                let (factory, salt) = request.factory_and_salt()?;

                self.deployed_address(factory, Bytes::new(), deployer, salt)
                    .await
            }
        }
    }
}
