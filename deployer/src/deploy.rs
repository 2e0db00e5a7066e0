//! Deployment of one contract on one chain.
//!
//! A deployment is split into a [plan](DeploymentCoordinator::plan), which only reads from the
//! chain, and its [execution](DeploymentCoordinator::execute), so the operator can review the
//! predicted address before anything is broadcast.

use std::collections::BTreeMap;
use std::time::Duration;

use chains_config::{ChainConfig, DeployMethod};
use error_stack::{bail, report, Result, ResultExt};
use ethers::abi::AbiEncode;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, H256, U256, U64};
use ethers::utils::to_checksum;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::address::{AddressPredictor, DeploymentRequest};
use crate::artifact::{code_hash, Artifact};
use crate::contracts::PostDeployCheck;
use crate::evm::abi::deployer::DeployCall;
use crate::evm::json_rpc::ChainReader;
use crate::evm::wallet::Wallet;
use crate::verify::SourceVerifier;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("failed to compute the bytecode hash")]
    CodeHash,
    #[error("failed to predict the deployment address")]
    Prediction,
    #[error("failed to query chain {0}")]
    Network(String),
    #[error("failed to send the deployment transaction")]
    Send,
    #[error("deployment transaction {0:?} was not confirmed")]
    Confirmation(H256),
    #[error("deployment transaction {0:?} was not confirmed in time")]
    Timeout(H256),
    #[error("deployment transaction {0:?} reverted")]
    Reverted(H256),
    #[error("no code found at {0:?} after deployment")]
    EmptyCode(Address),
    #[error("contract is already recorded at {recorded:?}, refusing to replace it with {predicted:?}")]
    RecordedAddressConflict { recorded: Address, predicted: Address },
}

/// Outcome of the read-only half of a deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentPlan {
    pub request: DeploymentRequest,
    pub address: Address,
    pub predeploy_codehash: H256,
    /// Code is already present at the predicted address
    pub existing: bool,
    /// Address recorded for the contract on this chain, if it differs from the prediction
    pub replaces: Option<Address>,
    pub post_deploy_checks: Vec<PostDeployCheck>,
}

impl DeploymentPlan {
    pub fn with_checks(mut self, checks: Vec<PostDeployCheck>) -> Self {
        self.post_deploy_checks = checks;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractHandle {
    pub address: Address,
    /// Hash of the deployment transaction, `None` if the contract already existed
    pub tx_hash: Option<H256>,
}

pub struct DeploymentCoordinator<R, W, P> {
    reader: R,
    wallet: W,
    predictor: P,
    verifier: Option<Box<dyn SourceVerifier>>,
    confirmation_timeout: Duration,
    overwrite: bool,
}

impl<R, W, P> DeploymentCoordinator<R, W, P>
where
    R: ChainReader,
    W: Wallet,
    P: AddressPredictor,
{
    pub fn new(reader: R, wallet: W, predictor: P, confirmation_timeout: Duration) -> Self {
        DeploymentCoordinator {
            reader,
            wallet,
            predictor,
            verifier: None,
            confirmation_timeout,
            overwrite: false,
        }
    }

    /// Allows a deployment to replace an address already recorded for the contract on the chain.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_verifier(mut self, verifier: Box<dyn SourceVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub async fn deploy(
        &self,
        chain: &mut ChainConfig,
        chains: &BTreeMap<String, ChainConfig>,
        request: DeploymentRequest,
        artifact: &Artifact,
    ) -> Result<ContractHandle, Error> {
        let plan = self.plan(chain, chains, request, artifact).await?;
        self.execute(chain, plan).await
    }

    /// Predicts the address, checks whether the contract already exists and compares the
    /// prediction with the deployments recorded for the other chains.
    pub async fn plan(
        &self,
        chain: &ChainConfig,
        chains: &BTreeMap<String, ChainConfig>,
        request: DeploymentRequest,
        artifact: &Artifact,
    ) -> Result<DeploymentPlan, Error> {
        let predeploy_codehash = artifact
            .predeploy_codehash(&chain.axelar_id)
            .change_context(Error::CodeHash)?;
        info!(
            chain = chain.name,
            contract = request.contract_name,
            codehash = ?predeploy_codehash,
            "pre-deploy bytecode hash"
        );

        let address = self
            .predictor
            .predict(self.wallet.address(), &request)
            .await
            .change_context(Error::Prediction)?;
        info!(
            chain = chain.name,
            contract = request.contract_name,
            method = %request.method,
            salt = request.salt_key,
            address = to_checksum(&address, None),
            "predicted deployment address"
        );

        let existing = !self
            .reader
            .code_at(address)
            .await
            .change_context(Error::Network(chain.name.clone()))?
            .is_empty();

        let replaces = chain
            .contract(&request.contract_name)
            .and_then(|record| record.address)
            .filter(|recorded| *recorded != address);

        if existing {
            info!(
                chain = chain.name,
                contract = request.contract_name,
                address = to_checksum(&address, None),
                "contract is already deployed, skipping"
            );
        } else {
            if let Some(recorded) = replaces {
                warn!(
                    chain = chain.name,
                    contract = request.contract_name,
                    recorded = to_checksum(&recorded, None),
                    predicted = to_checksum(&address, None),
                    "predicted address does not match the address recorded for this chain"
                );
            }

            warn_on_inconsistent_deployments(
                chain,
                chains,
                &request.contract_name,
                address,
                predeploy_codehash,
            );
        }

        Ok(DeploymentPlan {
            request,
            address,
            predeploy_codehash,
            existing,
            replaces,
            post_deploy_checks: vec![],
        })
    }

    /// Broadcasts the planned deployment and records it on `chain`. Does nothing if the contract
    /// already exists. A plan replacing a recorded address is refused unless overwriting is allowed.
    pub async fn execute(
        &self,
        chain: &mut ChainConfig,
        plan: DeploymentPlan,
    ) -> Result<ContractHandle, Error> {
        if plan.existing {
            return Ok(ContractHandle {
                address: plan.address,
                tx_hash: None,
            });
        }

        if let Some(recorded) = plan.replaces {
            if !self.overwrite {
                bail!(Error::RecordedAddressConflict {
                    recorded,
                    predicted: plan.address,
                });
            }

            warn!(
                chain = chain.name,
                contract = plan.request.contract_name,
                recorded = to_checksum(&recorded, None),
                "replacing the recorded address"
            );
        }

        let request = &plan.request;
        let tx_hash = self
            .wallet
            .send(transaction(request)?)
            .await
            .change_context(Error::Send)
            .attach_printable_lazy(|| chain.name.clone())?;
        info!(chain = chain.name, tx_hash = ?tx_hash, "deployment transaction sent");

        let receipt = timeout(
            chain.tx_timeout_or(self.confirmation_timeout),
            self.wallet
                .wait_for_confirmations(tx_hash, chain.confirmations()),
        )
        .await
        .map_err(|_| report!(Error::Timeout(tx_hash)))?
        .change_context(Error::Confirmation(tx_hash))?;

        if receipt.status == Some(U64::zero()) {
            bail!(Error::Reverted(tx_hash));
        }

        let address = match (request.method, receipt.contract_address) {
            (DeployMethod::Create, Some(created)) if created != plan.address => {
                warn!(
                    chain = chain.name,
                    predicted = to_checksum(&plan.address, None),
                    actual = to_checksum(&created, None),
                    "contract was created at a different address than predicted"
                );
                created
            }
            _ => plan.address,
        };

        let code = self
            .reader
            .code_at(address)
            .await
            .change_context(Error::Network(chain.name.clone()))?;
        if code.is_empty() {
            bail!(Error::EmptyCode(address));
        }

        let codehash = code_hash(&code, &chain.axelar_id).change_context(Error::CodeHash)?;
        if codehash != plan.predeploy_codehash {
            warn!(
                chain = chain.name,
                expected = ?plan.predeploy_codehash,
                actual = ?codehash,
                "deployed bytecode hash does not match the pre-deploy bytecode hash"
            );
        }

        let record = chain.contract_mut(&request.contract_name);
        record.address = Some(address);
        record.deployer = Some(self.wallet.address());
        record.deployment_method = Some(request.method);
        record.salt = request
            .method
            .uses_factory()
            .then(|| request.salt_key.clone())
            .flatten();
        record.codehash = Some(codehash);
        record.predeploy_codehash = Some(plan.predeploy_codehash);

        info!(
            chain = chain.name,
            contract = request.contract_name,
            address = to_checksum(&address, None),
            "contract deployed"
        );

        if let Some(verifier) = &self.verifier {
            if let Err(err) = verifier
                .verify(
                    &chain.axelar_id,
                    &request.contract_name,
                    address,
                    &request.constructor_args,
                )
                .await
            {
                warn!(chain = chain.name, err = ?err, "contract verification failed");
            }
        }

        self.run_checks(&chain.name, address, &plan.post_deploy_checks)
            .await;

        Ok(ContractHandle {
            address,
            tx_hash: Some(tx_hash),
        })
    }

    async fn run_checks(&self, chain_name: &str, address: Address, checks: &[PostDeployCheck]) {
        for check in checks {
            match self.reader.call(address, check.calldata.clone()).await {
                Ok(actual) if actual == check.expected => {}
                Ok(actual) => error!(
                    chain = chain_name,
                    check = check.description,
                    expected = %check.expected,
                    actual = %actual,
                    "post-deployment check failed"
                ),
                Err(err) => error!(
                    chain = chain_name,
                    check = check.description,
                    err = %err,
                    "post-deployment check could not be run"
                ),
            }
        }
    }
}

fn transaction(request: &DeploymentRequest) -> Result<TypedTransaction, Error> {
    match request.method {
        DeployMethod::Create => {
            let mut tx =
                request
                    .gas_options
                    .transaction(None, request.init_code.clone(), U256::zero());
            if let Some(nonce) = request.nonce {
                tx.set_nonce(nonce);
            }

            Ok(tx)
        }
        DeployMethod::Create2 | DeployMethod::Create3 => {
            let (factory, salt) = request
                .factory_and_salt()
                .change_context(Error::Prediction)?;
            let data = DeployCall {
                bytecode: request.init_code.clone(),
                salt: salt.0,
            }
            .encode();

            Ok(request
                .gas_options
                .transaction(Some(factory), data.into(), U256::zero()))
        }
    }
}

fn warn_on_inconsistent_deployments(
    chain: &ChainConfig,
    chains: &BTreeMap<String, ChainConfig>,
    contract_name: &str,
    address: Address,
    predeploy_codehash: H256,
) {
    let others = chains
        .values()
        .filter(|other| other.name != chain.name)
        .filter_map(|other| Some((other, other.contract(contract_name)?)));

    for (other, record) in others {
        let Some(existing) = record.address.filter(|existing| *existing != address) else {
            continue;
        };

        warn!(
            chain = chain.name,
            other_chain = other.name,
            predicted = to_checksum(&address, None),
            existing = to_checksum(&existing, None),
            "predicted address does not match the existing deployment"
        );

        if let Some(existing_codehash) = record
            .predeploy_codehash
            .filter(|existing_codehash| *existing_codehash != predeploy_codehash)
        {
            warn!(
                chain = chain.name,
                other_chain = other.name,
                predeploy_codehash = ?predeploy_codehash,
                existing = ?existing_codehash,
                "pre-deploy bytecode hash does not match the existing deployment"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chains_config::{ChainConfig, DeployMethod};
    use error_stack::Result;
    use ethers::abi::{encode, Token};
    use ethers::types::transaction::eip2718::TypedTransaction;
    use ethers::types::{Address, Bytes, TransactionReceipt, H256, U64};
    use ethers::utils::keccak256;
    use serde_json::json;
    use tracing_test::traced_test;

    use super::{DeploymentCoordinator, Error};
    use crate::address::{DeploymentRequest, OfflinePredictor};
    use crate::artifact::Artifact;
    use crate::contracts::ContractKind;
    use crate::evm::json_rpc::MockChainReader;
    use crate::evm::wallet::{self, MockWallet, Wallet};
    use crate::verify::MockSourceVerifier;

    const DEPLOYER: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
    const CREATE2_FACTORY: &str = "0x98B2920D53612483F91F12Ed7754E51b4A77919e";
    // create2 address of 0x6080 deployed by DEPLOYER through CREATE2_FACTORY with salt "Operators"
    const PREDICTED: &str = "0x0e629129e6344bA9AC9F7995A5E0efAfA73B0B0B";
    const TX_HASH: H256 = H256::repeat_byte(1);

    fn address(s: &str) -> Address {
        Address::from_str(s).unwrap()
    }

    fn chain(name: &str, axelar_id: &str) -> ChainConfig {
        serde_json::from_value(json!({
            "name": name,
            "axelarId": axelar_id,
            "rpc": "http://localhost:8545",
            "contracts": {
                "ConstAddressDeployer": { "address": CREATE2_FACTORY }
            }
        }))
        .unwrap()
    }

    fn artifact() -> Artifact {
        Artifact::parse(
            "Operators",
            &json!({ "bytecode": "0x6080", "deployedBytecode": "0x00" }).to_string(),
        )
        .unwrap()
    }

    fn request() -> DeploymentRequest {
        DeploymentRequest::builder()
            .contract_name("Operators")
            .method(DeployMethod::Create2)
            .salt_key("Operators")
            .init_code(artifact().init_code(&[]))
            .factory(address(CREATE2_FACTORY))
            .build()
    }

    /// Reader and wallet sharing the state of a chain on which the contract appears once the
    /// deployment transaction has been sent.
    fn simulated_chain(deployed_code: Bytes) -> (MockChainReader, MockWallet, Arc<AtomicBool>) {
        let deployed = Arc::new(AtomicBool::new(false));

        let mut reader = MockChainReader::new();
        let state = deployed.clone();
        reader.expect_code_at().returning(move |_| {
            Ok(if state.load(Ordering::SeqCst) {
                deployed_code.clone()
            } else {
                Bytes::new()
            })
        });

        let mut wallet = MockWallet::new();
        wallet.expect_address().return_const(address(DEPLOYER));
        let state = deployed.clone();
        wallet.expect_send().returning(move |_| {
            state.store(true, Ordering::SeqCst);
            Ok(TX_HASH)
        });
        wallet
            .expect_wait_for_confirmations()
            .returning(|tx_hash, _| {
                Ok(TransactionReceipt {
                    transaction_hash: tx_hash,
                    status: Some(U64::one()),
                    ..Default::default()
                })
            });

        (reader, wallet, deployed)
    }

    fn coordinator<R, W>(reader: R, wallet: W) -> DeploymentCoordinator<R, W, OfflinePredictor>
    where
        R: crate::evm::json_rpc::ChainReader,
        W: Wallet,
    {
        DeploymentCoordinator::new(
            reader,
            wallet,
            OfflinePredictor::default(),
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn deploy_should_record_the_contract() {
        let (reader, wallet, _) = simulated_chain(Bytes::from(vec![0u8]));
        let coordinator = coordinator(reader, wallet);
        let mut chain = chain("Ethereum", "Ethereum");

        let handle = coordinator
            .deploy(&mut chain, &BTreeMap::new(), request(), &artifact())
            .await
            .unwrap();

        assert_eq!(handle.address, address(PREDICTED));
        assert_eq!(handle.tx_hash, Some(TX_HASH));

        let record = chain.contract("Operators").unwrap();
        let codehash = H256(keccak256([0u8]));
        assert_eq!(record.address, Some(address(PREDICTED)));
        assert_eq!(record.deployer, Some(address(DEPLOYER)));
        assert_eq!(record.deployment_method, Some(DeployMethod::Create2));
        assert_eq!(record.salt.as_deref(), Some("Operators"));
        assert_eq!(record.codehash, Some(codehash));
        assert_eq!(record.predeploy_codehash, Some(codehash));
    }

    #[tokio::test]
    async fn deploy_should_be_idempotent() {
        let (reader, mut wallet, deployed) = simulated_chain(Bytes::from(vec![0u8]));
        wallet.checkpoint();
        wallet.expect_address().return_const(address(DEPLOYER));
        let state = deployed.clone();
        wallet.expect_send().times(1).returning(move |_| {
            state.store(true, Ordering::SeqCst);
            Ok(TX_HASH)
        });
        wallet
            .expect_wait_for_confirmations()
            .times(1)
            .returning(|tx_hash, _| {
                Ok(TransactionReceipt {
                    transaction_hash: tx_hash,
                    status: Some(U64::one()),
                    ..Default::default()
                })
            });

        let coordinator = coordinator(reader, wallet);
        let mut chain = chain("Ethereum", "Ethereum");

        let first = coordinator
            .deploy(&mut chain, &BTreeMap::new(), request(), &artifact())
            .await
            .unwrap();
        let recorded = chain.clone();
        let second = coordinator
            .deploy(&mut chain, &BTreeMap::new(), request(), &artifact())
            .await
            .unwrap();

        assert!(deployed.load(Ordering::SeqCst));
        assert_eq!(first.address, second.address);
        assert_eq!(second.tx_hash, None);
        assert_eq!(chain, recorded);
    }

    #[tokio::test]
    #[traced_test]
    async fn plan_should_warn_about_inconsistent_deployments() {
        let (reader, wallet, _) = simulated_chain(Bytes::from(vec![0u8]));
        let coordinator = coordinator(reader, wallet);
        let chain = chain("Ethereum", "Ethereum");

        let mut other = self::chain("Avalanche", "Avalanche");
        let record = other.contract_mut("Operators");
        record.address = Some(address(DEPLOYER));
        record.predeploy_codehash = Some(H256::repeat_byte(7));
        let mut same = self::chain("Fantom", "Fantom");
        same.contract_mut("Operators").address = Some(address(PREDICTED));

        let chains = BTreeMap::from([
            ("ethereum".to_string(), chain.clone()),
            ("avalanche".to_string(), other),
            ("fantom".to_string(), same),
        ]);

        let plan = coordinator
            .plan(&chain, &chains, request(), &artifact())
            .await
            .unwrap();

        assert!(!plan.existing);
        assert!(logs_contain(
            "predicted address does not match the existing deployment"
        ));
        assert!(logs_contain(
            "pre-deploy bytecode hash does not match the existing deployment"
        ));
        assert!(logs_contain("Avalanche"));
        assert!(!logs_contain("other_chain=\"Fantom\""));
    }

    #[tokio::test]
    #[traced_test]
    async fn recorded_address_should_not_be_replaced() {
        let recorded = Address::repeat_byte(0xde);
        let mut wallet = MockWallet::new();
        wallet.expect_address().return_const(address(DEPLOYER));
        wallet.expect_send().never();
        let mut reader = MockChainReader::new();
        reader.expect_code_at().returning(|_| Ok(Bytes::new()));
        let coordinator = coordinator(reader, wallet);

        let mut chain = chain("Ethereum", "Ethereum");
        chain.contract_mut("Operators").address = Some(recorded);
        let before = chain.clone();

        let mut request = request();
        request.salt_key = Some("Operators v2".to_string());
        let err = coordinator
            .deploy(&mut chain, &BTreeMap::new(), request, &artifact())
            .await
            .unwrap_err();

        assert!(matches!(
            err.current_context(),
            Error::RecordedAddressConflict { recorded: conflicting, .. } if *conflicting == recorded
        ));
        assert_eq!(chain, before);
        assert!(logs_contain(
            "predicted address does not match the address recorded for this chain"
        ));
    }

    #[tokio::test]
    #[traced_test]
    async fn recorded_address_should_be_replaced_when_overwriting() {
        let (reader, wallet, _) = simulated_chain(Bytes::from(vec![0u8]));
        let coordinator = coordinator(reader, wallet).with_overwrite(true);

        let mut chain = chain("Ethereum", "Ethereum");
        chain.contract_mut("Operators").address = Some(Address::repeat_byte(0xde));

        let handle = coordinator
            .deploy(&mut chain, &BTreeMap::new(), request(), &artifact())
            .await
            .unwrap();

        assert_eq!(handle.address, address(PREDICTED));
        assert_eq!(
            chain.contract("Operators").unwrap().address,
            Some(address(PREDICTED))
        );
        assert!(logs_contain("replacing the recorded address"));
    }

    #[tokio::test]
    async fn unsupported_hash_scheme_should_fail_before_sending() {
        let mut wallet = MockWallet::new();
        wallet.expect_send().never();
        let coordinator = coordinator(MockChainReader::new(), wallet);
        let mut chain = chain("Polygon zkEVM", "polygon-zkevm");

        let err = coordinator
            .deploy(&mut chain, &BTreeMap::new(), request(), &artifact())
            .await
            .unwrap_err();

        assert_eq!(err.current_context(), &Error::CodeHash);
        assert!(chain.contract("Operators").is_none());
    }

    #[tokio::test]
    async fn reverted_deployment_should_fail() {
        let (reader, mut wallet, _) = simulated_chain(Bytes::from(vec![0u8]));
        wallet.checkpoint();
        wallet.expect_address().return_const(address(DEPLOYER));
        wallet.expect_send().returning(|_| Ok(TX_HASH));
        wallet
            .expect_wait_for_confirmations()
            .returning(|tx_hash, _| {
                Ok(TransactionReceipt {
                    transaction_hash: tx_hash,
                    status: Some(U64::zero()),
                    ..Default::default()
                })
            });
        let coordinator = coordinator(reader, wallet);
        let mut chain = chain("Ethereum", "Ethereum");

        let err = coordinator
            .deploy(&mut chain, &BTreeMap::new(), request(), &artifact())
            .await
            .unwrap_err();

        assert_eq!(err.current_context(), &Error::Reverted(TX_HASH));
        assert!(!chain.contract("Operators").is_some_and(|record| record.is_deployed()));
    }

    #[tokio::test]
    async fn missing_code_after_deployment_should_fail() {
        let (reader, wallet, _) = simulated_chain(Bytes::new());
        let coordinator = coordinator(reader, wallet);
        let mut chain = chain("Ethereum", "Ethereum");

        let err = coordinator
            .deploy(&mut chain, &BTreeMap::new(), request(), &artifact())
            .await
            .unwrap_err();

        assert_eq!(err.current_context(), &Error::EmptyCode(address(PREDICTED)));
    }

    struct StalledWallet;

    #[async_trait]
    impl Wallet for StalledWallet {
        fn address(&self) -> Address {
            address(DEPLOYER)
        }

        async fn send(&self, _tx: TypedTransaction) -> Result<H256, wallet::Error> {
            Ok(TX_HASH)
        }

        async fn sign(&self, _tx: TypedTransaction) -> Result<Bytes, wallet::Error> {
            Ok(Bytes::new())
        }

        async fn wait_for_confirmations(
            &self,
            _tx_hash: H256,
            _confirmations: usize,
        ) -> Result<TransactionReceipt, wallet::Error> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn confirmation_wait_should_time_out() {
        let mut reader = MockChainReader::new();
        reader.expect_code_at().returning(|_| Ok(Bytes::new()));
        let coordinator = coordinator(reader, StalledWallet);
        let mut chain = chain("Ethereum", "Ethereum");
        chain.tx_timeout = Some(500);

        let err = coordinator
            .deploy(&mut chain, &BTreeMap::new(), request(), &artifact())
            .await
            .unwrap_err();

        assert_eq!(err.current_context(), &Error::Timeout(TX_HASH));
        assert!(!chain.contract("Operators").is_some_and(|record| record.is_deployed()));
    }

    #[tokio::test]
    #[traced_test]
    async fn verification_and_check_failures_should_only_be_logged() {
        let (mut reader, wallet, _) = simulated_chain(Bytes::from(vec![0u8]));
        reader
            .expect_call()
            .returning(|_, _| Ok(encode(&[Token::Address(Address::zero())]).into()));

        let mut verifier = MockSourceVerifier::new();
        verifier.expect_verify().times(1).returning(|_, _, address, _| {
            Err(error_stack::report!(crate::verify::Error::Failed(address)))
        });

        let coordinator = coordinator(reader, wallet).with_verifier(Box::new(verifier));
        let mut chain = chain("Ethereum", "Ethereum");
        let args = ContractKind::Operators
            .constructor_args(&mut chain, address(DEPLOYER))
            .unwrap();
        let checks = ContractKind::Operators
            .post_deploy_checks(chain.contract("Operators").unwrap())
            .unwrap();

        let mut request = request();
        request.constructor_args = args;
        let plan = coordinator
            .plan(&chain, &BTreeMap::new(), request, &artifact())
            .await
            .unwrap()
            .with_checks(checks);
        let handle = coordinator.execute(&mut chain, plan).await.unwrap();

        assert_eq!(handle.tx_hash, Some(TX_HASH));
        assert!(chain.contract("Operators").unwrap().is_deployed());
        assert!(logs_contain("contract verification failed"));
        assert!(logs_contain("post-deployment check failed"));
    }
}
