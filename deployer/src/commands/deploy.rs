use std::path::PathBuf;

use async_trait::async_trait;
use chains_config::{ChainConfig, DeployMethod, RawGasOptions};
use error_stack::{Result, ResultExt};
use ethers::abi::Token;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, U256};
use ethers::utils::to_checksum;
use serde_json::{Map, Value};
use tracing::info;

use crate::address::{
    create_deploy_code_hash, AddressPredictor, DeploymentRequest, OfflinePredictor,
    OnlinePredictor,
};
use crate::artifact::Artifact;
use crate::batch::{ChainAction, ChainContext};
use crate::commands::{chain_client, open_store, parse_gas_options, rpc_url, summarize, BatchArgs};
use crate::config::Config;
use crate::contracts::{factory_address, ContractKind};
use crate::deploy::DeploymentCoordinator;
use crate::evm::log_wallet_info;
use crate::evm::wallet::EvmWallet;
use crate::gas::{GasOptions, GasPolicyResolver};
use crate::prompt::{Prompt, StdinPrompt};
use crate::verify::HardhatVerifier;
use crate::Error;

#[derive(clap::Args, Debug)]
pub struct Args {
    #[clap(flatten)]
    pub batch: BatchArgs,

    #[arg(long)]
    pub contract_name: ContractKind,

    /// Artifact file, or the directory of `<Contract>.sol/<Contract>.json` artifacts
    #[arg(long, default_value = "./artifacts/contracts")]
    pub artifact_path: PathBuf,

    #[arg(short = 'm', long, default_value = "create2")]
    pub deploy_method: DeployMethod,

    /// Salt key for create2 and create3, defaults to the contract name
    #[arg(short, long)]
    pub salt: Option<String>,

    /// JSON object merged into the contract's settings before the constructor arguments are built
    #[arg(long)]
    pub args: Option<String>,

    /// JSON gas options overriding the chain's and the contract's
    #[arg(long)]
    pub gas_options: Option<String>,

    #[arg(long)]
    pub predict_only: bool,

    /// Skip chains that already have a recorded address for the contract
    #[arg(long)]
    pub skip_existing: bool,

    /// Allow replacing an address already recorded for the contract
    #[arg(long)]
    pub overwrite: bool,

    /// Verify the source code on the block explorer after deployment
    #[arg(long)]
    pub verify: bool,

    /// Predict the address without any network access
    #[arg(long)]
    pub offline: bool,

    /// Nonce of a create deployment
    #[arg(long)]
    pub nonce: Option<u64>,
}

pub async fn run(config: Config, args: Args) -> Result<Option<String>, Error> {
    let mut store = open_store(&config, &args.batch.env)?;
    let processor = args.batch.processor(&config);

    let kind = args.contract_name;
    let artifact = Artifact::load(&args.artifact_path, kind.name()).change_context(Error::Artifact)?;
    let settings = args
        .args
        .as_deref()
        .map(|raw| {
            serde_json::from_str::<Map<String, Value>>(raw)
                .change_context(Error::InvalidInput("constructor args".to_string()))
                .attach_printable_lazy(|| raw.to_string())
        })
        .transpose()?
        .unwrap_or_default();

    let action = DeployAction {
        kind,
        artifact,
        method: args.deploy_method,
        salt: args.salt.unwrap_or_else(|| kind.name().to_string()),
        settings,
        gas_options: parse_gas_options(args.gas_options.as_deref())?,
        predict_only: args.predict_only,
        skip_existing: args.skip_existing,
        overwrite: args.overwrite,
        verify: args.verify,
        offline: args.offline,
        nonce: args.nonce,
        signer: args.batch.signer()?,
        config: config.clone(),
        prompt: Box::new(StdinPrompt::new(args.batch.yes)),
    };

    let result = processor
        .run(&mut store, action)
        .await
        .change_context(Error::Batch)?;

    summarize("deployment", result)
}

pub struct DeployAction {
    kind: ContractKind,
    artifact: Artifact,
    method: DeployMethod,
    salt: String,
    settings: Map<String, Value>,
    gas_options: Option<RawGasOptions>,
    predict_only: bool,
    skip_existing: bool,
    overwrite: bool,
    verify: bool,
    offline: bool,
    nonce: Option<u64>,
    signer: LocalWallet,
    config: Config,
    prompt: Box<dyn Prompt>,
}

impl DeployAction {
    /// Fills in the contract's settings and builds the request for `chain`.
    fn request(&self, chain: &mut ChainConfig, gas_options: GasOptions) -> Result<DeploymentRequest, Error> {
        let name = self.kind.name();
        chain.contract_mut(name).merge_settings(self.settings.clone());

        let constructor_args: Vec<Token> = self
            .kind
            .constructor_args(chain, self.signer.address())
            .change_context(Error::InvalidInput(format!("{name} constructor arguments")))?;
        let factory = factory_address(chain, self.method)
            .change_context(Error::InvalidInput("deploy method".to_string()))?;

        Ok(DeploymentRequest {
            contract_name: name.to_string(),
            method: self.method,
            salt_key: self.method.uses_factory().then(|| self.salt.clone()),
            init_code: self.artifact.init_code(&constructor_args),
            constructor_args,
            factory,
            nonce: self.nonce.map(U256::from),
            gas_options,
        })
    }

    async fn predict_offline(&self, chain: &mut ChainConfig) -> Result<Address, Error> {
        let request = self.request(chain, GasOptions::default())?;

        let create_deploy_code_hash = match self.method {
            DeployMethod::Create3 => Some(
                create_deploy_code_hash(
                    self.config.create_deploy_code_hash,
                    &self.config.create_deploy_artifact,
                )
                .change_context(Error::Prediction)?,
            ),
            _ => None,
        };

        let address = OfflinePredictor::new(create_deploy_code_hash)
            .predict(self.signer.address(), &request)
            .await
            .change_context(Error::Prediction)?;

        info!(
            chain = chain.name,
            contract = request.contract_name,
            method = %request.method,
            address = to_checksum(&address, None),
            "predicted deployment address"
        );

        Ok(address)
    }
}

#[async_trait]
impl ChainAction for DeployAction {
    async fn run(&self, ctx: ChainContext<'_>) -> Result<(), Error> {
        let name = self.kind.name();

        if let Some(address) = ctx
            .chain
            .contract(name)
            .and_then(|record| record.address)
            .filter(|_| self.skip_existing)
        {
            info!(
                chain = ctx.chain.name,
                contract = name,
                address = to_checksum(&address, None),
                "contract already has a recorded address, skipping"
            );
            return Ok(());
        }

        if self.offline {
            self.predict_offline(ctx.chain).await?;
            return Ok(());
        }

        let reader = chain_client(ctx.chain, &self.config)?;
        log_wallet_info(
            &reader,
            &ctx.chain.name,
            ctx.chain.token_symbol.as_deref(),
            self.signer.address(),
        )
        .await;

        let gas_options = GasPolicyResolver::new(reader.clone())
            .resolve(ctx.chain, self.gas_options.as_ref(), Some(name), false)
            .await
            .change_context(Error::Gas)?;
        let request = self.request(ctx.chain, gas_options)?;

        let wallet = EvmWallet::connect(&rpc_url(ctx.chain)?, self.signer.clone())
            .await
            .change_context(Error::Connection(ctx.chain.name.clone()))?;
        let mut coordinator = DeploymentCoordinator::new(
            reader.clone(),
            wallet,
            OnlinePredictor::new(reader),
            self.config.confirmation_timeout,
        )
        .with_overwrite(self.overwrite);
        if self.verify {
            coordinator = coordinator.with_verifier(Box::new(HardhatVerifier::new(
                std::env::temp_dir().join("deployer-verify"),
            )));
        }

        let checks = self
            .kind
            .post_deploy_checks(ctx.chain.contract_mut(name))
            .change_context(Error::InvalidInput(format!("{name} settings")))?;
        let plan = coordinator
            .plan(ctx.chain, ctx.chains, request, &self.artifact)
            .await
            .change_context(Error::Deployment)?
            .with_checks(checks);

        if plan.existing {
            return Ok(());
        }
        if self.predict_only {
            info!(chain = ctx.chain.name, contract = name, "prediction only, nothing deployed");
            return Ok(());
        }
        if ctx.interactive
            && !self
                .prompt
                .confirm(&format!("Proceed with the deployment of {name} on {}?", ctx.chain.name))
        {
            info!(chain = ctx.chain.name, contract = name, "deployment cancelled");
            return Ok(());
        }

        coordinator
            .execute(ctx.chain, plan)
            .await
            .change_context(Error::Deployment)
            .attach_printable_lazy(|| format!("{name} on {}", ctx.chain.name))?;

        Ok(())
    }

    fn persists_state(&self) -> bool {
        !(self.offline || self.predict_only)
    }
}
