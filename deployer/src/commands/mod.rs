use std::fmt::{Debug, Formatter};
use std::str::FromStr;
use std::time::Duration;

use chains_config::{ChainConfig, Fragments, RawGasOptions, Store};
use clap::Subcommand;
use error_stack::{report, Result, ResultExt};
use ethers::providers::Http;
use ethers::signers::LocalWallet;
use ethers::types::{Address, H256};
use itertools::Itertools;
use tokio::time::timeout;
use tracing::info;

use crate::batch::{BatchProcessor, BatchResult, ChainNames, ChainSelector, ChainStatus};
use crate::config::Config;
use crate::evm::json_rpc::Client;
use crate::evm::wallet::{signer_from_key, Wallet};
use crate::url::Url;
use crate::Error;

pub mod deploy;
pub mod multisig;

#[derive(Debug, Subcommand)]
pub enum SubCommand {
    /// Deploy a contract to the same address on every selected chain
    Deploy(deploy::Args),
    /// Vote on a multisig action on every selected chain
    Multisig(multisig::Args),
}

/// Options shared by every command that runs across chains.
#[derive(clap::Args, Debug, Clone)]
pub struct BatchArgs {
    /// Environment whose chains info is used (mainnet, testnet, ...)
    #[arg(short, long, env = "ENV")]
    pub env: String,

    /// Comma separated chain names, or `all` for every EVM chain
    #[arg(short = 'n', long, env = "CHAINS")]
    pub chain_names: ChainNames,

    /// Chains to leave out of the selection
    #[arg(long, env = "SKIP_CHAINS", value_delimiter = ',')]
    pub skip_chains: Vec<String>,

    /// Resume the selection at this chain
    #[arg(long)]
    pub start_from_chain: Option<String>,

    /// Process the chains concurrently, without prompting
    #[arg(long)]
    pub parallel: bool,

    /// Keep going after a chain failed
    #[arg(long)]
    pub ignore_error: bool,

    /// Answer yes to every prompt
    #[arg(short, long, env = "YES")]
    pub yes: bool,

    #[arg(short, long, env = "PRIVATE_KEY", hide_env_values = true)]
    pub private_key: PrivateKey,
}

#[derive(Clone)]
pub struct PrivateKey(String);

impl FromStr for PrivateKey {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(PrivateKey(s.to_string()))
    }
}

impl Debug for PrivateKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl BatchArgs {
    pub fn signer(&self) -> Result<LocalWallet, Error> {
        signer_from_key(&self.private_key.0)
            .change_context(Error::InvalidInput("private key".to_string()))
    }

    pub fn processor(&self, config: &Config) -> BatchProcessor {
        BatchProcessor::builder()
            .selector(ChainSelector {
                names: self.chain_names.clone(),
                skip: self.skip_chains.clone(),
                start_from: self.start_from_chain.clone(),
            })
            .parallel(self.parallel)
            .ignore_errors(self.ignore_error)
            .interactive(!self.yes)
            .fragments(Fragments::new(config.fragments_dir(), self.env.clone()))
            .build()
    }
}

pub fn open_store(config: &Config, env: &str) -> Result<Store, Error> {
    Store::open(&config.chains_info_dir, env)
        .change_context(Error::ChainsInfo)
        .attach_printable_lazy(|| format!("environment {env}"))
}

/// Turns the outcome of a batch into the command's response. Any failed chain fails the command.
pub fn summarize(action: &str, result: BatchResult) -> Result<Option<String>, Error> {
    let failed = result.failed().map(|outcome| &outcome.chain).join(",");
    if result.aborted || !failed.is_empty() {
        return Err(report!(Error::Batch)).attach_printable(format!("failed chains: {failed}"));
    }

    let succeeded = result
        .outcomes
        .iter()
        .filter(|outcome| outcome.status == ChainStatus::Success)
        .map(|outcome| &outcome.chain)
        .join(",");

    Ok(Some(format!("{action} completed on chains: {succeeded}")))
}

pub fn parse_gas_options(gas_options: Option<&str>) -> Result<Option<RawGasOptions>, Error> {
    gas_options
        .map(|raw| {
            serde_json::from_str(raw)
                .change_context(Error::InvalidInput("gas options".to_string()))
                .attach_printable_lazy(|| raw.to_string())
        })
        .transpose()
}

pub fn parse_address(name: &str, value: &str) -> Result<Address, Error> {
    Address::from_str(value.trim())
        .change_context(Error::InvalidInput(name.to_string()))
        .attach_printable_lazy(|| value.to_string())
}

pub fn rpc_url(chain: &ChainConfig) -> Result<Url, Error> {
    Url::new_sensitive(&chain.rpc).change_context(Error::Connection(chain.name.clone()))
}

pub fn chain_client(chain: &ChainConfig, config: &Config) -> Result<Client<Http>, Error> {
    Ok(Client::new_http(&rpc_url(chain)?, config.rpc_retry.policy()))
}

/// Waits for the transaction to be confirmed, giving up after the chain's timeout.
pub async fn confirm<W>(
    wallet: &W,
    chain: &ChainConfig,
    tx_hash: H256,
    default_timeout: Duration,
) -> Result<(), Error>
where
    W: Wallet,
{
    let receipt = timeout(
        chain.tx_timeout_or(default_timeout),
        wallet.wait_for_confirmations(tx_hash, chain.confirmations()),
    )
    .await
    .map_err(|_| report!(Error::Submission))
    .attach_printable_lazy(|| format!("timed out waiting for {tx_hash:?}"))?
    .change_context(Error::Submission)?;

    if receipt.status.is_some_and(|status| status.is_zero()) {
        return Err(report!(Error::Submission))
            .attach_printable(format!("transaction {tx_hash:?} reverted"));
    }

    info!(chain = chain.name, tx_hash = ?tx_hash, "transaction confirmed");

    Ok(())
}
