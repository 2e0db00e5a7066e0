use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chains_config::{ChainConfig, RawGasOptions};
use clap::ValueEnum;
use error_stack::{bail, report, Result, ResultExt};
use ethers::providers::Http;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Bytes, H256, U256};
use ethers::utils::{format_ether, parse_ether, to_checksum};
use strum::Display;
use tracing::{info, warn};

use crate::batch::{ChainAction, ChainContext};
use crate::commands::{
    chain_client, confirm, open_store, parse_address, parse_gas_options, rpc_url, summarize,
    BatchArgs,
};
use crate::config::Config;
use crate::evm::abi::gateway::{
    TokenAddressesCall, TokenAddressesReturn, TokenMintLimitCall, TokenMintLimitReturn,
};
use crate::evm::abi::its::{
    IsOperatorCall, IsOperatorReturn, ValidTokenManagerAddressCall, ValidTokenManagerAddressReturn,
};
use crate::evm::abi::token_manager::{FlowLimitCall, FlowLimitReturn};
use crate::evm::json_rpc::{ChainReader, Client};
use crate::evm::wallet::{EvmWallet, OfflineWallet, Wallet};
use crate::evm::{log_wallet_info, read_contract};
use crate::gas::GasPolicyResolver;
use crate::multisig::{MultisigProposal, SessionVotes, VotingGate};
use crate::prompt::{Prompt, StdinPrompt};
use crate::relayer::{HttpRelayer, RelayRequest, Relayer};
use crate::signed_tx::{SignedTransaction, SignedTxKey, SignedTxStore};
use crate::Error;

const AXELAR_GATEWAY: &str = "AxelarGateway";
const AXELAR_SERVICE_GOVERNANCE: &str = "AxelarServiceGovernance";
const INTERCHAIN_TOKEN_SERVICE: &str = "InterchainTokenService";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Display)]
#[strum(serialize_all = "camelCase")]
pub enum Action {
    /// Show the signer set and threshold
    Signers,
    SetTokenMintLimits,
    TransferMintLimiter,
    /// Withdraw native tokens held by the multisig
    Withdraw,
    /// Approve a proposal of the AxelarServiceGovernance contract
    ExecuteMultisigProposal,
    /// Set flow limits of interchain tokens, the multisig must be an ITS operator
    SetFlowLimits,
}

#[derive(clap::Args, Debug)]
pub struct Args {
    #[clap(flatten)]
    pub batch: BatchArgs,

    #[arg(long, value_enum)]
    pub action: Action,

    /// Name of the multisig contract in the chains info
    #[arg(long, default_value = "Multisig")]
    pub contract_name: String,

    /// Address of the multisig, overrides the one in the chains info
    #[arg(long)]
    pub address: Option<String>,

    #[arg(long, value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// Interchain token ids, for `set-flow-limits`
    #[arg(long, value_delimiter = ',')]
    pub token_ids: Vec<String>,

    /// Mint or flow limits matching `--symbols` or `--token-ids`, in the tokens' smallest unit
    #[arg(long, value_delimiter = ',')]
    pub limits: Vec<String>,

    #[arg(long)]
    pub mint_limiter: Option<String>,

    #[arg(long)]
    pub recipient: Option<String>,

    /// Amount to withdraw, in ether
    #[arg(long)]
    pub withdraw_amount: Option<String>,

    #[arg(long)]
    pub target: Option<String>,

    #[arg(long)]
    pub calldata: Option<String>,

    /// Native value forwarded with the proposal call, in wei
    #[arg(long, default_value = "0")]
    pub native_value: String,

    #[arg(long)]
    pub gas_options: Option<String>,

    /// Sign the transaction and store it instead of sending it
    #[arg(long)]
    pub offline: bool,

    /// Nonce of the offline transaction
    #[arg(long)]
    pub nonce: Option<u64>,

    /// Hand the transaction to the relayer instead of sending it from the wallet
    #[arg(long)]
    pub relay: bool,
}

/// The call to vote on, resolved per chain since the contract addresses differ.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Operation {
    SetTokenMintLimits {
        symbols: Vec<String>,
        limits: Vec<U256>,
    },
    TransferMintLimiter(Address),
    Withdraw {
        recipient: Address,
        amount: U256,
    },
    ExecuteMultisigProposal {
        target: Address,
        calldata: Bytes,
        value: U256,
    },
    SetFlowLimits {
        token_ids: Vec<H256>,
        limits: Vec<U256>,
    },
}

pub async fn run(config: Config, args: Args) -> Result<Option<String>, Error> {
    let mut store = open_store(&config, &args.batch.env)?;
    let processor = args.batch.processor(&config);

    if args.offline && (args.nonce.is_none() || args.action == Action::Signers) {
        bail!(Error::InvalidInput(
            "offline mode needs --nonce and a transaction".to_string()
        ));
    }
    if args.relay && config.relayer_api.is_none() {
        bail!(Error::InvalidInput("relayer_api is not configured".to_string()));
    }

    let action = MultisigAction {
        action: args.action,
        operation: operation(&args)?,
        contract_name: args.contract_name.clone(),
        address: args
            .address
            .as_deref()
            .map(|address| parse_address("address", address))
            .transpose()?,
        gas_options: parse_gas_options(args.gas_options.as_deref())?,
        offline: args.offline,
        nonce: args.nonce,
        relay: args.relay,
        env: args.batch.env.clone(),
        signer: args.batch.signer()?,
        config: config.clone(),
        prompt: Box::new(StdinPrompt::new(args.batch.yes)),
        votes: Arc::default(),
    };

    let result = processor
        .run(&mut store, action)
        .await
        .change_context(Error::Batch)?;

    summarize(&format!("multisig {}", args.action), result)
}

fn operation(args: &Args) -> Result<Option<Operation>, Error> {
    let required = |name: &str, value: &Option<String>| {
        value
            .clone()
            .ok_or_else(|| report!(Error::InvalidInput(format!("--{name} is required"))))
    };

    let operation = match args.action {
        Action::Signers => return Ok(None),
        Action::SetTokenMintLimits => {
            if args.symbols.is_empty() || args.symbols.len() != args.limits.len() {
                bail!(Error::InvalidInput(
                    "--symbols and --limits must have the same number of entries".to_string()
                ));
            }

            Operation::SetTokenMintLimits {
                symbols: args.symbols.iter().map(|s| s.trim().to_string()).collect(),
                limits: args
                    .limits
                    .iter()
                    .map(|limit| parse_uint("limits", limit))
                    .collect::<Result<_, _>>()?,
            }
        }
        Action::TransferMintLimiter => Operation::TransferMintLimiter(parse_address(
            "mint-limiter",
            &required("mint-limiter", &args.mint_limiter)?,
        )?),
        Action::Withdraw => {
            let amount = required("withdraw-amount", &args.withdraw_amount)?;

            Operation::Withdraw {
                recipient: parse_address("recipient", &required("recipient", &args.recipient)?)?,
                amount: parse_ether(amount.trim())
                    .change_context(Error::InvalidInput("withdraw-amount".to_string()))
                    .attach_printable(amount)?,
            }
        }
        Action::ExecuteMultisigProposal => {
            let calldata = required("calldata", &args.calldata)?;

            Operation::ExecuteMultisigProposal {
                target: parse_address("target", &required("target", &args.target)?)?,
                calldata: Bytes::from_str(calldata.trim())
                    .change_context(Error::InvalidInput("calldata".to_string()))
                    .attach_printable(calldata)?,
                value: parse_uint("native-value", &args.native_value)?,
            }
        }
        Action::SetFlowLimits => {
            if args.token_ids.is_empty() || args.token_ids.len() != args.limits.len() {
                bail!(Error::InvalidInput(
                    "--token-ids and --limits must have the same number of entries".to_string()
                ));
            }

            Operation::SetFlowLimits {
                token_ids: args
                    .token_ids
                    .iter()
                    .map(|token_id| {
                        H256::from_str(token_id.trim())
                            .change_context(Error::InvalidInput("token-ids".to_string()))
                            .attach_printable_lazy(|| token_id.clone())
                    })
                    .collect::<Result<_, _>>()?,
                limits: args
                    .limits
                    .iter()
                    .map(|limit| parse_uint("limits", limit))
                    .collect::<Result<_, _>>()?,
            }
        }
    };

    Ok(Some(operation))
}

fn parse_uint(name: &str, value: &str) -> Result<U256, Error> {
    U256::from_dec_str(value.trim())
        .change_context(Error::InvalidInput(name.to_string()))
        .attach_printable_lazy(|| value.to_string())
}

pub struct MultisigAction {
    action: Action,
    operation: Option<Operation>,
    contract_name: String,
    address: Option<Address>,
    gas_options: Option<RawGasOptions>,
    offline: bool,
    nonce: Option<u64>,
    relay: bool,
    env: String,
    signer: LocalWallet,
    config: Config,
    prompt: Box<dyn Prompt>,
    votes: Arc<SessionVotes>,
}

impl MultisigAction {
    /// Address of the contract that counts the votes. Governance proposals are voted on at the
    /// governance contract itself.
    fn voting_contract(&self, chain: &ChainConfig) -> Result<Address, Error> {
        let name = match self.operation {
            Some(Operation::ExecuteMultisigProposal { .. }) => AXELAR_SERVICE_GOVERNANCE,
            _ => self.contract_name.as_str(),
        };

        self.address
            .or_else(|| chain.contract(name).and_then(|record| record.address))
            .ok_or_else(|| report!(Error::InvalidInput(format!("missing {name} address"))))
            .attach_printable_lazy(|| chain.name.clone())
    }

    fn proposal(&self, chain: &ChainConfig, operation: &Operation) -> Result<MultisigProposal, Error> {
        let address_of = |name: &str| {
            chain
                .contract(name)
                .and_then(|record| record.address)
                .ok_or_else(|| report!(Error::InvalidInput(format!("missing {name} address"))))
        };
        let gateway = || address_of(AXELAR_GATEWAY);

        Ok(match operation {
            Operation::SetTokenMintLimits { symbols, limits } => {
                MultisigProposal::set_token_mint_limits(gateway()?, symbols.clone(), limits.clone())
            }
            Operation::TransferMintLimiter(new_mint_limiter) => {
                MultisigProposal::transfer_mint_limiter(gateway()?, *new_mint_limiter)
            }
            Operation::Withdraw { recipient, amount } => {
                MultisigProposal::withdraw(*recipient, *amount)
            }
            Operation::ExecuteMultisigProposal {
                target,
                calldata,
                value,
            } => MultisigProposal::execute_multisig_proposal(*target, calldata.clone(), *value),
            Operation::SetFlowLimits { token_ids, limits } => MultisigProposal::set_flow_limits(
                address_of(INTERCHAIN_TOKEN_SERVICE)?,
                token_ids.clone(),
                limits.clone(),
            ),
        })
    }

    /// Logs and checks the on-chain state the proposal depends on.
    async fn inspect<R>(
        &self,
        reader: &R,
        chain: &ChainConfig,
        contract: Address,
        proposal: &MultisigProposal,
    ) -> Result<(), Error>
    where
        R: ChainReader,
    {
        match &self.operation {
            Some(Operation::SetTokenMintLimits { symbols, limits }) => {
                for (symbol, limit) in symbols.iter().zip(limits) {
                    let TokenAddressesReturn(token) = read_contract(
                        reader,
                        proposal.target,
                        TokenAddressesCall {
                            symbol: symbol.clone(),
                        },
                    )
                    .await
                    .change_context(Error::Network(chain.name.clone()))?;
                    let TokenMintLimitReturn(current) = read_contract(
                        reader,
                        proposal.target,
                        TokenMintLimitCall {
                            symbol: symbol.clone(),
                        },
                    )
                    .await
                    .change_context(Error::Network(chain.name.clone()))?;

                    if token.is_zero() {
                        warn!(chain = chain.name, symbol, "token is not registered at the gateway");
                    }
                    info!(
                        chain = chain.name,
                        symbol,
                        token = to_checksum(&token, None),
                        current_limit = %current,
                        new_limit = %limit,
                        "token mint limit"
                    );
                }
            }
            Some(Operation::Withdraw { amount, .. }) => {
                let balance = reader
                    .balance(contract)
                    .await
                    .change_context(Error::Network(chain.name.clone()))?;
                if balance < *amount {
                    return Err(report!(Error::InvalidInput("withdraw-amount".to_string())))
                        .attach_printable(format!(
                            "contract balance {} is lower than the withdraw amount {}",
                            format_ether(balance),
                            format_ether(*amount)
                        ));
                }
            }
            Some(Operation::ExecuteMultisigProposal { value, .. }) => {
                let balance = reader
                    .balance(contract)
                    .await
                    .change_context(Error::Network(chain.name.clone()))?;
                if balance < *value {
                    return Err(report!(Error::InvalidInput("native-value".to_string())))
                        .attach_printable(format!(
                            "{AXELAR_SERVICE_GOVERNANCE} balance {} is lower than the native value {}",
                            format_ether(balance),
                            format_ether(*value)
                        ));
                }
            }
            Some(Operation::SetFlowLimits { token_ids, limits }) => {
                let its = proposal.target;
                let IsOperatorReturn(is_operator) =
                    read_contract(reader, its, IsOperatorCall { addr: contract })
                        .await
                        .change_context(Error::Network(chain.name.clone()))?;
                if !is_operator {
                    return Err(report!(Error::Multisig)).attach_printable(format!(
                        "multisig {} is not an operator of {INTERCHAIN_TOKEN_SERVICE}",
                        to_checksum(&contract, None)
                    ));
                }

                for (token_id, limit) in token_ids.iter().zip(limits) {
                    let ValidTokenManagerAddressReturn(token_manager) = read_contract(
                        reader,
                        its,
                        ValidTokenManagerAddressCall {
                            token_id: token_id.0,
                        },
                    )
                    .await
                    .change_context(Error::Network(chain.name.clone()))?;
                    let FlowLimitReturn(current) =
                        read_contract(reader, token_manager, FlowLimitCall)
                            .await
                            .change_context(Error::Network(chain.name.clone()))?;

                    info!(
                        chain = chain.name,
                        token_id = ?token_id,
                        token_manager = to_checksum(&token_manager, None),
                        current_limit = %current,
                        new_limit = %limit,
                        "token flow limit"
                    );
                }
            }
            Some(Operation::TransferMintLimiter(_)) | None => {}
        }

        Ok(())
    }

    async fn submit(
        &self,
        reader: Client<Http>,
        chain: &ChainConfig,
        contract: Address,
        proposal: &MultisigProposal,
    ) -> Result<(), Error> {
        let gas_options = GasPolicyResolver::new(reader)
            .resolve(
                chain,
                self.gas_options.as_ref(),
                Some(&self.contract_name),
                self.offline,
            )
            .await
            .change_context(Error::Gas)?;
        let calldata = proposal.encode();
        let mut tx = gas_options.transaction(Some(contract), calldata.clone(), U256::zero());

        if self.offline {
            let (Some(nonce), Some(chain_id)) = (self.nonce, chain.chain_id) else {
                bail!(Error::InvalidInput(format!(
                    "offline signing on {} needs a nonce and the chain id",
                    chain.name
                )));
            };
            tx.set_nonce(nonce);
            tx.set_chain_id(chain_id);

            let wallet = OfflineWallet::new(self.signer.clone(), chain_id);
            let signed = wallet.sign(tx.clone()).await.change_context(Error::Submission)?;
            let action = self.action.to_string();
            let key = SignedTxKey {
                env: &self.env,
                action: &action,
                chain_name: &chain.name,
                signer: wallet.address(),
                nonce,
            };
            let msg = format!(
                "This transaction will perform multisig action {action} on chain {}",
                chain.name
            );

            SignedTxStore::new(&self.config.signed_tx_dir)
                .store(&key, &SignedTransaction::pending(msg, tx, signed))
                .change_context(Error::Submission)?;

            return Ok(());
        }

        if self.relay {
            let Some(url) = self.config.relayer_api.clone() else {
                bail!(Error::InvalidInput("relayer_api is not configured".to_string()));
            };
            HttpRelayer::new(url)
                .relay(&RelayRequest::new(
                    &chain.axelar_id,
                    contract,
                    &calldata,
                    U256::zero(),
                ))
                .await
                .change_context(Error::Submission)?;

            return Ok(());
        }

        let wallet = EvmWallet::connect(&rpc_url(chain)?, self.signer.clone())
            .await
            .change_context(Error::Connection(chain.name.clone()))?;
        let tx_hash = wallet.send(tx).await.change_context(Error::Submission)?;
        info!(chain = chain.name, action = %self.action, tx_hash = ?tx_hash, "multisig transaction sent");

        confirm(&wallet, chain, tx_hash, self.config.confirmation_timeout).await
    }
}

#[async_trait]
impl ChainAction for MultisigAction {
    async fn run(&self, ctx: ChainContext<'_>) -> Result<(), Error> {
        let chain = &*ctx.chain;
        let contract = self.voting_contract(chain)?;
        let reader = chain_client(chain, &self.config)?;

        let Some(operation) = &self.operation else {
            VotingGate::new(reader)
                .signers(contract)
                .await
                .change_context(Error::Multisig)?;
            return Ok(());
        };
        let proposal = self.proposal(chain, operation)?;

        if matches!(operation, Operation::ExecuteMultisigProposal { calldata, .. } if calldata.is_empty())
        {
            warn!(chain = chain.name, "calldata of the multisig proposal is empty");
            if ctx.interactive
                && !self
                    .prompt
                    .confirm(&format!("Proceed with {} on {}?", self.action, chain.name))
            {
                info!(chain = chain.name, action = %self.action, "multisig action cancelled");
                return Ok(());
            }
        }

        if self.offline {
            return self.submit(reader, chain, contract, &proposal).await;
        }

        log_wallet_info(
            &reader,
            &chain.name,
            chain.token_symbol.as_deref(),
            self.signer.address(),
        )
        .await;
        self.inspect(&reader, chain, contract, &proposal).await?;

        let gate = VotingGate::new(reader.clone()).with_session(ctx.name, self.votes.clone());
        let verdict = gate
            .check(contract, &proposal, self.signer.address())
            .await
            .change_context(Error::Multisig)
            .attach_printable_lazy(|| chain.name.clone())?;

        if verdict.needs_confirmation()
            && ctx.interactive
            && !self
                .prompt
                .confirm(&format!("Proceed with {} on {}?", self.action, chain.name))
        {
            info!(chain = chain.name, action = %self.action, "multisig action cancelled");
            return Ok(());
        }

        self.submit(reader, chain, contract, &proposal).await?;
        gate.record_vote(contract, &proposal, self.signer.address());

        Ok(())
    }

    fn persists_state(&self) -> bool {
        false
    }
}
