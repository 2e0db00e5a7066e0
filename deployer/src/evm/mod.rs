pub mod abi;
pub mod json_rpc;
pub mod wallet;

use error_stack::{Result, ResultExt};
use ethers::abi::{AbiDecode, AbiEncode};
use ethers::types::{Address, U256};
use ethers::utils::{format_ether, to_checksum};
use thiserror::Error;
use tracing::{error, info};

use crate::evm::json_rpc::ChainReader;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CallError {
    #[error("contract call to {0:?} failed")]
    Network(Address),
    #[error("unexpected response from {0:?}")]
    InvalidResponse(Address),
}

/// Calls a view function of the contract at `to` and decodes its return value.
pub async fn read_contract<R, C, T>(reader: &R, to: Address, call: C) -> Result<T, CallError>
where
    R: ChainReader + ?Sized,
    C: AbiEncode,
    T: AbiDecode,
{
    let response = reader
        .call(to, call.encode().into())
        .await
        .change_context(CallError::Network(to))?;

    T::decode(response).change_context(CallError::InvalidResponse(to))
}

/// Logs the address, balance and nonce of the operator's wallet. A zero balance is reported as an
/// error but does not stop the action, since read-only actions don't need funds.
pub async fn log_wallet_info<R>(reader: &R, chain_name: &str, token_symbol: Option<&str>, address: Address)
where
    R: ChainReader + ?Sized,
{
    info!(chain = chain_name, address = to_checksum(&address, None), "wallet address");

    match reader.balance(address).await {
        Ok(balance) if balance == U256::zero() => {
            error!(chain = chain_name, "wallet balance is 0")
        }
        Ok(balance) => {
            let balance = format!("{} {}", format_ether(balance), token_symbol.unwrap_or_default());
            info!(chain = chain_name, balance = balance.trim(), "wallet balance")
        }
        Err(err) => error!(chain = chain_name, err = %err, "failed to query wallet balance"),
    }

    match reader.transaction_count(address).await {
        Ok(nonce) => info!(chain = chain_name, nonce = %nonce, "wallet nonce"),
        Err(err) => error!(chain = chain_name, err = %err, "failed to query wallet nonce"),
    }
}
