use std::str::FromStr;

use async_trait::async_trait;
use error_stack::{report, Result, ResultExt};
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, PendingTransaction, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionReceipt, H256};
use mockall::automock;
use thiserror::Error;

use crate::url::Url;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid private key")]
    InvalidKey,
    #[error("failed to connect to the rpc endpoint")]
    Connection,
    #[error("failed to send transaction")]
    Send,
    #[error("failed to sign transaction")]
    Sign,
    #[error("failed to wait for the transaction receipt")]
    Receipt,
    #[error("transaction {0:?} was dropped from the mempool")]
    Dropped(H256),
}

/// The operator's signing identity on one chain.
#[automock]
#[async_trait]
pub trait Wallet: Send + Sync {
    fn address(&self) -> Address;
    /// Broadcasts the transaction, filling in nonce, gas and fees that are not set, and returns its hash.
    async fn send(&self, tx: TypedTransaction) -> Result<H256, Error>;
    /// Signs the transaction as is and returns the raw signed transaction.
    async fn sign(&self, tx: TypedTransaction) -> Result<Bytes, Error>;
    async fn wait_for_confirmations(
        &self,
        tx_hash: H256,
        confirmations: usize,
    ) -> Result<TransactionReceipt, Error>;
}

pub fn signer_from_key(private_key: &str) -> Result<LocalWallet, Error> {
    LocalWallet::from_str(private_key.trim().trim_start_matches("0x"))
        .change_context(Error::InvalidKey)
}

/// Wallet that only signs locally and never touches the network.
pub struct OfflineWallet {
    signer: LocalWallet,
}

impl OfflineWallet {
    pub fn new(signer: LocalWallet, chain_id: u64) -> Self {
        OfflineWallet {
            signer: signer.with_chain_id(chain_id),
        }
    }
}

#[async_trait]
impl Wallet for OfflineWallet {
    fn address(&self) -> Address {
        self.signer.address()
    }

    async fn send(&self, _tx: TypedTransaction) -> Result<H256, Error> {
        Err(report!(Error::Send)).attach_printable("transactions cannot be sent in offline mode")
    }

    async fn sign(&self, tx: TypedTransaction) -> Result<Bytes, Error> {
        let signature = self
            .signer
            .sign_transaction(&tx)
            .await
            .change_context(Error::Sign)?;

        Ok(tx.rlp_signed(&signature))
    }

    async fn wait_for_confirmations(
        &self,
        tx_hash: H256,
        _confirmations: usize,
    ) -> Result<TransactionReceipt, Error> {
        Err(report!(Error::Receipt)).attach_printable(format!(
            "cannot wait for {tx_hash:?} in offline mode"
        ))
    }
}

pub struct EvmWallet {
    client: SignerMiddleware<Provider<Http>, LocalWallet>,
}

impl EvmWallet {
    /// Connects the signer to the chain behind `url`, using the chain id reported by the endpoint.
    pub async fn connect(url: &Url, signer: LocalWallet) -> Result<Self, Error> {
        let provider = Provider::new(Http::new(url.to_standard_url()));
        let client = SignerMiddleware::new_with_provider_chain(provider, signer)
            .await
            .change_context(Error::Connection)
            .attach_printable_lazy(|| url.to_string())?;

        Ok(EvmWallet { client })
    }
}

#[async_trait]
impl Wallet for EvmWallet {
    fn address(&self) -> Address {
        self.client.address()
    }

    async fn send(&self, tx: TypedTransaction) -> Result<H256, Error> {
        self.client
            .send_transaction(tx, None)
            .await
            .map(|pending| pending.tx_hash())
            .change_context(Error::Send)
    }

    async fn sign(&self, tx: TypedTransaction) -> Result<Bytes, Error> {
        let signature = self
            .client
            .signer()
            .sign_transaction(&tx)
            .await
            .change_context(Error::Sign)?;

        Ok(tx.rlp_signed(&signature))
    }

    async fn wait_for_confirmations(
        &self,
        tx_hash: H256,
        confirmations: usize,
    ) -> Result<TransactionReceipt, Error> {
        PendingTransaction::new(tx_hash, self.client.provider())
            .confirmations(confirmations)
            .await
            .change_context(Error::Receipt)?
            .ok_or_else(|| report!(Error::Dropped(tx_hash)))
    }
}

#[cfg(test)]
mod tests {
    use ethers::signers::Signer;
    use ethers::types::{TransactionRequest, U256};
    use ethers::utils::to_checksum;

    use super::{signer_from_key, OfflineWallet, Wallet};

    // well-known development key, never use it on a real network
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn signer_should_accept_keys_with_and_without_prefix() {
        let with_prefix = signer_from_key(DEV_KEY).unwrap();
        let without_prefix = signer_from_key(DEV_KEY.trim_start_matches("0x")).unwrap();

        assert_eq!(
            to_checksum(&with_prefix.address(), None),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
        );
        assert_eq!(with_prefix.address(), without_prefix.address());
    }

    #[test]
    fn signer_should_reject_invalid_keys() {
        assert!(signer_from_key("not a key").is_err());
    }

    #[tokio::test]
    async fn offline_wallet_should_sign_but_never_send() {
        let wallet = OfflineWallet::new(signer_from_key(DEV_KEY).unwrap(), 1);
        let tx = TransactionRequest::new()
            .to(wallet.address())
            .value(U256::from(1u64))
            .nonce(0u64)
            .gas(21000u64)
            .gas_price(1_000_000_000u64)
            .chain_id(1u64);

        let signed = wallet.sign(tx.clone().into()).await.unwrap();
        assert!(!signed.is_empty());

        assert!(wallet.send(tx.into()).await.is_err());
    }
}
