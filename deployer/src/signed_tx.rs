//! Signed transactions produced in offline mode, stored until they are broadcast from a connected
//! machine.

use std::fs;
use std::path::{Path, PathBuf};

use error_stack::{Result, ResultExt};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes};
use ethers::utils::to_checksum;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to serialize the signed transaction")]
    Serialize,
    #[error("failed to write the signed transaction file")]
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BroadcastStatus {
    Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTransaction {
    pub msg: String,
    pub unsigned_tx: TypedTransaction,
    pub signed_tx: Bytes,
    pub status: BroadcastStatus,
}

impl SignedTransaction {
    pub fn pending(msg: impl Into<String>, unsigned_tx: TypedTransaction, signed_tx: Bytes) -> Self {
        SignedTransaction {
            msg: msg.into(),
            unsigned_tx,
            signed_tx,
            status: BroadcastStatus::Pending,
        }
    }
}

/// Identifies a signed multisig transaction; two transactions with the same key overwrite each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTxKey<'a> {
    pub env: &'a str,
    pub action: &'a str,
    pub chain_name: &'a str,
    pub signer: Address,
    pub nonce: u64,
}

impl SignedTxKey<'_> {
    pub fn file_name(&self) -> String {
        format!(
            "signed-tx-{}-multisig-{}-{}-address-{}-nonce-{}.json",
            self.env,
            self.action,
            self.chain_name.to_lowercase(),
            to_checksum(&self.signer, None),
            self.nonce
        )
    }
}

pub struct SignedTxStore {
    dir: PathBuf,
}

impl SignedTxStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        SignedTxStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn store(&self, key: &SignedTxKey, tx: &SignedTransaction) -> Result<PathBuf, Error> {
        let path = self.dir.join(key.file_name());
        let content = serde_json::to_string_pretty(tx).change_context(Error::Serialize)?;

        fs::create_dir_all(&self.dir)
            .and_then(|_| fs::write(&path, content))
            .change_context(Error::Write)
            .attach_printable_lazy(|| path.display().to_string())?;

        info!(path = %path.display(), "stored signed transaction");

        Ok(path)
    }
}
