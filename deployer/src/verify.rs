use std::path::PathBuf;

use async_trait::async_trait;
use error_stack::{report, Result, ResultExt};
use ethers::abi::Token;
use ethers::types::Address;
use ethers::utils::{hex, to_checksum};
use mockall::automock;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::process::Command;
use tracing::info;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to prepare the constructor arguments")]
    Arguments,
    #[error("failed to run the verifier")]
    Spawn,
    #[error("verification of {0:?} failed")]
    Failed(Address),
}

/// Publishes the source code of a deployed contract to the chain's block explorer.
#[automock]
#[async_trait]
pub trait SourceVerifier: Send + Sync {
    async fn verify(
        &self,
        chain_axelar_id: &str,
        contract_name: &str,
        address: Address,
        constructor_args: &[Token],
    ) -> Result<(), Error>;
}

/// Verifies through the `hardhat verify` task of the contracts project in the working directory.
pub struct HardhatVerifier {
    args_dir: PathBuf,
}

impl HardhatVerifier {
    pub fn new(args_dir: impl Into<PathBuf>) -> Self {
        HardhatVerifier {
            args_dir: args_dir.into(),
        }
    }
}

#[async_trait]
impl SourceVerifier for HardhatVerifier {
    async fn verify(
        &self,
        chain_axelar_id: &str,
        contract_name: &str,
        address: Address,
        constructor_args: &[Token],
    ) -> Result<(), Error> {
        let network = chain_axelar_id.to_lowercase();
        let checksum = to_checksum(&address, None);

        // arrays can't be passed on the command line, so the arguments go through a module file
        tokio::fs::create_dir_all(&self.args_dir)
            .await
            .change_context(Error::Arguments)?;
        let args_file = self
            .args_dir
            .join(format!("verify-{network}-{checksum}.js"));
        let args = Value::Array(constructor_args.iter().map(to_json).collect());
        tokio::fs::write(&args_file, format!("module.exports = {args};\n"))
            .await
            .change_context(Error::Arguments)?;

        info!(
            chain = chain_axelar_id,
            contract = contract_name,
            address = checksum,
            "verifying contract"
        );

        let output = Command::new("npx")
            .args(["hardhat", "verify", "--network", &network, "--constructor-args"])
            .arg(&args_file)
            .arg(&checksum)
            .output()
            .await
            .change_context(Error::Spawn)?;

        let _ = tokio::fs::remove_file(&args_file).await;

        if !output.status.success() {
            return Err(report!(Error::Failed(address))
                .attach_printable(String::from_utf8_lossy(&output.stderr).trim().to_string()));
        }

        Ok(())
    }
}

fn to_json(token: &Token) -> Value {
    match token {
        Token::Address(address) => json!(to_checksum(address, None)),
        Token::Uint(value) | Token::Int(value) => json!(value.to_string()),
        Token::Bool(value) => json!(value),
        Token::String(value) => json!(value),
        Token::Bytes(bytes) | Token::FixedBytes(bytes) => json!(format!("0x{}", hex::encode(bytes))),
        Token::Array(tokens) | Token::FixedArray(tokens) | Token::Tuple(tokens) => {
            Value::Array(tokens.iter().map(to_json).collect())
        }
    }
}
