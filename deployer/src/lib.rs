pub mod address;
pub mod artifact;
pub mod batch;
pub mod commands;
pub mod config;
pub mod contracts;
pub mod deploy;
pub mod evm;
pub mod gas;
pub mod multisig;
pub mod prompt;
pub mod relayer;
pub mod report;
pub mod retry;
pub mod signed_tx;
pub mod url;
pub mod verify;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to load config, falling back on default")]
    LoadConfig,
    #[error("failed to load the chains info")]
    ChainsInfo,
    #[error("failed to persist the chains info")]
    Persist,
    #[error("failed to load the contract artifact")]
    Artifact,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("failed to connect to chain {0}")]
    Connection(String),
    #[error("rpc request failed on chain {0}")]
    Network(String),
    #[error("address prediction failed")]
    Prediction,
    #[error("failed to resolve gas options")]
    Gas,
    #[error("deployment failed")]
    Deployment,
    #[error("multisig pre-execution check failed")]
    Multisig,
    #[error("transaction submission failed")]
    Submission,
    #[error("batch execution failed")]
    Batch,
}
