use std::path::{Path, PathBuf};
use std::time::Duration;

use ethers::types::H256;
use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

const CREATE_DEPLOY_ARTIFACT: &str = "./node_modules/@axelar-network/axelar-gmp-sdk-solidity/artifacts/contracts/deploy/CreateDeploy.sol/CreateDeploy.json";

#[derive(Deserialize, Serialize, Debug, PartialEq, Clone)]
#[serde(default)]
pub struct Config {
    /// Directory holding the `<env>.json` chains info files
    pub chains_info_dir: PathBuf,
    /// Directory for the per-chain files of parallel runs, defaults to `chains_info_dir`
    pub fragments_dir: Option<PathBuf>,
    pub signed_tx_dir: PathBuf,
    #[serde(with = "humantime_serde")]
    pub confirmation_timeout: Duration,
    pub rpc_retry: RpcRetry,
    /// Build artifact of the CreateDeploy proxy deployed by create3 factories
    pub create_deploy_artifact: PathBuf,
    /// Overrides the code hash derived from `create_deploy_artifact`
    pub create_deploy_code_hash: Option<H256>,
    pub relayer_api: Option<url::Url>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chains_info_dir: PathBuf::from("./axelar-chains-config/info"),
            fragments_dir: None,
            signed_tx_dir: PathBuf::from("./tx"),
            confirmation_timeout: Duration::from_secs(60),
            rpc_retry: RpcRetry::default(),
            create_deploy_artifact: PathBuf::from(CREATE_DEPLOY_ARTIFACT),
            create_deploy_code_hash: None,
            relayer_api: None,
        }
    }
}

impl Config {
    pub fn fragments_dir(&self) -> &Path {
        self.fragments_dir.as_deref().unwrap_or(&self.chains_info_dir)
    }
}

#[derive(Deserialize, Serialize, Debug, PartialEq, Eq, Clone, Copy)]
#[serde(default)]
pub struct RpcRetry {
    pub max_attempts: u64,
    #[serde(with = "humantime_serde")]
    pub delay: Duration,
}

impl Default for RpcRetry {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

impl RpcRetry {
    pub fn policy(&self) -> RetryPolicy {
        if self.max_attempts <= 1 {
            return RetryPolicy::NoRetry;
        }

        RetryPolicy::RepeatConstant {
            sleep: self.delay,
            max_attempts: self.max_attempts,
        }
    }
}
