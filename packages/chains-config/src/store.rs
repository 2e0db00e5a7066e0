use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use error_stack::{Result, ResultExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::chain::ChainConfig;
use crate::error::Error;

/// Contents of the aggregate `<env>.json` file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainsInfo {
    #[serde(default)]
    pub chains: BTreeMap<String, ChainConfig>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// The aggregate chains info of one environment, backed by a file on disk.
///
/// Every chain is addressed by its lower-cased key in the `chains` map. The store is the only
/// writer of the aggregate file: changes go through [Store::commit] (write-through) or
/// [Store::stage] followed by a single [Store::flush].
#[derive(Debug)]
pub struct Store {
    path: PathBuf,
    info: ChainsInfo,
}

impl Store {
    pub fn path_for(dir: &Path, env: &str) -> PathBuf {
        dir.join(format!("{env}.json"))
    }

    pub fn open(dir: &Path, env: &str) -> Result<Self, Error> {
        let path = Self::path_for(dir, env);
        let info = read_json(&path)?;

        info!(path = %path.display(), "loaded chains info");

        Ok(Store { path, info })
    }

    pub fn new(path: PathBuf, info: ChainsInfo) -> Self {
        Store { path, info }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self) -> &ChainsInfo {
        &self.info
    }

    pub fn chains(&self) -> &BTreeMap<String, ChainConfig> {
        &self.info.chains
    }

    pub fn chain(&self, name: &str) -> Option<&ChainConfig> {
        self.info.chains.get(&name.to_lowercase())
    }

    /// Replaces the chain's configuration and durably rewrites the aggregate file.
    pub fn commit(&mut self, name: &str, chain: ChainConfig) -> Result<(), Error> {
        self.stage(name, chain);
        self.flush()
    }

    /// Replaces the chain's configuration in memory only.
    pub fn stage(&mut self, name: &str, chain: ChainConfig) {
        self.info.chains.insert(name.to_lowercase(), chain);
    }

    pub fn flush(&self) -> Result<(), Error> {
        debug!(path = %self.path.display(), "persisting chains info");

        write_json(&self.path, &self.info)
    }
}

/// Per-chain files written by parallel workers, named deterministically from the environment and
/// the chain name so the parent can find and merge them after all workers have finished.
#[derive(Debug, Clone)]
pub struct Fragments {
    dir: PathBuf,
    env: String,
}

impl Fragments {
    pub fn new(dir: impl Into<PathBuf>, env: impl Into<String>) -> Self {
        Fragments {
            dir: dir.into(),
            env: env.into(),
        }
    }

    pub fn path(&self, chain_name: &str) -> PathBuf {
        self.dir
            .join(format!("{}-{}.json", self.env, chain_name.to_lowercase()))
    }

    pub fn write(&self, chain_name: &str, chain: &ChainConfig) -> Result<(), Error> {
        write_json(&self.path(chain_name), chain)
    }

    pub fn read(&self, chain_name: &str) -> Result<ChainConfig, Error> {
        read_json(&self.path(chain_name))
    }

    pub fn remove(&self, chain_name: &str) -> Result<(), Error> {
        let path = self.path(chain_name);

        fs::remove_file(&path)
            .change_context(Error::Write)
            .attach_printable_lazy(|| path.display().to_string())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, Error> {
    let content = fs::read_to_string(path)
        .change_context(Error::Read)
        .attach_printable_lazy(|| path.display().to_string())?;

    serde_json::from_str(&content)
        .change_context(Error::Parse)
        .attach_printable_lazy(|| path.display().to_string())
}

// written to a temporary file first and renamed over the target
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), Error> {
    let mut content = serde_json::to_string_pretty(value).change_context(Error::Serialize)?;
    content.push('\n');

    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, content)
        .change_context(Error::Write)
        .attach_printable_lazy(|| tmp_path.display().to_string())?;

    fs::rename(&tmp_path, path)
        .change_context(Error::Write)
        .attach_printable_lazy(|| path.display().to_string())
}
