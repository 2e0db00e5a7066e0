//! Runs one action across a selection of chains.
//!
//! Sequential runs process the chains in selection order and persist every processed chain before
//! moving on, so an aborted run can be resumed with `--start-from-chain`. Parallel runs give every
//! chain its own task working on a private copy of the chain; the results are merged into the
//! store once all tasks have finished.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chains_config::{ChainConfig, Fragments, Store};
use error_stack::{bail, report, Report, Result, ResultExt};
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use typed_builder::TypedBuilder;
use valuable::Valuable;

use crate::report::LoggableError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("chain {0} is not defined in the chains info")]
    UnknownChain(String),
    #[error("chain {0} is not an EVM chain")]
    NonEvmChain(String),
    #[error("no chains selected")]
    NoChainsSelected,
    #[error("invalid chain names {0}")]
    InvalidChainNames(String),
    #[error("failed to persist the state of chain {0}")]
    Persist(String),
}

const ALL_CHAINS: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainNames {
    /// Every EVM chain of the environment
    All,
    List(Vec<String>),
}

impl FromStr for ChainNames {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case(ALL_CHAINS) {
            return Ok(ChainNames::All);
        }

        let names = parse_names(s);
        if names.is_empty() {
            return Err(Error::InvalidChainNames(s.to_string()));
        }

        Ok(ChainNames::List(names))
    }
}

pub fn parse_names(s: &str) -> Vec<String> {
    s.split(',')
        .map(|name| name.trim().to_lowercase())
        .filter(|name| !name.is_empty())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selected {
    Process(String),
    Skip(String),
}

impl Selected {
    pub fn name(&self) -> &str {
        match self {
            Selected::Process(name) | Selected::Skip(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct ChainSelector {
    pub names: ChainNames,
    #[builder(default)]
    pub skip: Vec<String>,
    #[builder(default, setter(into, strip_option))]
    pub start_from: Option<String>,
}

impl ChainSelector {
    /// Resolves the selection against the chains of the environment, in processing order.
    pub fn select(&self, chains: &BTreeMap<String, ChainConfig>) -> Result<Vec<Selected>, Error> {
        let mut names = match &self.names {
            ChainNames::All => chains
                .iter()
                .filter(|(_, chain)| chain.is_evm())
                .map(|(name, _)| name.clone())
                .collect::<Vec<_>>(),
            ChainNames::List(names) => names
                .iter()
                .map(|name| match chains.get(name) {
                    None => bail!(Error::UnknownChain(name.clone())),
                    Some(chain) if !chain.is_evm() => bail!(Error::NonEvmChain(name.clone())),
                    Some(_) => Ok(name.clone()),
                })
                .collect::<Result<Vec<_>, _>>()?,
        };

        if let Some(start_from) = &self.start_from {
            let start_from = start_from.trim().to_lowercase();
            let position = names
                .iter()
                .position(|name| *name == start_from)
                .ok_or_else(|| report!(Error::UnknownChain(start_from.clone())))?;
            names.drain(..position);
        }

        let skip: Vec<_> = self.skip.iter().map(|name| name.trim().to_lowercase()).collect();
        let selection: Vec<_> = names
            .into_iter()
            .map(|name| {
                let deactivated = chains.get(&name).is_some_and(|chain| !chain.is_active());
                if skip.contains(&name) || deactivated {
                    Selected::Skip(name)
                } else {
                    Selected::Process(name)
                }
            })
            .collect();

        if !selection
            .iter()
            .any(|selected| matches!(selected, Selected::Process(_)))
        {
            bail!(Error::NoChainsSelected);
        }

        Ok(selection)
    }
}

pub struct ChainContext<'a> {
    /// Key of the chain in the chains info
    pub name: &'a str,
    pub chain: &'a mut ChainConfig,
    /// State of all chains when the run started
    pub chains: &'a BTreeMap<String, ChainConfig>,
    /// Whether the operator can be prompted
    pub interactive: bool,
}

/// The work done on each selected chain.
#[async_trait]
pub trait ChainAction: Send + Sync + 'static {
    async fn run(&self, ctx: ChainContext<'_>) -> Result<(), crate::Error>;

    /// Read-only actions return false, nothing is written back for them.
    fn persists_state(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainStatus {
    Success,
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainOutcome {
    pub chain: String,
    pub status: ChainStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    pub outcomes: Vec<ChainOutcome>,
    /// Chains whose state was written back to the store
    pub committed: Vec<String>,
    /// A failure stopped the run, or failed it as a whole
    pub aborted: bool,
}

impl BatchResult {
    pub fn failed(&self) -> impl Iterator<Item = &ChainOutcome> {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome.status, ChainStatus::Failed(_)))
    }

    fn push(&mut self, chain: &str, status: ChainStatus) {
        self.outcomes.push(ChainOutcome {
            chain: chain.to_string(),
            status,
        });
    }
}

#[derive(TypedBuilder)]
pub struct BatchProcessor {
    selector: ChainSelector,
    #[builder(default)]
    parallel: bool,
    #[builder(default)]
    ignore_errors: bool,
    #[builder(default = true)]
    interactive: bool,
    fragments: Fragments,
}

impl BatchProcessor {
    pub async fn run<A>(&self, store: &mut Store, action: A) -> Result<BatchResult, Error>
    where
        A: ChainAction,
    {
        let selection = self.selector.select(store.chains())?;
        let to_process = selection
            .iter()
            .filter(|selected| matches!(selected, Selected::Process(_)))
            .count();

        let result = if self.parallel && to_process > 1 {
            self.run_parallel(store, selection, Arc::new(action)).await?
        } else {
            self.run_sequential(store, selection, &action).await?
        };

        info!(
            processed = to_process,
            failed = result.failed().count(),
            committed = result.committed.len(),
            aborted = result.aborted,
            "batch finished"
        );

        Ok(result)
    }

    async fn run_sequential<A>(
        &self,
        store: &mut Store,
        selection: Vec<Selected>,
        action: &A,
    ) -> Result<BatchResult, Error>
    where
        A: ChainAction,
    {
        let mut result = BatchResult::default();

        for selected in selection {
            let name = match selected {
                Selected::Skip(name) => {
                    info!(chain = name, "skipping chain");
                    result.push(&name, ChainStatus::Skipped);
                    continue;
                }
                Selected::Process(name) => name,
            };

            let mut chain = store
                .chain(&name)
                .cloned()
                .ok_or_else(|| report!(Error::UnknownChain(name.clone())))?;

            info!(chain = name, "processing chain");
            let outcome = action
                .run(ChainContext {
                    name: &name,
                    chain: &mut chain,
                    chains: store.chains(),
                    interactive: self.interactive,
                })
                .await;

            let failed = outcome.is_err();
            match outcome {
                Ok(()) => result.push(&name, ChainStatus::Success),
                Err(err) => {
                    log_failure(&name, &err);
                    result.push(&name, ChainStatus::Failed(err.current_context().to_string()));
                }
            }

            if failed && !self.ignore_errors {
                result.aborted = true;
                break;
            }

            if action.persists_state() {
                store
                    .commit(&name, chain)
                    .change_context_lazy(|| Error::Persist(name.clone()))?;
                result.committed.push(name);
            }
        }

        Ok(result)
    }

    async fn run_parallel<A>(
        &self,
        store: &mut Store,
        selection: Vec<Selected>,
        action: Arc<A>,
    ) -> Result<BatchResult, Error>
    where
        A: ChainAction,
    {
        let chains = Arc::new(store.chains().clone());
        let persists_state = action.persists_state();

        let mut workers = JoinSet::new();
        let mut worker_chains = HashMap::new();

        for selected in &selection {
            let Selected::Process(name) = selected else {
                continue;
            };
            let Some(chain) = chains.get(name).cloned() else {
                bail!(Error::UnknownChain(name.clone()));
            };

            let worker = worker(
                name.clone(),
                chain,
                chains.clone(),
                action.clone(),
                persists_state.then(|| self.fragments.clone()),
            );
            let handle = workers.spawn(worker);
            worker_chains.insert(handle.id(), name.clone());

            info!(chain = name, "spawned worker");
        }

        let mut statuses = HashMap::new();
        while let Some(joined) = workers.join_next_with_id().await {
            let (name, status) = match joined {
                Ok((id, Ok(()))) => (worker_chains.get(&id), ChainStatus::Success),
                Ok((id, Err(err))) => {
                    let name = worker_chains.get(&id);
                    log_failure(name.map_or("unknown", String::as_str), &err);
                    (name, ChainStatus::Failed(err.current_context().to_string()))
                }
                Err(err) => {
                    let name = worker_chains.get(&err.id());
                    error!(chain = name, "worker panicked");
                    (name, ChainStatus::Failed("worker panicked".to_string()))
                }
            };

            if let Some(name) = name {
                statuses.insert(name.clone(), status);
            }
        }

        let mut result = BatchResult::default();
        for selected in &selection {
            let status = match selected {
                Selected::Skip(_) => ChainStatus::Skipped,
                Selected::Process(name) => statuses
                    .remove(name)
                    .unwrap_or_else(|| ChainStatus::Failed("worker did not report".to_string())),
            };
            result.push(selected.name(), status);
        }

        if persists_state {
            self.merge_fragments(store, &mut result)?;
        }

        result.aborted = !self.ignore_errors && result.failed().next().is_some();

        Ok(result)
    }

    /// Stages the fragment of every successful chain and flushes them at once. A chain whose
    /// fragment cannot be read is marked as failed and keeps its state from before the run.
    fn merge_fragments(&self, store: &mut Store, result: &mut BatchResult) -> Result<(), Error> {
        for outcome in result
            .outcomes
            .iter_mut()
            .filter(|outcome| outcome.status == ChainStatus::Success)
        {
            match self.fragments.read(&outcome.chain) {
                Ok(chain) => {
                    store.stage(&outcome.chain, chain);
                    result.committed.push(outcome.chain.clone());
                }
                Err(err) => {
                    error!(
                        chain = outcome.chain,
                        err = LoggableError::from(&err).as_value(),
                        "failed to read chain fragment"
                    );
                    outcome.status = ChainStatus::Failed(err.current_context().to_string());
                }
            }
        }

        if result.committed.is_empty() {
            return Ok(());
        }

        store
            .flush()
            .change_context_lazy(|| Error::Persist(result.committed.join(",")))?;

        for name in &result.committed {
            if let Err(err) = self.fragments.remove(name) {
                warn!(chain = name, err = %err, "failed to remove chain fragment");
            }
        }

        Ok(())
    }
}

async fn worker<A>(
    name: String,
    mut chain: ChainConfig,
    chains: Arc<BTreeMap<String, ChainConfig>>,
    action: Arc<A>,
    fragments: Option<Fragments>,
) -> Result<(), crate::Error>
where
    A: ChainAction,
{
    action
        .run(ChainContext {
            name: &name,
            chain: &mut chain,
            chains: &chains,
            interactive: false,
        })
        .await?;

    if let Some(fragments) = fragments {
        fragments
            .write(&name, &chain)
            .change_context(crate::Error::Persist)?;
    }

    Ok(())
}

fn log_failure(chain: &str, err: &Report<crate::Error>) {
    error!(
        chain,
        err = LoggableError::from(err).as_value(),
        "action failed on chain"
    );
}
