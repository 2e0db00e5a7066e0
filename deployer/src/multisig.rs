//! Pre-submission checks for threshold-gated multisig actions.
//!
//! Every signer submits the same call, and the multisig executes it once the number of votes on
//! its topic reaches the threshold. The gate tells the operator what a vote is going to do before
//! it is cast.

use std::collections::HashSet;
use std::fmt::{self, Display, Formatter};
use std::sync::{Arc, Mutex};

use error_stack::{bail, Result, ResultExt};
use ethers::abi::AbiEncode;
use ethers::types::{Address, Bytes, H256, U256};
use ethers::utils::{keccak256, to_checksum};
use thiserror::Error;
use tracing::{info, warn};

use crate::evm::abi::gateway::{SetTokenMintLimitsCall, TransferMintLimiterCall};
use crate::evm::abi::its::SetFlowLimitsCall;
use crate::evm::abi::multisig::{
    ExecuteContractCall, ExecuteMultisigProposalCall, GetSignerVotesCountCall,
    GetSignerVotesCountReturn, HasSignerVotedCall, HasSignerVotedReturn, IsSignerCall,
    IsSignerReturn, SignerAccountsCall, SignerAccountsReturn, SignerEpochCall, SignerEpochReturn,
    SignerThresholdCall, SignerThresholdReturn, WithdrawCall,
};
use crate::evm::json_rpc::ChainReader;
use crate::evm::read_contract;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("{0:?} is not an authorized multisig signer")]
    UnauthorizedSigner(Address),
    #[error("signer {signer:?} has already voted on proposal {topic:?}")]
    DuplicateVote { signer: Address, topic: H256 },
    #[error("failed to query the multisig contract")]
    Network,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalKind {
    ExecuteContract,
    Withdraw,
    ExecuteMultisigProposal,
}

impl Display for ProposalKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ProposalKind::ExecuteContract => write!(f, "executeContract"),
            ProposalKind::Withdraw => write!(f, "withdraw"),
            ProposalKind::ExecuteMultisigProposal => write!(f, "executeMultisigProposal"),
        }
    }
}

/// A call that is executed by the multisig once enough signers have submitted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultisigProposal {
    pub kind: ProposalKind,
    pub target: Address,
    pub calldata: Bytes,
    pub value: U256,
}

impl MultisigProposal {
    pub fn execute_contract(target: Address, calldata: Bytes, value: U256) -> Self {
        MultisigProposal {
            kind: ProposalKind::ExecuteContract,
            target,
            calldata,
            value,
        }
    }

    pub fn set_token_mint_limits(gateway: Address, symbols: Vec<String>, limits: Vec<U256>) -> Self {
        Self::execute_contract(
            gateway,
            SetTokenMintLimitsCall { symbols, limits }.encode().into(),
            U256::zero(),
        )
    }

    pub fn transfer_mint_limiter(gateway: Address, new_mint_limiter: Address) -> Self {
        Self::execute_contract(
            gateway,
            TransferMintLimiterCall { new_mint_limiter }.encode().into(),
            U256::zero(),
        )
    }

    pub fn set_flow_limits(its: Address, token_ids: Vec<H256>, limits: Vec<U256>) -> Self {
        Self::execute_contract(
            its,
            SetFlowLimitsCall {
                token_ids: token_ids.into_iter().map(|token_id| token_id.0).collect(),
                flow_limits: limits,
            }
            .encode()
            .into(),
            U256::zero(),
        )
    }

    pub fn withdraw(recipient: Address, amount: U256) -> Self {
        MultisigProposal {
            kind: ProposalKind::Withdraw,
            target: recipient,
            calldata: Bytes::new(),
            value: amount,
        }
    }

    pub fn execute_multisig_proposal(target: Address, calldata: Bytes, value: U256) -> Self {
        MultisigProposal {
            kind: ProposalKind::ExecuteMultisigProposal,
            target,
            calldata,
            value,
        }
    }

    /// Calldata of the multisig call that casts a vote on this proposal.
    pub fn encode(&self) -> Bytes {
        match self.kind {
            ProposalKind::ExecuteContract => ExecuteContractCall {
                target: self.target,
                call_data: self.calldata.clone(),
                native_value: self.value,
            }
            .encode(),
            ProposalKind::Withdraw => WithdrawCall {
                recipient: self.target,
                amount: self.value,
            }
            .encode(),
            ProposalKind::ExecuteMultisigProposal => ExecuteMultisigProposalCall {
                target: self.target,
                call_data: self.calldata.clone(),
                native_value: self.value,
            }
            .encode(),
        }
        .into()
    }

    /// Identifies the proposal on chain, votes are counted per topic.
    pub fn topic(&self) -> H256 {
        H256(keccak256(self.encode()))
    }

    /// Native value the multisig contract needs to hold for the proposal to execute.
    pub fn required_balance(&self) -> U256 {
        self.value
    }
}

/// Consequence of the next vote on a proposal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GateVerdict {
    /// No votes yet, the vote opens a new proposal
    pub requires_new_proposal: bool,
    /// One vote short of the threshold, the vote executes the proposal
    pub approaches_quorum: bool,
    pub already_voted: bool,
}

impl GateVerdict {
    pub fn needs_confirmation(&self) -> bool {
        self.requires_new_proposal || self.approaches_quorum
    }
}

pub fn classify(votes: U256, threshold: U256, has_voted: bool) -> GateVerdict {
    GateVerdict {
        requires_new_proposal: votes.is_zero(),
        approaches_quorum: threshold.checked_sub(U256::one()) == Some(votes),
        already_voted: has_voted,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerSet {
    pub epoch: U256,
    pub threshold: U256,
    pub signers: Vec<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Vote {
    chain: String,
    contract: Address,
    topic: H256,
    signer: Address,
}

/// Votes submitted during this run, shared by the gates of all chains. The chain is part of the
/// key since the same multisig address exists on many chains.
#[derive(Debug, Default)]
pub struct SessionVotes(Mutex<HashSet<Vote>>);

impl SessionVotes {
    fn contains(&self, vote: &Vote) -> bool {
        self.0
            .lock()
            .map(|votes| votes.contains(vote))
            .unwrap_or(false)
    }

    fn insert(&self, vote: Vote) {
        if let Ok(mut votes) = self.0.lock() {
            votes.insert(vote);
        }
    }
}

/// Classifies votes before they are submitted. Advisory only, nothing is ever sent from here.
pub struct VotingGate<R> {
    reader: R,
    chain: String,
    votes: Arc<SessionVotes>,
}

impl<R> VotingGate<R>
where
    R: ChainReader,
{
    pub fn new(reader: R) -> Self {
        VotingGate {
            reader,
            chain: String::new(),
            votes: Arc::default(),
        }
    }

    /// Shares the votes submitted on other chains of the same run.
    pub fn with_session(mut self, chain: impl Into<String>, votes: Arc<SessionVotes>) -> Self {
        self.chain = chain.into();
        self.votes = votes;
        self
    }

    /// Remembers a vote once it has been submitted, so it is not cast twice in this run.
    pub fn record_vote(&self, contract: Address, proposal: &MultisigProposal, signer: Address) {
        self.votes.insert(self.vote(contract, proposal.topic(), signer));
    }

    pub async fn check(
        &self,
        contract: Address,
        proposal: &MultisigProposal,
        signer: Address,
    ) -> Result<GateVerdict, Error> {
        let IsSignerReturn(is_signer) = self
            .read(contract, IsSignerCall { account: signer })
            .await?;
        if !is_signer {
            bail!(Error::UnauthorizedSigner(signer));
        }

        let topic = proposal.topic();
        let GetSignerVotesCountReturn(votes) = self
            .read(contract, GetSignerVotesCountCall { topic: topic.0 })
            .await?;
        let HasSignerVotedReturn(has_voted) = self
            .read(
                contract,
                HasSignerVotedCall {
                    signer,
                    topic: topic.0,
                },
            )
            .await?;
        let SignerThresholdReturn(threshold) = self.read(contract, SignerThresholdCall).await?;

        let submitted = self.votes.contains(&self.vote(contract, topic, signer));
        let verdict = classify(votes, threshold, has_voted || submitted);
        if verdict.already_voted {
            bail!(Error::DuplicateVote { signer, topic });
        }

        info!(
            action = %proposal.kind,
            topic = ?topic,
            votes = %votes,
            threshold = %threshold,
            "multisig proposal status"
        );

        if verdict.requires_new_proposal {
            warn!(
                action = %proposal.kind,
                "the vote count for this topic is zero, this action will create a new multisig proposal"
            );
        }
        if verdict.approaches_quorum {
            warn!(
                action = %proposal.kind,
                "the vote count is one below the threshold, this action will execute the multisig proposal"
            );
        }

        Ok(verdict)
    }

    pub async fn signers(&self, contract: Address) -> Result<SignerSet, Error> {
        let SignerEpochReturn(epoch) = self.read(contract, SignerEpochCall).await?;
        let SignerThresholdReturn(threshold) = self.read(contract, SignerThresholdCall).await?;
        let SignerAccountsReturn(signers) = self.read(contract, SignerAccountsCall).await?;

        info!(
            contract = to_checksum(&contract, None),
            epoch = %epoch,
            threshold = %threshold,
            signers = signers
                .iter()
                .map(|signer| to_checksum(signer, None))
                .collect::<Vec<_>>()
                .join(","),
            "multisig signers"
        );

        Ok(SignerSet {
            epoch,
            threshold,
            signers,
        })
    }

    async fn read<C, T>(&self, contract: Address, call: C) -> Result<T, Error>
    where
        C: AbiEncode + Send,
        T: ethers::abi::AbiDecode,
    {
        read_contract(&self.reader, contract, call)
            .await
            .change_context(Error::Network)
    }

    fn vote(&self, contract: Address, topic: H256, signer: Address) -> Vote {
        Vote {
            chain: self.chain.clone(),
            contract,
            topic,
            signer,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::sync::Arc;

    use ethers::abi::{encode, Token};
    use ethers::contract::EthCall;
    use ethers::types::{Address, Bytes, H256, U256};
    use ethers::utils::{id, keccak256};
    use tracing_test::traced_test;

    use super::{
        classify, Error, GateVerdict, MultisigProposal, ProposalKind, SessionVotes, VotingGate,
    };
    use crate::evm::abi::multisig::{
        GetSignerVotesCountCall, HasSignerVotedCall, IsSignerCall, SignerAccountsCall,
        SignerEpochCall, SignerThresholdCall,
    };
    use crate::evm::json_rpc::MockChainReader;

    const MULTISIG: &str = "0x6f24A47Fc8AE5441Eb47EFfC3665e70e69Ac3F05";
    const SIGNER: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
    const GATEWAY: &str = "0x4F4495243837681061C4743b74B3eEdf548D56A5";

    fn address(s: &str) -> Address {
        Address::from_str(s).unwrap()
    }

    /// Multisig with the given on-chain state, answering every view call the gate makes.
    fn multisig(is_signer: bool, votes: u64, threshold: u64, has_voted: bool) -> MockChainReader {
        let mut reader = MockChainReader::new();
        reader.expect_call().returning(move |_, data| {
            let selector = &data[..4];
            let response = if selector == IsSignerCall::selector() {
                encode(&[Token::Bool(is_signer)])
            } else if selector == GetSignerVotesCountCall::selector() {
                encode(&[Token::Uint(U256::from(votes))])
            } else if selector == HasSignerVotedCall::selector() {
                encode(&[Token::Bool(has_voted)])
            } else if selector == SignerThresholdCall::selector() {
                encode(&[Token::Uint(U256::from(threshold))])
            } else if selector == SignerEpochCall::selector() {
                encode(&[Token::Uint(U256::from(3))])
            } else if selector == SignerAccountsCall::selector() {
                encode(&[Token::Array(vec![Token::Address(address(SIGNER))])])
            } else {
                panic!("unexpected call")
            };

            Ok(Bytes::from(response))
        });

        reader
    }

    fn proposal() -> MultisigProposal {
        MultisigProposal::transfer_mint_limiter(address(GATEWAY), address(SIGNER))
    }

    #[test]
    fn classify_should_flag_the_consequence_of_a_vote() {
        let cases = [
            (0, 3, false, true, false),
            (2, 3, false, false, true),
            (0, 2, false, true, false),
            (1, 2, false, false, true),
            (0, 1, false, true, true),
            (1, 3, false, false, false),
            (2, 2, false, false, false),
        ];

        for (votes, threshold, has_voted, requires_new_proposal, approaches_quorum) in cases {
            assert_eq!(
                classify(U256::from(votes), U256::from(threshold), has_voted),
                GateVerdict {
                    requires_new_proposal,
                    approaches_quorum,
                    already_voted: false
                }
            );
        }

        assert!(classify(U256::one(), U256::from(3), true).already_voted);
        assert!(!classify(U256::zero(), U256::zero(), false).approaches_quorum);
    }

    #[test]
    fn topic_should_hash_the_multisig_call() {
        let withdraw = MultisigProposal::withdraw(address(SIGNER), U256::from(10));

        let encoded = withdraw.encode();
        assert_eq!(&encoded[..4], &id("withdraw(address,uint256)"));
        assert_eq!(withdraw.topic().0, keccak256(&encoded));

        let execute = MultisigProposal::execute_contract(address(GATEWAY), Bytes::new(), U256::zero());
        assert_eq!(
            &execute.encode()[..4],
            &id("executeContract(address,bytes,uint256)")
        );
        assert_eq!(execute.kind, ProposalKind::ExecuteContract);

        let governance =
            MultisigProposal::execute_multisig_proposal(address(GATEWAY), Bytes::new(), U256::zero());
        assert_ne!(governance.topic(), execute.topic());
    }

    #[test]
    fn gateway_proposals_should_wrap_the_gateway_call() {
        let proposal = MultisigProposal::set_token_mint_limits(
            address(GATEWAY),
            vec!["USDC".to_string()],
            vec![U256::from(1000)],
        );

        assert_eq!(proposal.target, address(GATEWAY));
        assert_eq!(proposal.value, U256::zero());
        assert_eq!(
            &proposal.calldata[..4],
            &id("setTokenMintLimits(string[],uint256[])")
        );

        let flow_limits = MultisigProposal::set_flow_limits(
            address(GATEWAY),
            vec![H256::repeat_byte(1)],
            vec![U256::from(10)],
        );
        assert_eq!(flow_limits.kind, ProposalKind::ExecuteContract);
        assert_eq!(
            &flow_limits.calldata[..4],
            &id("setFlowLimits(bytes32[],uint256[])")
        );
    }

    #[tokio::test]
    async fn non_signers_should_be_rejected() {
        let gate = VotingGate::new(multisig(false, 0, 2, false));

        let err = gate
            .check(address(MULTISIG), &proposal(), address(SIGNER))
            .await
            .unwrap_err();

        assert_eq!(
            err.current_context(),
            &Error::UnauthorizedSigner(address(SIGNER))
        );
    }

    #[tokio::test]
    async fn votes_already_cast_on_chain_should_be_rejected() {
        let gate = VotingGate::new(multisig(true, 1, 2, true));

        let err = gate
            .check(address(MULTISIG), &proposal(), address(SIGNER))
            .await
            .unwrap_err();

        assert_eq!(
            err.current_context(),
            &Error::DuplicateVote {
                signer: address(SIGNER),
                topic: proposal().topic()
            }
        );
    }

    #[tokio::test]
    async fn second_vote_in_the_same_session_should_be_rejected() {
        let gate = VotingGate::new(multisig(true, 1, 3, false));

        let verdict = gate
            .check(address(MULTISIG), &proposal(), address(SIGNER))
            .await
            .unwrap();
        assert_eq!(verdict, GateVerdict::default());
        assert!(!verdict.needs_confirmation());

        // a vote that was checked but never submitted can be checked again
        assert!(gate
            .check(address(MULTISIG), &proposal(), address(SIGNER))
            .await
            .is_ok());

        gate.record_vote(address(MULTISIG), &proposal(), address(SIGNER));
        let err = gate
            .check(address(MULTISIG), &proposal(), address(SIGNER))
            .await
            .unwrap_err();
        assert!(matches!(
            err.current_context(),
            Error::DuplicateVote { .. }
        ));

        let other = MultisigProposal::transfer_mint_limiter(address(GATEWAY), address(MULTISIG));
        assert!(gate
            .check(address(MULTISIG), &other, address(SIGNER))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn session_votes_should_be_kept_per_chain() {
        let votes = Arc::new(SessionVotes::default());
        let avalanche =
            VotingGate::new(multisig(true, 1, 3, false)).with_session("avalanche", votes.clone());
        let fantom = VotingGate::new(multisig(true, 1, 3, false)).with_session("fantom", votes);

        avalanche.record_vote(address(MULTISIG), &proposal(), address(SIGNER));

        assert!(fantom
            .check(address(MULTISIG), &proposal(), address(SIGNER))
            .await
            .is_ok());
        assert!(avalanche
            .check(address(MULTISIG), &proposal(), address(SIGNER))
            .await
            .is_err());
        assert!(avalanche
            .check(address(GATEWAY), &proposal(), address(SIGNER))
            .await
            .is_ok());
    }

    #[tokio::test]
    #[traced_test]
    async fn first_and_last_votes_should_be_flagged() {
        let gate = VotingGate::new(multisig(true, 0, 1, false));

        let verdict = gate
            .check(address(MULTISIG), &proposal(), address(SIGNER))
            .await
            .unwrap();

        assert!(verdict.requires_new_proposal);
        assert!(verdict.approaches_quorum);
        assert!(verdict.needs_confirmation());
        assert!(logs_contain("will create a new multisig proposal"));
        assert!(logs_contain("will execute the multisig proposal"));
    }

    #[tokio::test]
    async fn signers_should_be_read_from_the_contract() {
        let gate = VotingGate::new(multisig(true, 0, 2, false));

        let signers = gate.signers(address(MULTISIG)).await.unwrap();

        assert_eq!(signers.epoch, U256::from(3));
        assert_eq!(signers.threshold, U256::from(2));
        assert_eq!(signers.signers, vec![address(SIGNER)]);
    }
}
