// src/claims.rs
//! Claim lifecycle orchestration
//!
//! A claim wraps a proposed superblock for the duration of its
//! challenge window. The claim manager is the only writer of claims:
//! it opens them on proposal, registers challengers, spawns
//! verification game sessions, aggregates session outcomes into the
//! superblock state machine, and settles bonds exactly once per claim.

use crate::battle::{BattleManager, SessionOutcome};
use crate::deposits::DepositsManager;
use crate::error::RelayError;
use crate::events::{EventLog, RelayEvent};
use crate::merkle::MerkleTree;
use crate::superblocks::{calc_superblock_id, SuperblockChain, SuperblockStatus};
use crate::{Address, Hash, RelayConfig};
use borsh::{BorshDeserialize, BorshSerialize};
use std::collections::HashMap;

fn short(id: &Hash) -> String {
    hex::encode(&id[..8])
}

/// Claim state
#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum ClaimState {
    /// Challenge window open, no disputes yet
    Open,

    /// At least one challenger registered
    Challenged,

    /// Outcome fixed and bonds settled
    Decided,
}

/// Claim decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum ClaimDecision {
    /// Not decided yet
    Unset,

    /// Superblock survived
    Confirmed,

    /// Superblock thrown out
    Invalidated,
}

/// The pending-dispute wrapper around a proposed superblock
#[derive(Debug, Clone, BorshSerialize, BorshDeserialize)]
pub struct Claim {
    /// The superblock under this claim; claims are keyed by this id
    pub superblock_id: Hash,

    /// Proposing party
    pub submitter: Address,

    /// Challengers in registration order, no duplicates
    pub challengers: Vec<Address>,

    /// Bond locked per participant, submitter included
    pub bonded: HashMap<Address, u64>,

    /// Verification game session per challenger
    pub sessions: HashMap<Address, Hash>,

    /// Current state
    pub state: ClaimState,

    /// Fixed outcome once decided
    pub decision: ClaimDecision,

    /// Absolute end of the challenge window
    pub challenge_window_end: u64,

    /// On-record block hash commitment backing the merkle root
    pub block_hashes: Vec<Hash>,
}

/// Outcome of a superblock proposal
///
/// A rejected proposal is a reported event, not a hard failure;
/// callers inspect the variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposalOutcome {
    /// Superblock created and claim opened
    Created(Hash),

    /// Proposal rejected; the candidate id and the reason
    Rejected { superblock_id: Hash, error: RelayError },
}

impl ProposalOutcome {
    /// The created superblock id, if any
    pub fn id(&self) -> Option<Hash> {
        match self {
            ProposalOutcome::Created(id) => Some(*id),
            ProposalOutcome::Rejected { .. } => None,
        }
    }

    /// Whether the proposal was accepted
    pub fn is_created(&self) -> bool {
        matches!(self, ProposalOutcome::Created(_))
    }
}

/// Orchestrator for the whole relay: superblock chain, deposits,
/// verification games, and the claims tying them together
#[derive(Debug)]
pub struct ClaimManager {
    /// Protocol parameters
    config: RelayConfig,

    /// Superblock records and status machine
    chain: SuperblockChain,

    /// Bonded balances
    deposits: DepositsManager,

    /// Verification game sessions
    battles: BattleManager,

    /// Observable event log
    events: EventLog,

    /// Claims by superblock id
    claims: HashMap<Hash, Claim>,
}

impl ClaimManager {
    /// Create a claim manager with the given protocol parameters
    pub fn new(config: RelayConfig) -> Self {
        let battles = BattleManager::new(config.response_timeout);
        Self {
            config,
            chain: SuperblockChain::new(),
            deposits: DepositsManager::new(),
            battles,
            events: EventLog::new(),
            claims: HashMap::new(),
        }
    }

    /// Bootstrap the relay with a genesis superblock; callable once
    pub fn initialize(
        &mut self,
        merkle_root: Hash,
        accumulated_work: u64,
        timestamp: u64,
        last_hash: Hash,
        submitter: Address,
    ) -> Result<Hash, RelayError> {
        let id = self
            .chain
            .initialize(merkle_root, accumulated_work, timestamp, last_hash, submitter)?;
        self.events.push(RelayEvent::NewSuperblock {
            superblock_id: id,
            submitter,
        });
        Ok(id)
    }

    /// Credit a participant's deposit; required before proposing or
    /// challenging
    pub fn make_deposit(&mut self, account: Address, amount: u64) -> Result<u64, RelayError> {
        let balance = self.deposits.deposit(account, amount)?;
        self.events.push(RelayEvent::DepositMade { account, amount });
        Ok(balance)
    }

    /// Withdraw free (unbonded) funds
    pub fn withdraw_deposit(&mut self, account: Address, amount: u64) -> Result<u64, RelayError> {
        self.deposits.withdraw(account, amount)
    }

    /// Propose a superblock built from an ordered batch of block hashes
    ///
    /// The merkle root is computed here and the hash list is recorded
    /// on the claim as the commitment every verification game checks
    /// against. Duplicates, unknown parents, empty batches and short
    /// deposits surface as `Rejected` plus an `ErrorSuperblock` event.
    pub fn propose_superblock(
        &mut self,
        submitter: Address,
        block_hashes: Vec<Hash>,
        accumulated_work: u64,
        timestamp: u64,
        last_hash: Hash,
        parent_id: Hash,
        now: u64,
    ) -> ProposalOutcome {
        let merkle_root = MerkleTree::compute_root(&block_hashes);
        let candidate_id = calc_superblock_id(
            &merkle_root,
            accumulated_work,
            timestamp,
            &last_hash,
            &parent_id,
        );

        // A batch with no leaves would leave a challenger no legal move
        if block_hashes.is_empty() {
            return self.reject_proposal(candidate_id, RelayError::EmptyBatch);
        }

        let bond = self.config.min_proposal_deposit;
        if let Err(error) = self.deposits.bond(submitter, bond) {
            return self.reject_proposal(candidate_id, error);
        }

        let id = match self.chain.propose(
            merkle_root,
            accumulated_work,
            timestamp,
            last_hash,
            parent_id,
            submitter,
        ) {
            Ok(id) => id,
            Err(error) => {
                self.deposits.unbond(submitter, bond);
                return self.reject_proposal(candidate_id, error);
            }
        };

        let mut bonded = HashMap::new();
        bonded.insert(submitter, bond);
        self.claims.insert(
            id,
            Claim {
                superblock_id: id,
                submitter,
                challengers: Vec::new(),
                bonded,
                sessions: HashMap::new(),
                state: ClaimState::Open,
                decision: ClaimDecision::Unset,
                challenge_window_end: now + self.config.challenge_window,
                block_hashes,
            },
        );
        self.events.push(RelayEvent::NewSuperblock {
            superblock_id: id,
            submitter,
        });
        ProposalOutcome::Created(id)
    }

    /// Challenge a pending superblock
    pub fn challenge_superblock(
        &mut self,
        challenger: Address,
        superblock_id: Hash,
        now: u64,
    ) -> Result<(), RelayError> {
        self.challenge_inner(challenger, superblock_id, now)
            .map_err(|e| self.report_error(superblock_id, e))
    }

    fn challenge_inner(
        &mut self,
        challenger: Address,
        superblock_id: Hash,
        now: u64,
    ) -> Result<(), RelayError> {
        if self.chain.get(&superblock_id).is_none() {
            return Err(RelayError::UnknownSuperblock(short(&superblock_id)));
        }
        let claim = self
            .claims
            .get(&superblock_id)
            .ok_or_else(|| RelayError::UnknownClaim(short(&superblock_id)))?;

        if claim.state == ClaimState::Decided {
            return Err(RelayError::AlreadyDecided(short(&superblock_id)));
        }
        if now >= claim.challenge_window_end {
            return Err(RelayError::WindowElapsed(short(&superblock_id)));
        }
        if claim.challengers.contains(&challenger) {
            return Err(RelayError::AlreadyChallenged(short(&superblock_id)));
        }
        match self.chain.status(&superblock_id) {
            Some(status) if !status.is_terminal() => {}
            _ => return Err(RelayError::AlreadyDecided(short(&superblock_id))),
        }

        let bond = self.config.min_challenge_deposit;
        self.deposits.bond(challenger, bond)?;
        self.chain.challenge(&superblock_id)?;

        let claim = self
            .claims
            .get_mut(&superblock_id)
            .ok_or_else(|| RelayError::UnknownClaim(short(&superblock_id)))?;
        claim.challengers.push(challenger);
        claim.bonded.insert(challenger, bond);
        claim.state = ClaimState::Challenged;

        self.events.push(RelayEvent::ChallengeSuperblock {
            superblock_id,
            challenger,
        });
        self.events.push(RelayEvent::ClaimChallenged {
            superblock_id,
            challenger,
        });
        Ok(())
    }

    /// Start a verification game for every challenger without one
    ///
    /// Idempotent; returns the number of sessions started, which is
    /// zero when every challenger already has a session or the claim is
    /// decided.
    pub fn run_next_verification_game(
        &mut self,
        claim_id: Hash,
        now: u64,
    ) -> Result<usize, RelayError> {
        let claim = self
            .claims
            .get_mut(&claim_id)
            .ok_or_else(|| RelayError::UnknownClaim(short(&claim_id)))?;
        if claim.state == ClaimState::Decided {
            return Ok(0);
        }

        let submitter = claim.submitter;
        let superblock_id = claim.superblock_id;
        let pending: Vec<Address> = claim
            .challengers
            .iter()
            .filter(|c| !claim.sessions.contains_key(*c))
            .copied()
            .collect();

        let mut started = 0;
        for challenger in pending {
            let session_id = self.battles.start_session(
                claim_id,
                superblock_id,
                submitter,
                challenger,
                claim.block_hashes.clone(),
                now,
            );
            claim.sessions.insert(challenger, session_id);
            started += 1;
            self.events.push(RelayEvent::VerificationGameStarted {
                superblock_id,
                submitter,
                challenger,
                session_id,
            });
        }
        Ok(started)
    }

    /// Look up the session id for a claim/challenger pair
    pub fn get_session(&self, claim_id: &Hash, challenger: &Address) -> Result<Hash, RelayError> {
        let claim = self
            .claims
            .get(claim_id)
            .ok_or_else(|| RelayError::UnknownClaim(short(claim_id)))?;
        claim
            .sessions
            .get(challenger)
            .copied()
            .ok_or_else(|| RelayError::NoSession(short(claim_id)))
    }

    /// Forward a challenger's query into the verification game
    pub fn query(
        &mut self,
        session_id: &Hash,
        caller: Address,
        step: usize,
        now: u64,
    ) -> Result<(), RelayError> {
        self.battles.query(session_id, caller, step, now)
    }

    /// Forward a submitter's response and apply any settled outcome
    pub fn respond(
        &mut self,
        session_id: &Hash,
        caller: Address,
        data: &[Hash],
        now: u64,
    ) -> Result<SessionOutcome, RelayError> {
        let outcome = self.battles.respond(session_id, caller, data, now)?;
        if outcome != SessionOutcome::Unset {
            self.apply_session_outcome(session_id, outcome)?;
        }
        Ok(outcome)
    }

    /// Resolve a stalled session by forfeit and apply the outcome
    pub fn check_session_timeout(
        &mut self,
        session_id: &Hash,
        now: u64,
    ) -> Result<SessionOutcome, RelayError> {
        let outcome = self.battles.check_timeout(session_id, now)?;
        if outcome != SessionOutcome::Unset {
            self.apply_session_outcome(session_id, outcome)?;
        }
        Ok(outcome)
    }

    /// Close out an unchallenged claim whose window elapsed
    ///
    /// Returns whether the claim is decided after the call.
    pub fn check_claim_finished(&mut self, claim_id: Hash, now: u64) -> Result<bool, RelayError> {
        let claim = self
            .claims
            .get_mut(&claim_id)
            .ok_or_else(|| RelayError::UnknownClaim(short(&claim_id)))?;
        if claim.state == ClaimState::Decided {
            return Ok(true);
        }
        if !claim.challengers.is_empty() || now < claim.challenge_window_end {
            return Ok(false);
        }

        self.chain.semi_approve(&claim_id)?;
        self.events.push(RelayEvent::SemiApprovedSuperblock {
            superblock_id: claim_id,
        });

        let claim = self
            .claims
            .get_mut(&claim_id)
            .ok_or_else(|| RelayError::UnknownClaim(short(&claim_id)))?;
        claim.state = ClaimState::Decided;
        claim.decision = ClaimDecision::Confirmed;
        let submitter = claim.submitter;
        let bond = claim.bonded.get(&submitter).copied().unwrap_or(0);
        self.deposits.unbond(submitter, bond);
        Ok(true)
    }

    /// Confirm a semi-approved superblock
    ///
    /// An unchallenged claim whose window has elapsed is closed out
    /// here in the same call.
    pub fn confirm_superblock(&mut self, superblock_id: Hash, now: u64) -> Result<(), RelayError> {
        self.confirm_inner(superblock_id, now)
            .map_err(|e| self.report_error(superblock_id, e))
    }

    fn confirm_inner(&mut self, superblock_id: Hash, now: u64) -> Result<(), RelayError> {
        let claim = self
            .claims
            .get(&superblock_id)
            .ok_or_else(|| match self.chain.get(&superblock_id) {
                Some(_) => RelayError::NotReady(short(&superblock_id)),
                None => RelayError::UnknownSuperblock(short(&superblock_id)),
            })?;

        match (claim.state, claim.decision) {
            (ClaimState::Decided, ClaimDecision::Confirmed) => {}
            (ClaimState::Open, _) => {
                if !self.check_claim_finished(superblock_id, now)? {
                    return Err(RelayError::NotReady(short(&superblock_id)));
                }
            }
            _ => return Err(RelayError::NotReady(short(&superblock_id))),
        }

        self.chain.confirm(&superblock_id)?;
        self.events.push(RelayEvent::ApprovedSuperblock { superblock_id });
        Ok(())
    }

    /// The canonical chain tip
    pub fn get_best_superblock(&self) -> Option<Hash> {
        self.chain.best_superblock()
    }

    /// A superblock's status
    pub fn superblock_status(&self, id: &Hash) -> Option<SuperblockStatus> {
        self.chain.status(id)
    }

    /// The underlying superblock chain, read-only
    pub fn chain(&self) -> &SuperblockChain {
        &self.chain
    }

    /// The deposit ledger, read-only
    pub fn deposits(&self) -> &DepositsManager {
        &self.deposits
    }

    /// The verification game registry, read-only
    pub fn battles(&self) -> &BattleManager {
        &self.battles
    }

    /// The event log
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Look up a claim by superblock id
    pub fn claim(&self, superblock_id: &Hash) -> Option<&Claim> {
        self.claims.get(superblock_id)
    }

    /// Protocol parameters in force
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    // A settled session verdict flows into the owning claim. The first
    // ChallengerWins verdict fixes the claim; late verdicts on sibling
    // sessions of a decided claim are moot and must not reopen it.
    fn apply_session_outcome(
        &mut self,
        session_id: &Hash,
        outcome: SessionOutcome,
    ) -> Result<(), RelayError> {
        let session = self
            .battles
            .get(session_id)
            .ok_or_else(|| RelayError::UnknownSession(short(session_id)))?;
        let claim_id = session.claim_id;
        let winner = session.challenger;

        let claim = match self.claims.get_mut(&claim_id) {
            Some(claim) => claim,
            None => return Ok(()),
        };
        if claim.state == ClaimState::Decided {
            return Ok(());
        }

        match outcome {
            SessionOutcome::ChallengerWins => {
                claim.state = ClaimState::Decided;
                claim.decision = ClaimDecision::Invalidated;
                let submitter = claim.submitter;
                let submitter_bond = claim.bonded.get(&submitter).copied().unwrap_or(0);
                let refunds: Vec<(Address, u64)> = claim
                    .challengers
                    .iter()
                    .map(|c| (*c, claim.bonded.get(c).copied().unwrap_or(0)))
                    .collect();

                self.chain.invalidate(&claim_id)?;
                self.events.push(RelayEvent::InvalidSuperblock {
                    superblock_id: claim_id,
                });
                self.deposits.slash(submitter, submitter_bond, winner);
                for (challenger, bond) in refunds {
                    self.deposits.unbond(challenger, bond);
                }
            }
            SessionOutcome::SubmitterWins => {
                let all_resolved = claim.challengers.iter().all(|c| {
                    claim
                        .sessions
                        .get(c)
                        .and_then(|sid| self.battles.get(sid))
                        .map(|s| s.outcome == SessionOutcome::SubmitterWins)
                        .unwrap_or(false)
                });
                if !all_resolved {
                    return Ok(());
                }

                claim.state = ClaimState::Decided;
                claim.decision = ClaimDecision::Confirmed;
                let submitter = claim.submitter;
                let submitter_bond = claim.bonded.get(&submitter).copied().unwrap_or(0);
                let slashes: Vec<(Address, u64)> = claim
                    .challengers
                    .iter()
                    .map(|c| (*c, claim.bonded.get(c).copied().unwrap_or(0)))
                    .collect();

                self.chain.semi_approve(&claim_id)?;
                self.events.push(RelayEvent::SemiApprovedSuperblock {
                    superblock_id: claim_id,
                });
                self.deposits.unbond(submitter, submitter_bond);
                for (challenger, bond) in slashes {
                    self.deposits.slash(challenger, bond, submitter);
                }
            }
            SessionOutcome::Unset => {}
        }
        Ok(())
    }

    fn reject_proposal(&mut self, candidate_id: Hash, error: RelayError) -> ProposalOutcome {
        log::warn!("proposal rejected for {}: {}", short(&candidate_id), error);
        self.events.push(RelayEvent::ErrorSuperblock {
            superblock_id: candidate_id,
            code: error.to_error_code(),
        });
        ProposalOutcome::Rejected {
            superblock_id: candidate_id,
            error,
        }
    }

    fn report_error(&mut self, superblock_id: Hash, error: RelayError) -> RelayError {
        if error.is_recoverable() {
            self.events.push(RelayEvent::ErrorSuperblock {
                superblock_id,
                code: error.to_error_code(),
            });
        }
        error
    }
}
