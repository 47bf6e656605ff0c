// src/battle.rs
//! Interactive verification game over a superblock's block hashes
//!
//! One submitter defends a disputed superblock against one challenger.
//! The challenger binary-searches the committed leaf sequence, each
//! query halving the range under dispute; the submitter must justify
//! every narrowed range against the on-record commitment. Rounds are
//! O(log n) in the batch size. A party that misses its deadline
//! forfeits.

use crate::{error::RelayError, Address, Hash};
use borsh::{BorshDeserialize, BorshSerialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;

fn short(id: &Hash) -> String {
    hex::encode(&id[..8])
}

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum SessionState {
    /// Challenger's turn to pick a half
    AwaitingQuery,

    /// Submitter's turn to justify the pending range
    AwaitingResponse,

    /// Outcome settled
    Completed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::AwaitingQuery => write!(f, "AwaitingQuery"),
            SessionState::AwaitingResponse => write!(f, "AwaitingResponse"),
            SessionState::Completed => write!(f, "Completed"),
        }
    }
}

/// Session outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum SessionOutcome {
    /// Still in play
    Unset,

    /// Submitter justified every probed range
    SubmitterWins,

    /// Submitter failed a justification or forfeited
    ChallengerWins,
}

/// Synthetic session id derived from the claim and the challenger
pub fn session_id(claim_id: &Hash, challenger: &Address) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(claim_id);
    hasher.update(challenger);
    hasher.finalize().into()
}

/// One verification game session
#[derive(Debug, Clone, BorshSerialize, BorshDeserialize)]
pub struct BattleSession {
    /// Session id
    pub id: Hash,

    /// Claim under dispute
    pub claim_id: Hash,

    /// Superblock under dispute
    pub superblock_id: Hash,

    /// Defending party
    pub submitter: Address,

    /// Disputing party
    pub challenger: Address,

    /// On-record leaf commitment the submitter must justify
    hashes: Vec<Hash>,

    /// Current search bounds over the leaf index range
    pub search_low: usize,
    pub search_high: usize,

    /// Range selected by the last query, awaiting justification
    pending: Option<(usize, usize)>,

    /// Current state
    pub state: SessionState,

    /// Absolute deadline for the party whose turn it is
    pub deadline: u64,

    /// Settled outcome
    pub outcome: SessionOutcome,
}

impl BattleSession {
    fn resolve(&mut self, outcome: SessionOutcome) {
        self.state = SessionState::Completed;
        self.outcome = outcome;
        log::info!("session {} resolved: {:?}", short(&self.id), outcome);
    }
}

/// Registry of verification game sessions
#[derive(Debug, BorshSerialize, BorshDeserialize)]
pub struct BattleManager {
    /// Sessions by id
    sessions: HashMap<Hash, BattleSession>,

    /// Per-turn response window
    response_timeout: u64,
}

impl BattleManager {
    /// Create a session registry with the given per-turn window
    pub fn new(response_timeout: u64) -> Self {
        Self {
            sessions: HashMap::new(),
            response_timeout,
        }
    }

    /// Open a session between one submitter and one challenger
    ///
    /// The challenger moves first; their clock starts immediately.
    pub fn start_session(
        &mut self,
        claim_id: Hash,
        superblock_id: Hash,
        submitter: Address,
        challenger: Address,
        hashes: Vec<Hash>,
        now: u64,
    ) -> Hash {
        let id = session_id(&claim_id, &challenger);
        let leaf_count = hashes.len();
        let session = BattleSession {
            id,
            claim_id,
            superblock_id,
            submitter,
            challenger,
            hashes,
            search_low: 0,
            search_high: leaf_count,
            pending: None,
            state: SessionState::AwaitingQuery,
            deadline: now + self.response_timeout,
            outcome: SessionOutcome::Unset,
        };
        self.sessions.insert(id, session);
        log::info!(
            "session {} started over {} leaves",
            short(&id),
            leaf_count
        );
        id
    }

    /// Challenger picks the half of the current range they dispute
    ///
    /// `step` is a leaf index inside the current bounds; the half
    /// containing it becomes the pending range the submitter must
    /// justify.
    pub fn query(
        &mut self,
        id: &Hash,
        caller: Address,
        step: usize,
        now: u64,
    ) -> Result<(), RelayError> {
        let timeout = self.response_timeout;
        let session = self.get_session_mut(id)?;
        if session.state != SessionState::AwaitingQuery {
            return Err(RelayError::WrongState(format!(
                "{} in {}",
                short(id),
                session.state
            )));
        }
        if caller != session.challenger {
            return Err(RelayError::NotYourTurn(short(id)));
        }
        if now > session.deadline {
            return Err(RelayError::SessionExpired(short(id)));
        }
        let (low, high) = (session.search_low, session.search_high);
        if step < low || step >= high {
            return Err(RelayError::StepOutOfRange { step, low, high });
        }

        let mid = low + (high - low) / 2;
        session.pending = if high - low == 1 {
            Some((low, high))
        } else if step < mid {
            Some((low, mid))
        } else {
            Some((mid, high))
        };
        session.state = SessionState::AwaitingResponse;
        session.deadline = now + timeout;
        Ok(())
    }

    /// Submitter justifies the pending range with its leaf hashes
    ///
    /// Any mismatch against the on-record commitment resolves the
    /// session for the challenger on the spot. A verified single-leaf
    /// range resolves it for the submitter.
    pub fn respond(
        &mut self,
        id: &Hash,
        caller: Address,
        data: &[Hash],
        now: u64,
    ) -> Result<SessionOutcome, RelayError> {
        let timeout = self.response_timeout;
        let session = self.get_session_mut(id)?;
        if session.state != SessionState::AwaitingResponse {
            return Err(RelayError::WrongState(format!(
                "{} in {}",
                short(id),
                session.state
            )));
        }
        if caller != session.submitter {
            return Err(RelayError::NotYourTurn(short(id)));
        }
        if now > session.deadline {
            return Err(RelayError::SessionExpired(short(id)));
        }
        let (low, high) = session.pending.take().ok_or_else(|| {
            RelayError::InvalidTransition(format!("no pending range in session {}", short(id)))
        })?;

        if data.len() != high - low || data != &session.hashes[low..high] {
            session.resolve(SessionOutcome::ChallengerWins);
            return Ok(SessionOutcome::ChallengerWins);
        }

        session.search_low = low;
        session.search_high = high;
        if high - low == 1 {
            // Single leaf isolated and verified against the record
            session.resolve(SessionOutcome::SubmitterWins);
            return Ok(SessionOutcome::SubmitterWins);
        }

        session.state = SessionState::AwaitingQuery;
        session.deadline = now + timeout;
        Ok(SessionOutcome::Unset)
    }

    /// Resolve a session by forfeit if its deadline has passed
    ///
    /// Returns the session's outcome; `Unset` while the deadline has
    /// not passed. Not an error path: a forfeit is an expected terminal
    /// outcome.
    pub fn check_timeout(&mut self, id: &Hash, now: u64) -> Result<SessionOutcome, RelayError> {
        let session = self.get_session_mut(id)?;
        match session.state {
            SessionState::Completed => Ok(session.outcome),
            _ if now <= session.deadline => Ok(SessionOutcome::Unset),
            SessionState::AwaitingQuery => {
                session.resolve(SessionOutcome::SubmitterWins);
                Ok(SessionOutcome::SubmitterWins)
            }
            SessionState::AwaitingResponse => {
                session.resolve(SessionOutcome::ChallengerWins);
                Ok(SessionOutcome::ChallengerWins)
            }
        }
    }

    /// Look up a session by id
    pub fn get(&self, id: &Hash) -> Option<&BattleSession> {
        self.sessions.get(id)
    }

    /// Number of sessions ever started
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session has been started
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn get_session_mut(&mut self, id: &Hash) -> Result<&mut BattleSession, RelayError> {
        self.sessions
            .get_mut(id)
            .ok_or_else(|| RelayError::UnknownSession(short(id)))
    }
}
