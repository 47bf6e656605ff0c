// src/lib.rs
//! Superblock relay core
//!
//! Lets a host chain maintain a verifiable, challengeable view of a
//! source chain's block history, batched into superblocks. The crate
//! integrates:
//! - Merkle commitments over block hash batches
//! - A bonded deposit ledger
//! - The superblock chain and its status state machine
//! - The interactive verification game (binary-search fraud proof)
//! - The claim manager orchestrating challenges and settlement
//!
//! Header parsing and the token/unlock bridge are external
//! collaborators: the core only ever sees block hashes and exposes
//! superblock status, the best-chain tip, and merkle membership
//! proofs.

pub mod battle;
pub mod claims;
pub mod deposits;
pub mod error;
pub mod events;
pub mod merkle;
pub mod superblocks;

pub use battle::{BattleManager, BattleSession, SessionOutcome, SessionState};
pub use claims::{Claim, ClaimDecision, ClaimManager, ClaimState, ProposalOutcome};
pub use deposits::{Balance, DepositsManager};
pub use error::RelayError;
pub use events::{EventLog, RelayEvent};
pub use merkle::{MerkleTree, EMPTY_TREE_ROOT};
pub use superblocks::{
    calc_superblock_id, Superblock, SuperblockChain, SuperblockStatus, GENESIS_PARENT,
};

use serde::{Deserialize, Serialize};

/// A 32-byte hash
pub type Hash = [u8; 32];

/// A participant identity
pub type Address = [u8; 32];

/// Protocol parameters for the relay
///
/// Window and timeout values are in the same time unit callers pass as
/// `now` (seconds in practice); deposits are in the bridge's smallest
/// token unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Minimum bond locked when proposing a superblock
    pub min_proposal_deposit: u64,

    /// Minimum bond locked when challenging a superblock
    pub min_challenge_deposit: u64,

    /// Length of the challenge window opened on proposal
    pub challenge_window: u64,

    /// Per-turn deadline in a verification game session
    pub response_timeout: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            min_proposal_deposit: 1_000,
            min_challenge_deposit: 1_000,
            challenge_window: 3_600,
            response_timeout: 600,
        }
    }
}
