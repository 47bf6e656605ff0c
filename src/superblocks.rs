// src/superblocks.rs
//! Superblock chain and status state machine
//!
//! A superblock is a merkle-committed batch of source-chain block
//! hashes plus chain-linkage metadata. This module owns every
//! superblock record, drives the status transitions
//! `New -> InBattle -> SemiApproved -> Approved` / `Invalid`, and
//! answers the best-chain-tip query consumers read.

use crate::{error::RelayError, merkle::MerkleTree, Address, Hash};
use borsh::{BorshDeserialize, BorshSerialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;

/// Parent id of the genesis superblock
pub const GENESIS_PARENT: Hash = [0u8; 32];

fn short(id: &Hash) -> String {
    hex::encode(&id[..8])
}

/// Superblock status
#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum SuperblockStatus {
    /// Proposed, challenge window open
    New,

    /// Under at least one active challenge
    InBattle,

    /// Survived its window or its battles, awaiting confirmation
    SemiApproved,

    /// Confirmed, terminal
    Approved,

    /// Rejected, terminal
    Invalid,
}

impl SuperblockStatus {
    /// Whether this status admits no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, SuperblockStatus::Approved | SuperblockStatus::Invalid)
    }
}

impl fmt::Display for SuperblockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuperblockStatus::New => write!(f, "New"),
            SuperblockStatus::InBattle => write!(f, "InBattle"),
            SuperblockStatus::SemiApproved => write!(f, "SemiApproved"),
            SuperblockStatus::Approved => write!(f, "Approved"),
            SuperblockStatus::Invalid => write!(f, "Invalid"),
        }
    }
}

/// A superblock record
#[derive(Debug, Clone, BorshSerialize, BorshDeserialize)]
pub struct Superblock {
    /// Content hash of (merkle_root, accumulated_work, timestamp,
    /// last_hash, parent_id)
    pub id: Hash,

    /// Root of the merkle tree over the batch's block hashes
    pub merkle_root: Hash,

    /// Total-work counter, the chain-selection tiebreaker
    pub accumulated_work: u64,

    /// Timestamp of the last block in the batch
    pub timestamp: u64,

    /// Hash of the last block in the batch
    pub last_hash: Hash,

    /// Back-reference to the previous superblock
    pub parent_id: Hash,

    /// Identity that proposed this superblock
    pub submitter: Address,

    /// Current status
    pub status: SuperblockStatus,

    /// Distance from genesis
    pub height: u64,

    /// Global proposal ordering, used to break work ties
    pub proposal_index: u64,
}

/// Compute a superblock id from its content tuple
pub fn calc_superblock_id(
    merkle_root: &Hash,
    accumulated_work: u64,
    timestamp: u64,
    last_hash: &Hash,
    parent_id: &Hash,
) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(merkle_root);
    hasher.update(accumulated_work.to_be_bytes());
    hasher.update(timestamp.to_be_bytes());
    hasher.update(last_hash);
    hasher.update(parent_id);
    hasher.finalize().into()
}

/// The chain of superblock records
#[derive(Debug, Default, BorshSerialize, BorshDeserialize)]
pub struct SuperblockChain {
    /// Superblocks by id
    superblocks: HashMap<Hash, Superblock>,

    /// Genesis superblock id, set by `initialize`
    genesis: Option<Hash>,

    /// Next proposal ordering index
    next_proposal_index: u64,
}

impl SuperblockChain {
    /// Create an empty chain
    pub fn new() -> Self {
        Self {
            superblocks: HashMap::new(),
            genesis: None,
            next_proposal_index: 0,
        }
    }

    /// Bootstrap the chain with a genesis superblock
    ///
    /// The genesis record is created directly `Approved`; callable
    /// exactly once.
    pub fn initialize(
        &mut self,
        merkle_root: Hash,
        accumulated_work: u64,
        timestamp: u64,
        last_hash: Hash,
        submitter: Address,
    ) -> Result<Hash, RelayError> {
        if self.genesis.is_some() {
            return Err(RelayError::AlreadyInitialized);
        }

        let id = calc_superblock_id(
            &merkle_root,
            accumulated_work,
            timestamp,
            &last_hash,
            &GENESIS_PARENT,
        );
        let superblock = Superblock {
            id,
            merkle_root,
            accumulated_work,
            timestamp,
            last_hash,
            parent_id: GENESIS_PARENT,
            submitter,
            status: SuperblockStatus::Approved,
            height: 0,
            proposal_index: self.next_proposal_index,
        };
        self.next_proposal_index += 1;
        self.superblocks.insert(id, superblock);
        self.genesis = Some(id);

        log::info!("genesis superblock {}", short(&id));
        Ok(id)
    }

    /// Whether the chain has been initialized
    pub fn is_initialized(&self) -> bool {
        self.genesis.is_some()
    }

    /// The genesis superblock id
    pub fn genesis(&self) -> Option<Hash> {
        self.genesis
    }

    /// Propose a new superblock on top of an existing parent
    ///
    /// Fails with `DuplicateSuperblock` while a record with the same
    /// content tuple is pending or settled non-Invalid; an `Invalid`
    /// record may be re-proposed and starts over as `New`. Fails with
    /// `UnknownParent` when the parent is missing or itself `Invalid`.
    pub fn propose(
        &mut self,
        merkle_root: Hash,
        accumulated_work: u64,
        timestamp: u64,
        last_hash: Hash,
        parent_id: Hash,
        submitter: Address,
    ) -> Result<Hash, RelayError> {
        if !self.is_initialized() {
            return Err(RelayError::NotInitialized);
        }

        let parent_height = match self.superblocks.get(&parent_id) {
            Some(parent) if parent.status != SuperblockStatus::Invalid => parent.height,
            _ => return Err(RelayError::UnknownParent(short(&parent_id))),
        };

        let id = calc_superblock_id(
            &merkle_root,
            accumulated_work,
            timestamp,
            &last_hash,
            &parent_id,
        );
        if let Some(existing) = self.superblocks.get(&id) {
            if existing.status != SuperblockStatus::Invalid {
                return Err(RelayError::DuplicateSuperblock(short(&id)));
            }
        }

        let superblock = Superblock {
            id,
            merkle_root,
            accumulated_work,
            timestamp,
            last_hash,
            parent_id,
            submitter,
            status: SuperblockStatus::New,
            height: parent_height + 1,
            proposal_index: self.next_proposal_index,
        };
        self.next_proposal_index += 1;
        self.superblocks.insert(id, superblock);

        log::info!("proposed superblock {}", short(&id));
        Ok(id)
    }

    /// Confirm a semi-approved superblock
    pub fn confirm(&mut self, id: &Hash) -> Result<(), RelayError> {
        let superblock = self.get_mut(id)?;
        if superblock.status != SuperblockStatus::SemiApproved {
            return Err(RelayError::NotReady(short(id)));
        }
        superblock.status = SuperblockStatus::Approved;
        log::info!("approved superblock {}", short(id));
        Ok(())
    }

    /// Move a superblock into battle
    ///
    /// Idempotent for an already-battling superblock: additional
    /// challengers join the same `InBattle` record.
    pub fn challenge(&mut self, id: &Hash) -> Result<(), RelayError> {
        let superblock = self.get_mut(id)?;
        match superblock.status {
            SuperblockStatus::New | SuperblockStatus::SemiApproved => {
                superblock.status = SuperblockStatus::InBattle;
                log::info!("superblock {} in battle", short(id));
                Ok(())
            }
            SuperblockStatus::InBattle => Ok(()),
            SuperblockStatus::Approved | SuperblockStatus::Invalid => {
                Err(RelayError::AlreadyDecided(short(id)))
            }
        }
    }

    /// Semi-approve a superblock whose window elapsed or whose battles
    /// all resolved for the submitter
    pub fn semi_approve(&mut self, id: &Hash) -> Result<(), RelayError> {
        let superblock = self.get_mut(id)?;
        match superblock.status {
            SuperblockStatus::New | SuperblockStatus::InBattle => {
                superblock.status = SuperblockStatus::SemiApproved;
                log::info!("semi-approved superblock {}", short(id));
                Ok(())
            }
            status => Err(RelayError::InvalidTransition(format!(
                "semi-approve from {} for {}",
                status,
                short(id)
            ))),
        }
    }

    /// Invalidate a superblock
    pub fn invalidate(&mut self, id: &Hash) -> Result<(), RelayError> {
        let superblock = self.get_mut(id)?;
        match superblock.status {
            SuperblockStatus::New
            | SuperblockStatus::InBattle
            | SuperblockStatus::SemiApproved => {
                superblock.status = SuperblockStatus::Invalid;
                log::warn!("invalidated superblock {}", short(id));
                Ok(())
            }
            status => Err(RelayError::InvalidTransition(format!(
                "invalidate from {} for {}",
                status,
                short(id)
            ))),
        }
    }

    /// The canonical chain tip
    ///
    /// Highest accumulated work among `Approved` and `SemiApproved`
    /// superblocks; ties broken by earliest proposal.
    pub fn best_superblock(&self) -> Option<Hash> {
        self.superblocks
            .values()
            .filter(|sb| {
                matches!(
                    sb.status,
                    SuperblockStatus::Approved | SuperblockStatus::SemiApproved
                )
            })
            .max_by(|a, b| {
                a.accumulated_work
                    .cmp(&b.accumulated_work)
                    .then(b.proposal_index.cmp(&a.proposal_index))
            })
            .map(|sb| sb.id)
    }

    /// Look up a superblock by id
    pub fn get(&self, id: &Hash) -> Option<&Superblock> {
        self.superblocks.get(id)
    }

    /// A superblock's status
    pub fn status(&self, id: &Hash) -> Option<SuperblockStatus> {
        self.superblocks.get(id).map(|sb| sb.status)
    }

    /// Number of superblock records, genesis included
    pub fn len(&self) -> usize {
        self.superblocks.len()
    }

    /// Whether the chain holds no records
    pub fn is_empty(&self) -> bool {
        self.superblocks.is_empty()
    }

    /// Merkle root over a batch of block hashes
    ///
    /// Exposed for external verification against a superblock's
    /// `merkle_root`.
    pub fn compute_merkle(hashes: &[Hash]) -> Hash {
        MerkleTree::compute_root(hashes)
    }

    fn get_mut(&mut self, id: &Hash) -> Result<&mut Superblock, RelayError> {
        self.superblocks
            .get_mut(id)
            .ok_or_else(|| RelayError::UnknownSuperblock(short(id)))
    }
}
