// src/events.rs
//! Event log for the superblock relay
//!
//! Every observable state transition appends an event to an append-only
//! log. Events are notifications for off-core consumers (bridge,
//! monitoring); the core never reads them back to drive control flow.

use crate::{Address, Hash};
use serde::{Deserialize, Serialize};

fn short(id: &Hash) -> String {
    hex::encode(&id[..8])
}

/// Events emitted by the relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelayEvent {
    /// A new superblock was proposed
    NewSuperblock { superblock_id: Hash, submitter: Address },

    /// A superblock operation failed with a recoverable error
    ErrorSuperblock { superblock_id: Hash, code: u32 },

    /// A superblock was confirmed
    ApprovedSuperblock { superblock_id: Hash },

    /// A superblock survived its challenge window or its battles
    SemiApprovedSuperblock { superblock_id: Hash },

    /// A superblock was challenged
    ChallengeSuperblock { superblock_id: Hash, challenger: Address },

    /// A superblock was invalidated
    InvalidSuperblock { superblock_id: Hash },

    /// A participant made a deposit
    DepositMade { account: Address, amount: u64 },

    /// A challenger was registered on a claim
    ClaimChallenged { superblock_id: Hash, challenger: Address },

    /// A verification game session was started
    VerificationGameStarted {
        superblock_id: Hash,
        submitter: Address,
        challenger: Address,
        session_id: Hash,
    },
}

impl RelayEvent {
    /// Event name, stable across versions
    pub fn name(&self) -> &'static str {
        match self {
            RelayEvent::NewSuperblock { .. } => "NewSuperblock",
            RelayEvent::ErrorSuperblock { .. } => "ErrorSuperblock",
            RelayEvent::ApprovedSuperblock { .. } => "ApprovedSuperblock",
            RelayEvent::SemiApprovedSuperblock { .. } => "SemiApprovedSuperblock",
            RelayEvent::ChallengeSuperblock { .. } => "ChallengeSuperblock",
            RelayEvent::InvalidSuperblock { .. } => "InvalidSuperblock",
            RelayEvent::DepositMade { .. } => "DepositMade",
            RelayEvent::ClaimChallenged { .. } => "ClaimChallenged",
            RelayEvent::VerificationGameStarted { .. } => "VerificationGameStarted",
        }
    }

    /// Id of the entity the event is about
    pub fn entity_id(&self) -> Option<Hash> {
        match self {
            RelayEvent::NewSuperblock { superblock_id, .. }
            | RelayEvent::ErrorSuperblock { superblock_id, .. }
            | RelayEvent::ApprovedSuperblock { superblock_id }
            | RelayEvent::SemiApprovedSuperblock { superblock_id }
            | RelayEvent::ChallengeSuperblock { superblock_id, .. }
            | RelayEvent::InvalidSuperblock { superblock_id }
            | RelayEvent::ClaimChallenged { superblock_id, .. }
            | RelayEvent::VerificationGameStarted { superblock_id, .. } => Some(*superblock_id),
            RelayEvent::DepositMade { .. } => None,
        }
    }
}

/// Append-only event log
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<RelayEvent>,
}

impl EventLog {
    /// Create an empty event log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Append an event to the log
    pub fn push(&mut self, event: RelayEvent) {
        match event.entity_id() {
            Some(id) => log::info!("event {} for {}", event.name(), short(&id)),
            None => log::info!("event {}", event.name()),
        }
        self.events.push(event);
    }

    /// All events appended so far, in order
    pub fn events(&self) -> &[RelayEvent] {
        &self.events
    }

    /// The most recent event, if any
    pub fn last(&self) -> Option<&RelayEvent> {
        self.events.last()
    }

    /// Number of events in the log
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if the log is empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Export the log as JSON, for off-core consumers
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.events)
    }
}
