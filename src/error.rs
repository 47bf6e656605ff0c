// src/error.rs
//! Error types for the superblock relay
//!
//! This module defines the error taxonomy every relay component uses:
//! - Protocol-level recoverable errors (duplicate proposals, wrong-turn
//!   verification steps, insufficient bonds) that callers inspect
//! - Invariant violations that indicate a bug in the state machine
//!
//! Recoverable errors never leave an entity half-updated: an operation
//! that fails with one of these has not mutated any state.

use thiserror::Error;

/// Base error type for relay components
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// A superblock with the same content is already pending
    #[error("Duplicate superblock: {0}")]
    DuplicateSuperblock(String),

    /// The referenced parent superblock does not exist or is invalid
    #[error("Unknown parent superblock: {0}")]
    UnknownParent(String),

    /// A proposal carried no block hashes
    #[error("Empty block hash batch")]
    EmptyBatch,

    /// The referenced superblock does not exist
    #[error("Unknown superblock: {0}")]
    UnknownSuperblock(String),

    /// The referenced claim does not exist
    #[error("Unknown claim: {0}")]
    UnknownClaim(String),

    /// The referenced verification session does not exist
    #[error("Unknown session: {0}")]
    UnknownSession(String),

    /// No session exists for the given claim and challenger
    #[error("No session for challenger on claim {0}")]
    NoSession(String),

    /// The superblock is not ready for the requested transition
    #[error("Superblock not ready: {0}")]
    NotReady(String),

    /// The superblock has already reached a terminal status
    #[error("Superblock already decided: {0}")]
    AlreadyDecided(String),

    /// The caller already has an open challenge on this claim
    #[error("Already challenged: {0}")]
    AlreadyChallenged(String),

    /// The challenge window for this claim has elapsed
    #[error("Challenge window elapsed for claim {0}")]
    WindowElapsed(String),

    /// The relay has already been initialized
    #[error("Relay already initialized")]
    AlreadyInitialized,

    /// The relay has not been initialized
    #[error("Relay not initialized")]
    NotInitialized,

    /// The caller's bonded balance is below the required minimum
    #[error("Insufficient deposit: required {required}, available {available}")]
    InsufficientDeposit { required: u64, available: u64 },

    /// Withdrawal amount exceeds the free balance
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: u64, available: u64 },

    /// The caller is not the party whose turn it is
    #[error("Not your turn in session {0}")]
    NotYourTurn(String),

    /// The session is not in the state required by the operation
    #[error("Wrong session state: {0}")]
    WrongState(String),

    /// The queried step is outside the current search range
    #[error("Step {step} outside search range [{low}, {high})")]
    StepOutOfRange { step: usize, low: usize, high: usize },

    /// The session deadline has passed; resolve via timeout instead
    #[error("Session deadline passed: {0}")]
    SessionExpired(String),

    /// Balance arithmetic overflowed
    #[error("Arithmetic overflow")]
    ArithmeticOverflow,

    /// State machine invariant violation; indicates a bug, not user error
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

impl RelayError {
    /// Convert to a stable numeric error code
    pub fn to_error_code(&self) -> u32 {
        match self {
            RelayError::DuplicateSuperblock(_) => 1000,
            RelayError::UnknownParent(_) => 1001,
            RelayError::UnknownSuperblock(_) => 1002,
            RelayError::UnknownClaim(_) => 1003,
            RelayError::UnknownSession(_) => 1004,
            RelayError::NoSession(_) => 1005,
            RelayError::NotReady(_) => 1006,
            RelayError::AlreadyDecided(_) => 1007,
            RelayError::AlreadyChallenged(_) => 1008,
            RelayError::WindowElapsed(_) => 1009,
            RelayError::AlreadyInitialized => 1010,
            RelayError::NotInitialized => 1011,
            RelayError::InsufficientDeposit { .. } => 1012,
            RelayError::InsufficientBalance { .. } => 1013,
            RelayError::NotYourTurn(_) => 1014,
            RelayError::WrongState(_) => 1015,
            RelayError::StepOutOfRange { .. } => 1016,
            RelayError::SessionExpired(_) => 1017,
            RelayError::ArithmeticOverflow => 1018,
            RelayError::InvalidTransition(_) => 1019,
            RelayError::EmptyBatch => 1020,
        }
    }

    /// Whether this error is a recoverable protocol outcome, as opposed
    /// to an invariant violation
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            RelayError::InvalidTransition(_) | RelayError::ArithmeticOverflow
        )
    }
}
