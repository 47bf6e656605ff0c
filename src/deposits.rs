// src/deposits.rs
//! Bonded deposit ledger for relay participants
//!
//! Tracks per-participant balances in two buckets: free funds that may
//! be withdrawn at any time, and bonded funds locked behind an open
//! claim. Only the claim manager moves funds between buckets, and every
//! slash is attributable to exactly one settled verdict.

use crate::{error::RelayError, Address};
use borsh::{BorshDeserialize, BorshSerialize};
use std::collections::HashMap;

/// Per-participant balance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Balance {
    /// Withdrawable funds
    pub free: u64,

    /// Funds locked behind open claims
    pub bonded: u64,
}

/// Deposit ledger for all relay participants
#[derive(Debug, Default, BorshSerialize, BorshDeserialize)]
pub struct DepositsManager {
    /// Balances by participant
    balances: HashMap<Address, Balance>,
}

impl DepositsManager {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self {
            balances: HashMap::new(),
        }
    }

    /// Credit a participant's free balance
    ///
    /// Deposits never fail for protocol reasons; the only failure mode
    /// is balance overflow.
    pub fn deposit(&mut self, account: Address, amount: u64) -> Result<u64, RelayError> {
        let balance = self.balances.entry(account).or_default();
        balance.free = balance
            .free
            .checked_add(amount)
            .ok_or(RelayError::ArithmeticOverflow)?;
        log::debug!(
            "deposit {} for {}, free balance {}",
            amount,
            hex::encode(&account[..8]),
            balance.free
        );
        Ok(balance.free)
    }

    /// Debit a participant's free balance and release the funds
    pub fn withdraw(&mut self, account: Address, amount: u64) -> Result<u64, RelayError> {
        let balance = self.balances.entry(account).or_default();
        if balance.free < amount {
            return Err(RelayError::InsufficientBalance {
                requested: amount,
                available: balance.free,
            });
        }
        balance.free -= amount;
        Ok(balance.free)
    }

    /// Lock part of a participant's free balance behind a claim
    pub fn bond(&mut self, account: Address, amount: u64) -> Result<(), RelayError> {
        let balance = self.balances.entry(account).or_default();
        if balance.free < amount {
            return Err(RelayError::InsufficientDeposit {
                required: amount,
                available: balance.free,
            });
        }
        balance.free -= amount;
        balance.bonded = balance
            .bonded
            .checked_add(amount)
            .ok_or(RelayError::ArithmeticOverflow)?;
        Ok(())
    }

    /// Release bonded funds back to the free balance
    ///
    /// Capped at the actually bonded amount, so a settlement path can
    /// never manufacture funds.
    pub fn unbond(&mut self, account: Address, amount: u64) -> u64 {
        let balance = self.balances.entry(account).or_default();
        let released = amount.min(balance.bonded);
        balance.bonded -= released;
        balance.free += released;
        released
    }

    /// Move bonded funds from a losing participant to the winner
    ///
    /// Partial slash policy: moves up to the loser's remaining bond and
    /// returns the amount actually transferred, never a hard failure.
    pub fn slash(&mut self, loser: Address, amount: u64, beneficiary: Address) -> u64 {
        let balance = self.balances.entry(loser).or_default();
        let slashed = amount.min(balance.bonded);
        balance.bonded -= slashed;

        let winner = self.balances.entry(beneficiary).or_default();
        winner.free = winner.free.saturating_add(slashed);

        log::info!(
            "slashed {} from {} to {}",
            slashed,
            hex::encode(&loser[..8]),
            hex::encode(&beneficiary[..8])
        );
        slashed
    }

    /// A participant's balance
    pub fn balance_of(&self, account: &Address) -> Balance {
        self.balances.get(account).copied().unwrap_or_default()
    }

    /// A participant's free balance
    pub fn free_balance(&self, account: &Address) -> u64 {
        self.balance_of(account).free
    }

    /// Total funds held by the ledger, free and bonded
    pub fn total_held(&self) -> u64 {
        self.balances
            .values()
            .fold(0u64, |total, b| {
                total.saturating_add(b.free).saturating_add(b.bonded)
            })
    }
}
