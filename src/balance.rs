//! ENFORCED BALANCE TYPE
//!
//! The single source of truth for an account's money. ALL balance mutations
//! MUST go through these methods.
//!
//! # Enforcement Strategy:
//! 1. Fields are PRIVATE - no direct access
//! 2. All mutations return Result - errors are explicit
//! 3. Version auto-increments - audit trail
//! 4. checked_add/sub - overflow protection, never negative

use crate::money::Amount;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BalanceError {
    #[error("Insufficient funds: available {available}, requested {requested}")]
    Insufficient { available: Amount, requested: Amount },

    #[error("Balance overflow")]
    Overflow,
}

/// Balance of a single account
///
/// # Invariants (ENFORCED by private fields):
/// - `amount >= 0` (unsigned, checked subtraction)
/// - `version` increments on every successful mutation
///
/// # Usage:
/// ```ignore
/// let mut balance = Balance::new(Amount::from_cents(100_000));
/// balance.debit(Amount::from_cents(25_000))?;   // 750.00, version 1
/// balance.credit(Amount::from_cents(5_000))?;   // 800.00, version 2
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Balance {
    amount: Amount, // PRIVATE - ONLY modified through credit/debit
    version: u64,   // PRIVATE - incremented on every mutation
}

impl Balance {
    pub const fn new(initial: Amount) -> Self {
        Self {
            amount: initial,
            version: 0,
        }
    }

    /// Current amount (read-only)
    #[inline(always)]
    pub const fn amount(&self) -> Amount {
        self.amount
    }

    /// Mutation counter (read-only)
    #[inline(always)]
    pub const fn version(&self) -> u64 {
        self.version
    }

    #[inline]
    pub fn can_cover(&self, amount: Amount) -> bool {
        self.amount >= amount
    }

    /// Add funds
    ///
    /// # Errors
    /// - `Overflow` if the result does not fit
    pub fn credit(&mut self, amount: Amount) -> Result<(), BalanceError> {
        self.amount = self
            .amount
            .checked_add(amount)
            .ok_or(BalanceError::Overflow)?;
        self.version = self.version.wrapping_add(1);
        Ok(())
    }

    /// Remove funds
    ///
    /// # Errors
    /// - `Insufficient` if the balance is smaller than `amount`; the balance
    ///   is left untouched
    pub fn debit(&mut self, amount: Amount) -> Result<(), BalanceError> {
        self.amount = self
            .amount
            .checked_sub(amount)
            .ok_or(BalanceError::Insufficient {
                available: self.amount,
                requested: amount,
            })?;
        self.version = self.version.wrapping_add(1);
        Ok(())
    }
}
