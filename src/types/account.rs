//! Account-related types for the Funds Transfer Engine
//!
//! This module defines the Account structure together with the ledger rules
//! that guard every change to its balance. `withdraw` and `deposit` are the only
//! mutation entry points; everything else reads.

use super::error::TransferError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Account identifier
///
/// Also the key of the global lock order: locks are always taken in ascending id order.
pub type AccountId = u64;

/// Identifier of the user owning an account or a scheduled transfer
pub type UserId = u64;

/// Number of digits in an account number
pub const ACCOUNT_NUMBER_LENGTH: usize = 15;

/// Administrative status of an account
///
/// Only ACTIVE accounts may send funds. Any status may receive them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountStatus {
    Active,
    Dormant,
    Blocked,
    Closed,
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AccountStatus::Active => "ACTIVE",
            AccountStatus::Dormant => "DORMANT",
            AccountStatus::Blocked => "BLOCKED",
            AccountStatus::Closed => "CLOSED",
        };
        f.write_str(label)
    }
}

/// Account state and ledger invariants
///
/// Invariants maintained by [`Account::withdraw`] and [`Account::deposit`]:
/// - `balance >= 0`
/// - `daily_transferred_amount <= daily_transfer_limit`
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    /// Unique account id
    pub id: AccountId,

    /// Owning user
    pub user_id: UserId,

    /// Name of the account holder
    ///
    /// Written into transaction records as sender or receiver.
    pub holder_name: String,

    /// Fifteen-digit account number, unique across the ledger
    ///
    /// External callers address destination accounts by this number.
    pub account_number: String,

    /// Administrative status
    pub status: AccountStatus,

    /// Current balance, never negative
    pub balance: Decimal,

    /// Maximum amount of a single outgoing transfer
    pub transfer_limit: Decimal,

    /// Maximum cumulative outgoing amount per day
    pub daily_transfer_limit: Decimal,

    /// Amount sent so far today
    ///
    /// Reset to zero by the daily maintenance operation.
    pub daily_transferred_amount: Decimal,

    /// Hash of the authorization secret
    ///
    /// Only ever compared through a [`crate::core::SecretVerifier`].
    pub secret_hash: String,
}

impl Account {
    /// Move `amount` out of this account
    ///
    /// The checks run in a fixed order and the first violation wins:
    ///
    /// 1. status must be ACTIVE
    /// 2. `amount` must not exceed the per-transaction limit
    /// 3. today's total plus `amount` must not exceed the daily limit
    /// 4. `amount` must not exceed the balance
    ///
    /// # Errors
    ///
    /// Returns the error for the first failing check. The account is left
    /// untouched on any error.
    pub fn withdraw(&mut self, amount: Decimal) -> Result<(), TransferError> {
        if amount < Decimal::ZERO {
            return Err(TransferError::invalid_amount(amount));
        }

        if self.status != AccountStatus::Active {
            return Err(TransferError::invalid_account_status(self.id, self.status));
        }

        if amount > self.transfer_limit {
            return Err(TransferError::transfer_limit_exceeded(
                self.id,
                self.transfer_limit,
                amount,
            ));
        }

        let new_daily = self
            .daily_transferred_amount
            .checked_add(amount)
            .ok_or_else(|| TransferError::arithmetic_overflow("withdrawal", self.id))?;

        if new_daily > self.daily_transfer_limit {
            return Err(TransferError::daily_transfer_limit_exceeded(
                self.id,
                self.daily_transfer_limit,
                self.daily_transferred_amount,
                amount,
            ));
        }

        if amount > self.balance {
            return Err(TransferError::insufficient_balance(
                self.id,
                self.balance,
                amount,
            ));
        }

        self.balance -= amount;
        self.daily_transferred_amount = new_daily;

        Ok(())
    }

    /// Move `amount` into this account
    ///
    /// No status or limit checks apply: a restricted account still receives funds.
    /// A zero amount is a no-op.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` for a negative amount
    /// - `ArithmeticOverflow` if the balance would overflow
    pub fn deposit(&mut self, amount: Decimal) -> Result<(), TransferError> {
        if amount < Decimal::ZERO {
            return Err(TransferError::invalid_amount(amount));
        }

        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or_else(|| TransferError::arithmetic_overflow("deposit", self.id))?;

        Ok(())
    }

    /// Clear today's transferred amount at day rollover
    pub fn reset_daily_usage(&mut self) {
        self.daily_transferred_amount = Decimal::ZERO;
    }
}

/// Check that `number` is exactly [`ACCOUNT_NUMBER_LENGTH`] ASCII digits
pub fn validate_account_number(number: &str) -> Result<(), TransferError> {
    if number.len() == ACCOUNT_NUMBER_LENGTH && number.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(TransferError::InvalidAccountNumber {
            number: number.to_string(),
        })
    }
}
