//! Ledger transaction records
//!
//! A successful transfer writes exactly two records: a WITHDRAWAL on the source
//! account and a DEPOSIT on the destination. Records are immutable once stored.

use super::account::{Account, AccountId};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transaction record identifier, assigned by the store on commit
pub type TransactionId = u64;

/// Direction of a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    /// Funds left the account
    Withdrawal,

    /// Funds entered the account
    Deposit,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionType::Withdrawal => f.write_str("WITHDRAWAL"),
            TransactionType::Deposit => f.write_str("DEPOSIT"),
        }
    }
}

/// Immutable ledger entry
///
/// Exactly one of `withdrawal_amount` and `deposit_amount` is non-zero.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    /// Store-assigned id; zero until the record is committed
    pub id: TransactionId,

    /// Account this entry belongs to
    pub account_id: AccountId,

    /// Moment of the transfer, shared by both records of a pair
    pub timestamp: NaiveDateTime,

    pub tx_type: TransactionType,

    /// Holder name of the source account
    pub sender: String,

    /// Holder name of the destination account
    pub receiver: String,

    pub withdrawal_amount: Decimal,

    pub deposit_amount: Decimal,

    /// Balance of `account_id` right after this entry
    pub balance_after: Decimal,
}

impl TransactionRecord {
    /// Build the withdrawal/deposit pair for a transfer of `amount`
    ///
    /// `source` and `destination` must already reflect the mutation, so their
    /// balances become the snapshots.
    pub fn transfer_pair(
        source: &Account,
        destination: &Account,
        amount: Decimal,
        timestamp: NaiveDateTime,
    ) -> [TransactionRecord; 2] {
        let withdrawal = TransactionRecord {
            id: 0,
            account_id: source.id,
            timestamp,
            tx_type: TransactionType::Withdrawal,
            sender: source.holder_name.clone(),
            receiver: destination.holder_name.clone(),
            withdrawal_amount: amount,
            deposit_amount: Decimal::ZERO,
            balance_after: source.balance,
        };

        let deposit = TransactionRecord {
            id: 0,
            account_id: destination.id,
            timestamp,
            tx_type: TransactionType::Deposit,
            sender: source.holder_name.clone(),
            receiver: destination.holder_name.clone(),
            withdrawal_amount: Decimal::ZERO,
            deposit_amount: amount,
            balance_after: destination.balance,
        };

        [withdrawal, deposit]
    }

    /// The non-zero side of the entry
    pub fn amount(&self) -> Decimal {
        match self.tx_type {
            TransactionType::Withdrawal => self.withdrawal_amount,
            TransactionType::Deposit => self.deposit_amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::account::AccountStatus;
    use chrono::NaiveDate;

    fn account(id: AccountId, name: &str, balance: i64) -> Account {
        Account {
            id,
            user_id: id,
            holder_name: name.to_string(),
            account_number: format!("{:015}", id),
            status: AccountStatus::Active,
            balance: Decimal::new(balance, 0),
            transfer_limit: Decimal::new(5000, 0),
            daily_transfer_limit: Decimal::new(10000, 0),
            daily_transferred_amount: Decimal::ZERO,
            secret_hash: String::new(),
        }
    }

    #[test]
    fn test_transfer_pair_shape() {
        let source = account(1, "Kim", 9000);
        let destination = account(2, "Lee", 2000);
        let ts = NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();

        let [withdrawal, deposit] =
            TransactionRecord::transfer_pair(&source, &destination, Decimal::new(1000, 0), ts);

        assert_eq!(withdrawal.account_id, 1);
        assert_eq!(withdrawal.tx_type, TransactionType::Withdrawal);
        assert_eq!(withdrawal.withdrawal_amount, Decimal::new(1000, 0));
        assert_eq!(withdrawal.deposit_amount, Decimal::ZERO);
        assert_eq!(withdrawal.balance_after, Decimal::new(9000, 0));

        assert_eq!(deposit.account_id, 2);
        assert_eq!(deposit.tx_type, TransactionType::Deposit);
        assert_eq!(deposit.amount(), Decimal::new(1000, 0));
        assert_eq!(deposit.withdrawal_amount, Decimal::ZERO);
        assert_eq!(deposit.balance_after, Decimal::new(2000, 0));

        for record in [&withdrawal, &deposit] {
            assert_eq!(record.sender, "Kim");
            assert_eq!(record.receiver, "Lee");
            assert_eq!(record.timestamp, ts);
        }
    }
}
