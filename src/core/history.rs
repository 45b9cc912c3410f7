//! Transaction history queries

use super::traits::TransactionRepository;
use crate::types::{AccountId, TransactionRecord, TransactionType, TransferError};
use chrono::NaiveDate;
use std::sync::Arc;

/// Condition search over the transaction log
///
/// Both dates are inclusive and compared against the record's calendar date.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryQuery {
    pub account_id: Option<AccountId>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub tx_type: Option<TransactionType>,
}

/// Read-only view over recorded transactions
#[derive(Clone)]
pub struct TransactionHistory {
    transactions: Arc<dyn TransactionRepository>,
}

impl TransactionHistory {
    pub fn new(transactions: Arc<dyn TransactionRepository>) -> Self {
        Self { transactions }
    }

    /// Records of one account, newest first
    pub fn for_account(&self, account_id: AccountId) -> Vec<TransactionRecord> {
        self.transactions.find_by_account(account_id)
    }

    /// Records matching `query`, newest first
    ///
    /// # Errors
    ///
    /// `InvalidDateRange` if `start_date` is after `end_date`
    pub fn search(&self, query: &HistoryQuery) -> Result<Vec<TransactionRecord>, TransferError> {
        if query.start_date > query.end_date {
            return Err(TransferError::invalid_date_range(format!(
                "start date {} is after end date {}",
                query.start_date, query.end_date
            )));
        }

        Ok(self.transactions.find_matching(&|record| {
            let day = record.timestamp.date();
            query.account_id.is_none_or(|id| record.account_id == id)
                && query.tx_type.is_none_or(|kind| record.tx_type == kind)
                && day >= query.start_date
                && day <= query.end_date
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::FixedClock;
    use crate::core::executor::TransferExecutor;
    use crate::core::lock_table::AccountLockTable;
    use crate::core::verifier::PlainSecretVerifier;
    use crate::store::InMemoryStore;
    use crate::types::{Account, AccountStatus, ExecuteTransferRequest};
    use chrono::Duration;
    use rstest::rstest;
    use rust_decimal::Decimal;

    fn account(id: AccountId) -> Account {
        Account {
            id,
            user_id: id,
            holder_name: format!("holder-{id}"),
            account_number: format!("{:015}", id),
            status: AccountStatus::Active,
            balance: Decimal::new(10000, 0),
            transfer_limit: Decimal::new(5000, 0),
            daily_transfer_limit: Decimal::new(100000, 0),
            daily_transferred_amount: Decimal::ZERO,
            secret_hash: "pw".to_string(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Three transfers 1 -> 2 on 1, 2 and 3 June
    fn populated() -> TransactionHistory {
        let store = Arc::new(InMemoryStore::with_accounts(vec![account(1), account(2)]));
        let clock = Arc::new(FixedClock::new(date(2024, 6, 1).and_hms_opt(12, 0, 0).unwrap()));
        let executor = TransferExecutor::new(
            store.clone(),
            store.clone(),
            Arc::new(PlainSecretVerifier),
            clock.clone(),
            Arc::new(AccountLockTable::new()),
            std::time::Duration::from_millis(100),
        );
        for _ in 0..3 {
            executor
                .execute(&ExecuteTransferRequest {
                    source_account_id: 1,
                    destination_account_number: format!("{:015}", 2),
                    amount: Decimal::new(100, 0),
                    secret: "pw".to_string(),
                })
                .unwrap();
            clock.advance(Duration::days(1));
        }
        TransactionHistory::new(store)
    }

    #[test]
    fn test_for_account_newest_first() {
        let history = populated();

        let records = history.for_account(1);

        assert_eq!(records.len(), 3);
        assert!(records.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
        assert_eq!(records[0].balance_after, Decimal::new(9700, 0));
    }

    #[rstest]
    #[case::everything(None, date(2024, 6, 1), date(2024, 6, 3), None, 6)]
    #[case::one_account(Some(2), date(2024, 6, 1), date(2024, 6, 3), None, 3)]
    #[case::one_day(None, date(2024, 6, 2), date(2024, 6, 2), None, 2)]
    #[case::withdrawals(None, date(2024, 6, 1), date(2024, 6, 3), Some(TransactionType::Withdrawal), 3)]
    #[case::outside(None, date(2024, 7, 1), date(2024, 7, 31), None, 0)]
    fn test_search(
        #[case] account_id: Option<AccountId>,
        #[case] start_date: NaiveDate,
        #[case] end_date: NaiveDate,
        #[case] tx_type: Option<TransactionType>,
        #[case] expected: usize,
    ) {
        let history = populated();
        let query = HistoryQuery {
            account_id,
            start_date,
            end_date,
            tx_type,
        };

        assert_eq!(history.search(&query).unwrap().len(), expected);
    }

    #[test]
    fn test_search_rejects_inverted_range() {
        let history = populated();
        let query = HistoryQuery {
            account_id: None,
            start_date: date(2024, 6, 3),
            end_date: date(2024, 6, 1),
            tx_type: None,
        };

        assert!(matches!(
            history.search(&query).unwrap_err(),
            TransferError::InvalidDateRange { .. }
        ));
    }
}
