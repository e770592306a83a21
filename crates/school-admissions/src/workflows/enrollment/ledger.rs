use std::sync::Arc;

use chrono::NaiveDate;

use super::domain::{Receipt, ReceiptId, StudentId};
use super::identity::RECEIPT_SEQUENCE;
use super::repository::{
    ReceiptConsumption, ReceiptRemoval, ReceiptRepository, RepositoryError, SequenceRepository,
};

/// Registry of prepaid receipt numbers; each number can be consumed once.
pub struct ReceiptLedger<R> {
    repository: Arc<R>,
}

impl<R> ReceiptLedger<R>
where
    R: ReceiptRepository + SequenceRepository,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Register a new unused receipt.
    pub fn add(&self, number: &str, amount: u32, issued_on: NaiveDate) -> Result<Receipt, LedgerError> {
        let number = normalize_number(number)?;
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }

        let sequence = self.repository.next_value(RECEIPT_SEQUENCE)?;
        let receipt = Receipt {
            id: ReceiptId(format!("RCT-{sequence:06}")),
            number: number.clone(),
            amount,
            issued_on,
            is_used: false,
            used_by_student_id: None,
        };

        match self.repository.insert_receipt(receipt) {
            Ok(stored) => Ok(stored),
            Err(RepositoryError::Conflict) => Err(LedgerError::Duplicate(number)),
            Err(other) => Err(other.into()),
        }
    }

    /// Atomically mark the receipt used by `student`.
    pub fn consume(&self, number: &str, student: &StudentId) -> Result<ReceiptId, LedgerError> {
        let number = normalize_number(number)?;
        match self.repository.consume_receipt(&number, student)? {
            ReceiptConsumption::Consumed(receipt) => Ok(receipt.id),
            ReceiptConsumption::AlreadyUsed(receipt) => Err(LedgerError::AlreadyConsumed {
                number,
                used_by: receipt.used_by_student_id,
                receipt_id: receipt.id,
            }),
            ReceiptConsumption::Missing => Err(LedgerError::NotFound(number)),
        }
    }

    /// Undo a consume whose follow-up write failed. A receipt held by another student is left alone.
    pub fn release(&self, number: &str, student: &StudentId) -> Result<bool, LedgerError> {
        let number = normalize_number(number)?;
        Ok(self.repository.release_receipt(&number, student)?)
    }

    /// Remove a receipt that has not been consumed.
    pub fn delete(&self, id: &ReceiptId) -> Result<Receipt, LedgerError> {
        match self.repository.remove_unused_receipt(id)? {
            ReceiptRemoval::Removed(receipt) => Ok(receipt),
            ReceiptRemoval::InUse(receipt) => Err(LedgerError::InUse(receipt.number)),
            ReceiptRemoval::Missing => Err(LedgerError::UnknownReceipt(id.clone())),
        }
    }

    pub fn list(&self) -> Result<Vec<Receipt>, LedgerError> {
        Ok(self.repository.receipts()?)
    }
}

fn normalize_number(raw: &str) -> Result<String, LedgerError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::BlankNumber);
    }
    Ok(trimmed.to_string())
}

/// Receipt ledger failures.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("receipt number must not be blank")]
    BlankNumber,
    #[error("receipt amount must be greater than zero")]
    InvalidAmount,
    #[error("receipt {0} is already registered")]
    Duplicate(String),
    #[error("receipt {0} was not found")]
    NotFound(String),
    #[error("receipt {number} has already been used")]
    AlreadyConsumed {
        number: String,
        receipt_id: ReceiptId,
        used_by: Option<StudentId>,
    },
    #[error("receipt {0} has been used and cannot be deleted")]
    InUse(String),
    #[error("no receipt with id {0}")]
    UnknownReceipt(ReceiptId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::enrollment::memory::MemoryStore;
    use std::sync::Barrier;
    use std::thread;

    fn issued_on() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 6).expect("valid date")
    }

    fn ledger() -> (ReceiptLedger<MemoryStore>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::default());
        (ReceiptLedger::new(store.clone()), store)
    }

    #[test]
    fn add_registers_unused_receipt() {
        let (ledger, _) = ledger();
        let receipt = ledger.add("  R-1001 ", 1500, issued_on()).expect("receipt added");

        assert_eq!(receipt.number, "R-1001");
        assert_eq!(receipt.id, ReceiptId("RCT-000001".to_string()));
        assert!(!receipt.is_used);
        assert!(receipt.used_by_student_id.is_none());
    }

    #[test]
    fn add_rejects_duplicates_blank_numbers_and_zero_amounts() {
        let (ledger, _) = ledger();
        ledger.add("R-1001", 1500, issued_on()).expect("first add");

        assert!(matches!(
            ledger.add("R-1001", 900, issued_on()),
            Err(LedgerError::Duplicate(number)) if number == "R-1001"
        ));
        assert!(matches!(
            ledger.add("   ", 900, issued_on()),
            Err(LedgerError::BlankNumber)
        ));
        assert!(matches!(
            ledger.add("R-1002", 0, issued_on()),
            Err(LedgerError::InvalidAmount)
        ));
    }

    #[test]
    fn consume_flips_once_and_binds_student() {
        let (ledger, store) = ledger();
        let added = ledger.add("R-1001", 1500, issued_on()).expect("receipt added");
        let student = StudentId("STU-00001".to_string());

        let consumed = ledger.consume("R-1001", &student).expect("first consume");
        assert_eq!(consumed, added.id);

        let stored = store
            .fetch_receipt("R-1001")
            .expect("fetch")
            .expect("receipt present");
        assert!(stored.is_used);
        assert_eq!(stored.used_by_student_id, Some(student.clone()));

        let other = StudentId("STU-00002".to_string());
        match ledger.consume("R-1001", &other) {
            Err(LedgerError::AlreadyConsumed { used_by, .. }) => {
                assert_eq!(used_by, Some(student));
            }
            other => panic!("expected already consumed, got {other:?}"),
        }
    }

    #[test]
    fn consume_reports_missing_numbers() {
        let (ledger, _) = ledger();
        let student = StudentId("STU-00001".to_string());
        assert!(matches!(
            ledger.consume("R-404", &student),
            Err(LedgerError::NotFound(number)) if number == "R-404"
        ));
    }

    #[test]
    fn concurrent_consumers_get_exactly_one_success() {
        let (ledger, _) = ledger();
        ledger.add("R-2000", 1500, issued_on()).expect("receipt added");
        let ledger = Arc::new(ledger);
        let barrier = Arc::new(Barrier::new(6));

        let handles: Vec<_> = (0..6)
            .map(|index| {
                let ledger = ledger.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    let student = StudentId(format!("STU-{index:05}"));
                    barrier.wait();
                    ledger.consume("R-2000", &student).is_ok()
                })
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|handle| handle.join().expect("consumer thread"))
            .filter(|won| *won)
            .count();
        assert_eq!(successes, 1);
    }

    #[test]
    fn delete_only_removes_unused_receipts() {
        let (ledger, _) = ledger();
        let unused = ledger.add("R-1", 100, issued_on()).expect("unused");
        let used = ledger.add("R-2", 100, issued_on()).expect("used");
        ledger
            .consume("R-2", &StudentId("STU-00009".to_string()))
            .expect("consume");

        assert_eq!(ledger.delete(&unused.id).expect("delete unused").number, "R-1");
        assert!(matches!(
            ledger.delete(&used.id),
            Err(LedgerError::InUse(number)) if number == "R-2"
        ));
        assert!(matches!(
            ledger.delete(&unused.id),
            Err(LedgerError::UnknownReceipt(_))
        ));
        assert_eq!(ledger.list().expect("list").len(), 1);
    }

    #[test]
    fn release_only_clears_own_binding() {
        let (ledger, store) = ledger();
        ledger.add("R-3000", 1500, issued_on()).expect("receipt added");
        let owner = StudentId("STU-00001".to_string());
        let other = StudentId("STU-00002".to_string());
        ledger.consume("R-3000", &owner).expect("consume");

        assert!(!ledger.release("R-3000", &other).expect("release by other"));
        assert!(store
            .fetch_receipt("R-3000")
            .expect("fetch")
            .expect("present")
            .is_used);

        assert!(ledger.release(" R-3000 ", &owner).expect("release by owner"));
        let receipt = store.fetch_receipt("R-3000").expect("fetch").expect("present");
        assert!(!receipt.is_used);
        assert_eq!(receipt.used_by_student_id, None);
        assert_eq!(
            ledger.consume("R-3000", &other).expect("consumed again"),
            receipt.id
        );
    }
}
