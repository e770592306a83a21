use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{
    ApplicationId, ApplicationRecord, ApplicationStatus, Receipt, ReceiptId, StudentId,
    StudentRecord,
};
use super::lifecycle::StudentStatus;

/// Storage for intake records.
///
/// `update_application` is conditional on `record.version` in the same way as
/// [`StudentRepository::update_student`].
pub trait ApplicationRepository: Send + Sync {
    fn insert_application(
        &self,
        record: ApplicationRecord,
    ) -> Result<ApplicationRecord, RepositoryError>;
    fn update_application(
        &self,
        record: ApplicationRecord,
    ) -> Result<ApplicationRecord, RepositoryError>;
    fn fetch_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<ApplicationRecord>, RepositoryError>;
    fn applications_by_status(
        &self,
        status: ApplicationStatus,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError>;
}

/// Storage for the student aggregate.
///
/// `insert_student` must fail with [`RepositoryError::Conflict`] when a student already exists
/// for the same application. `update_student` is a conditional write: it must fail with [`RepositoryError::Conflict`]
/// unless the stored version equals `record.version`, and must return the stored record with
/// its version incremented.
pub trait StudentRepository: Send + Sync {
    fn insert_student(&self, record: StudentRecord) -> Result<StudentRecord, RepositoryError>;
    fn update_student(&self, record: StudentRecord) -> Result<StudentRecord, RepositoryError>;
    fn fetch_student(&self, id: &StudentId) -> Result<Option<StudentRecord>, RepositoryError>;
    fn student_for_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<StudentRecord>, RepositoryError>;
    fn students(&self) -> Result<Vec<StudentRecord>, RepositoryError>;
    fn students_by_status(
        &self,
        status: StudentStatus,
    ) -> Result<Vec<StudentRecord>, RepositoryError>;
    fn students_by_assigned_class(
        &self,
        assigned_class: &str,
    ) -> Result<Vec<StudentRecord>, RepositoryError>;
}

/// Storage for the receipt ledger. `consume_receipt`, `release_receipt` and
/// `remove_unused_receipt` must each run as one atomic check-and-write.
pub trait ReceiptRepository: Send + Sync {
    /// Fails with [`RepositoryError::Conflict`] when the number is already registered.
    fn insert_receipt(&self, receipt: Receipt) -> Result<Receipt, RepositoryError>;
    fn fetch_receipt(&self, number: &str) -> Result<Option<Receipt>, RepositoryError>;
    fn receipts(&self) -> Result<Vec<Receipt>, RepositoryError>;
    fn consume_receipt(
        &self,
        number: &str,
        student: &StudentId,
    ) -> Result<ReceiptConsumption, RepositoryError>;
    /// Clears the binding only while `student` holds the receipt; returns whether it did.
    fn release_receipt(&self, number: &str, student: &StudentId) -> Result<bool, RepositoryError>;
    fn remove_unused_receipt(&self, id: &ReceiptId) -> Result<ReceiptRemoval, RepositoryError>;
}

/// Named monotonically increasing counters.
pub trait SequenceRepository: Send + Sync {
    /// Atomically increments `sequence` and returns the new value (first value is 1).
    fn next_value(&self, sequence: &str) -> Result<u64, RepositoryError>;
}

/// Everything the enrollment service persists.
pub trait AdmissionsStore:
    ApplicationRepository + StudentRepository + ReceiptRepository + SequenceRepository
{
}

impl<T> AdmissionsStore for T where
    T: ApplicationRepository + StudentRepository + ReceiptRepository + SequenceRepository
{
}

/// Result of the atomic consume primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptConsumption {
    Consumed(Receipt),
    AlreadyUsed(Receipt),
    Missing,
}

/// Result of the atomic delete-if-unused primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptRemoval {
    Removed(Receipt),
    InUse(Receipt),
    Missing,
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists or was modified concurrently")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound notification hook (mail composer, SMS gateway, ...).
pub trait NotificationPublisher: Send + Sync {
    fn publish(&self, notification: Notification) -> Result<(), NotificationError>;
}

/// Data handed to the notification composer; formatting and delivery happen downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub template: String,
    pub student_id: StudentId,
    pub details: BTreeMap<String, String>,
}

/// Notification dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
