//! Admission of learners: application review, registration-fee verification against the
//! receipt ledger, and the 14-day special-needs assessment that places a learner into a stage.

pub mod assessment;
pub mod domain;
mod errors;
pub mod identity;
pub mod ledger;
pub mod lifecycle;
pub mod memory;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use assessment::{AssessmentIncomplete, AssessmentInputError, StageOutcome};
pub use domain::{
    level_for_age, AbcLog, ApplicationId, ApplicationRecord, ApplicationStatus,
    ApplicationSubmission, AssessmentData, AssessmentDay, AssessmentDayInput, DailyScores,
    Division, GuardianContact, PendingActionCounts, Receipt, ReceiptId, Response,
    SelfCareAssessment, SelfCareInput, SelfCareResponses, Stage, StudentId, StudentRecord,
    StudentStatusView, ThinkingTask,
};
pub use errors::{EnrollmentServiceError, NotFoundError, ValidationError};
pub use identity::StudentIdAllocator;
pub use ledger::{LedgerError, ReceiptLedger};
pub use lifecycle::{EnrollmentEvent, InvalidTransition, StudentStatus};
pub use memory::{MemoryNotifications, MemoryStore};
pub use repository::{
    AdmissionsStore, ApplicationRepository, Notification, NotificationError,
    NotificationPublisher, ReceiptConsumption, ReceiptRemoval, ReceiptRepository,
    RepositoryError, SequenceRepository, StudentRepository,
};
pub use router::enrollment_router;
pub use service::{EnrollmentService, FinalizedAssessment, PaymentVerification};
