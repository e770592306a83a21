use super::assessment::{AssessmentIncomplete, AssessmentInputError};
use super::domain::{ApplicationId, ReceiptId, StudentId};
use super::ledger::LedgerError;
use super::lifecycle::InvalidTransition;
use super::repository::RepositoryError;

/// A precondition was not met; nothing was written.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error(transparent)]
    Transition(#[from] InvalidTransition),
    #[error(transparent)]
    AssessmentInput(#[from] AssessmentInputError),
    #[error(transparent)]
    AssessmentIncomplete(#[from] AssessmentIncomplete),
    #[error(transparent)]
    Receipt(LedgerError),
    #[error("invalid application: {0}")]
    Submission(String),
    #[error("application {0} is {1} and cannot be reviewed again")]
    ApplicationNotPending(ApplicationId, &'static str),
    #[error("application {application_id} has already been enrolled as {student_id}")]
    AlreadyEnrolled {
        application_id: ApplicationId,
        student_id: StudentId,
    },
    #[error("receipt number must not be blank")]
    BlankReceiptNumber,
    #[error("the parent self-care questionnaire has already been submitted; submit an amendment instead")]
    SelfCareAlreadySubmitted,
    #[error("there is no parent self-care questionnaire to amend")]
    SelfCareNotSubmitted,
    #[error("student {0} has no level or grade to place into a class")]
    MissingBaseLevel(StudentId),
}

/// A referenced record does not exist, or a receipt has already been spent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotFoundError {
    #[error("student {0} was not found")]
    Student(StudentId),
    #[error("application {0} was not found")]
    Application(ApplicationId),
    #[error("receipt {0} was not found")]
    Receipt(String),
    #[error("receipt {0} has already been used")]
    ReceiptConsumed(String),
    #[error("no receipt with id {0}")]
    ReceiptRecord(ReceiptId),
}

/// Error raised by the enrollment service.
#[derive(Debug, thiserror::Error)]
pub enum EnrollmentServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    #[error("the record was modified concurrently; retry the operation")]
    Concurrency,
    #[error("persistence failure: {0}")]
    Persistence(RepositoryError),
}

impl From<RepositoryError> for EnrollmentServiceError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict => Self::Concurrency,
            other => Self::Persistence(other),
        }
    }
}

impl From<LedgerError> for EnrollmentServiceError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::NotFound(number) => NotFoundError::Receipt(number).into(),
            LedgerError::AlreadyConsumed { number, .. } => {
                NotFoundError::ReceiptConsumed(number).into()
            }
            LedgerError::UnknownReceipt(id) => NotFoundError::ReceiptRecord(id).into(),
            LedgerError::Repository(err) => err.into(),
            other => ValidationError::Receipt(other).into(),
        }
    }
}

impl From<InvalidTransition> for EnrollmentServiceError {
    fn from(value: InvalidTransition) -> Self {
        ValidationError::from(value).into()
    }
}

impl From<AssessmentInputError> for EnrollmentServiceError {
    fn from(value: AssessmentInputError) -> Self {
        ValidationError::from(value).into()
    }
}

impl From<AssessmentIncomplete> for EnrollmentServiceError {
    fn from(value: AssessmentIncomplete) -> Self {
        ValidationError::from(value).into()
    }
}
