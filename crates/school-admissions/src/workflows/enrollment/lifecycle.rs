use serde::{Deserialize, Serialize};

use super::domain::Division;

/// Enrollment state of a student record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StudentStatus {
    WaitingPayment,
    PaymentVerification,
    Assessment,
    Enrolled,
}

impl StudentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            StudentStatus::WaitingPayment => "waiting_payment",
            StudentStatus::PaymentVerification => "payment_verification",
            StudentStatus::Assessment => "assessment",
            StudentStatus::Enrolled => "enrolled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "waiting_payment" => Some(StudentStatus::WaitingPayment),
            "payment_verification" => Some(StudentStatus::PaymentVerification),
            "assessment" => Some(StudentStatus::Assessment),
            "enrolled" => Some(StudentStatus::Enrolled),
            _ => None,
        }
    }

    /// Single transition table for the enrollment lifecycle.
    pub fn apply(self, event: EnrollmentEvent) -> Result<StudentStatus, InvalidTransition> {
        use EnrollmentEvent as E;
        use StudentStatus as S;

        let next = match (self, event) {
            (S::WaitingPayment, E::ReceiptSubmitted) => S::PaymentVerification,
            (S::PaymentVerification, E::PaymentVerified(Division::SpecialNeeds)) => S::Assessment,
            (S::PaymentVerification, E::PaymentVerified(Division::Mainstream)) => S::Enrolled,
            (S::PaymentVerification, E::PaymentRejected) => S::WaitingPayment,
            (S::Assessment, E::DayRecorded | E::SelfCareRecorded | E::SelfCareAmended) => {
                S::Assessment
            }
            (S::Assessment, E::AssessmentFinalized) => S::Enrolled,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

/// Inputs that drive the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollmentEvent {
    ReceiptSubmitted,
    PaymentVerified(Division),
    PaymentRejected,
    DayRecorded,
    SelfCareRecorded,
    SelfCareAmended,
    AssessmentFinalized,
}

impl EnrollmentEvent {
    pub const fn action(self) -> &'static str {
        match self {
            EnrollmentEvent::ReceiptSubmitted => "submit a receipt",
            EnrollmentEvent::PaymentVerified(_) => "verify payment",
            EnrollmentEvent::PaymentRejected => "reject payment",
            EnrollmentEvent::DayRecorded => "record an assessment day",
            EnrollmentEvent::SelfCareRecorded => "record the parent self-care questionnaire",
            EnrollmentEvent::SelfCareAmended => "amend the parent self-care questionnaire",
            EnrollmentEvent::AssessmentFinalized => "finalize the assessment",
        }
    }
}

/// A (state, event) pair outside the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot {} while student is {}", .event.action(), .from.label())]
pub struct InvalidTransition {
    pub from: StudentStatus,
    pub event: EnrollmentEvent,
}
