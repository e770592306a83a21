use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::assessment::{resolve_stage, score_day, score_self_care, StageOutcome};
use super::domain::{
    level_for_age, ApplicationId, ApplicationRecord, ApplicationStatus, ApplicationSubmission,
    AssessmentData, AssessmentDay, AssessmentDayInput, Division, PendingActionCounts, Receipt,
    ReceiptId, SelfCareAssessment, SelfCareInput, StudentId, StudentRecord,
};
use super::errors::{EnrollmentServiceError, NotFoundError, ValidationError};
use super::identity::{StudentIdAllocator, APPLICATION_SEQUENCE};
use super::ledger::{LedgerError, ReceiptLedger};
use super::lifecycle::{EnrollmentEvent, StudentStatus};
use super::repository::{AdmissionsStore, Notification, NotificationPublisher, RepositoryError};

/// Student writes retried after a receipt has already been consumed.
const COMMIT_ATTEMPTS: usize = 3;

const DEFAULT_PAYMENT_REJECTION: &str = "payment could not be verified";

/// Service composing the identity allocator, receipt ledger, scoring engine and stage resolver
/// around the student lifecycle.
pub struct EnrollmentService<S, N> {
    store: Arc<S>,
    notifications: Arc<N>,
    ledger: ReceiptLedger<S>,
    allocator: StudentIdAllocator,
}

/// Outcome of a staff payment check. A rejection is a committed transition, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentVerification {
    Verified {
        student: StudentRecord,
        receipt_id: ReceiptId,
    },
    Rejected {
        student: StudentRecord,
        reason: String,
    },
}

impl PaymentVerification {
    pub fn student(&self) -> &StudentRecord {
        match self {
            PaymentVerification::Verified { student, .. }
            | PaymentVerification::Rejected { student, .. } => student,
        }
    }
}

/// Stored student plus the resolver output that placed them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalizedAssessment {
    pub student: StudentRecord,
    pub outcome: StageOutcome,
}

impl<S, N> EnrollmentService<S, N>
where
    S: AdmissionsStore + 'static,
    N: NotificationPublisher + 'static,
{
    pub fn new(store: Arc<S>, notifications: Arc<N>) -> Self {
        Self::with_allocator(store, notifications, StudentIdAllocator::default())
    }

    pub fn with_allocator(
        store: Arc<S>,
        notifications: Arc<N>,
        allocator: StudentIdAllocator,
    ) -> Self {
        let ledger = ReceiptLedger::new(store.clone());
        Self {
            store,
            notifications,
            ledger,
            allocator,
        }
    }

    /// Record a new application awaiting office review.
    pub fn submit_application(
        &self,
        submission: ApplicationSubmission,
        submitted_on: NaiveDate,
    ) -> Result<ApplicationRecord, EnrollmentServiceError> {
        validate_submission(&submission, submitted_on)?;

        let sequence = self.store.next_value(APPLICATION_SEQUENCE)?;
        let record = ApplicationRecord {
            id: ApplicationId(format!("APP-{sequence:06}")),
            submission,
            submitted_on,
            status: ApplicationStatus::Pending,
            review_note: None,
            student_id: None,
            version: 0,
        };

        let stored = self.store.insert_application(record)?;
        info!(
            application_id = %stored.id,
            division = stored.submission.division.label(),
            "application received"
        );
        Ok(stored)
    }

    /// Approve an application and create its student in `WAITING_PAYMENT`.
    ///
    /// The application is claimed (pending to approved) before an id is allocated, so a
    /// concurrent rejection or second approval loses on the version check. An approval that
    /// stopped after the claim is completed by the next call.
    pub fn enroll(
        &self,
        application_id: &ApplicationId,
    ) -> Result<StudentRecord, EnrollmentServiceError> {
        let application = self.claim_application(application_id)?;

        if let Some(existing) = self.store.student_for_application(application_id)? {
            if application.student_id.is_some() {
                return Err(ValidationError::AlreadyEnrolled {
                    application_id: application_id.clone(),
                    student_id: existing.id,
                }
                .into());
            }
            info!(student_id = %existing.id, "completing interrupted approval");
            return self.attach_student(application, existing);
        }

        let student_id = self.allocator.allocate(self.store.as_ref())?;
        let submission = &application.submission;
        let level = match submission.division {
            Division::SpecialNeeds => {
                let age = submission.age_on(application.submitted_on);
                Some(level_for_age(age).to_string())
            }
            Division::Mainstream => None,
        };

        let student = StudentRecord {
            id: student_id,
            application_id: application.id.clone(),
            learner_name: submission.learner_name.trim().to_string(),
            division: submission.division,
            level,
            grade: submission.applied_grade.clone(),
            status: StudentStatus::WaitingPayment,
            receipt_number: None,
            payment_rejected: false,
            rejection_reason: None,
            assessment: None,
            stage: None,
            assigned_class: None,
            version: 0,
        };
        let student = match self.store.insert_student(student) {
            Ok(student) => student,
            Err(RepositoryError::Conflict) => {
                // another approval of this application inserted first
                return match self.store.student_for_application(application_id)? {
                    Some(existing) => Err(ValidationError::AlreadyEnrolled {
                        application_id: application_id.clone(),
                        student_id: existing.id,
                    }
                    .into()),
                    None => Err(EnrollmentServiceError::Concurrency),
                };
            }
            Err(err) => return Err(err.into()),
        };

        let student = self.attach_student(application, student)?;
        info!(
            student_id = %student.id,
            application_id = %application_id,
            division = student.division.label(),
            "application approved"
        );
        self.notify("application_approved", &student, &[]);
        Ok(student)
    }

    /// Close an application without creating a student.
    pub fn reject_application(
        &self,
        application_id: &ApplicationId,
        note: &str,
    ) -> Result<ApplicationRecord, EnrollmentServiceError> {
        let mut application = self.application(application_id)?;
        if application.status != ApplicationStatus::Pending {
            return Err(ValidationError::ApplicationNotPending(
                application.id,
                application.status.label(),
            )
            .into());
        }

        application.status = ApplicationStatus::Rejected;
        let note = note.trim();
        application.review_note = (!note.is_empty()).then(|| note.to_string());
        let application = self.store.update_application(application)?;

        info!(application_id = %application.id, "application rejected");
        Ok(application)
    }

    /// Parent hands in a receipt number for staff to verify.
    pub fn submit_receipt(
        &self,
        student_id: &StudentId,
        number: &str,
    ) -> Result<StudentRecord, EnrollmentServiceError> {
        let number = receipt_number(number)?;
        let mut student = self.student(student_id)?;

        student.status = student.status.apply(EnrollmentEvent::ReceiptSubmitted)?;
        student.receipt_number = Some(number);
        student.payment_rejected = false;
        student.rejection_reason = None;

        let stored = self.store.update_student(student)?;
        info!(student_id = %stored.id, "receipt submitted for verification");
        Ok(stored)
    }

    /// Staff check of `number` against the ledger.
    ///
    /// A missing or foreign-owned receipt sends the student back to `WAITING_PAYMENT` and is
    /// reported as [`PaymentVerification::Rejected`]. A receipt already bound to this student
    /// by an interrupted earlier attempt completes that attempt.
    pub fn verify_receipt(
        &self,
        student_id: &StudentId,
        number: &str,
    ) -> Result<PaymentVerification, EnrollmentServiceError> {
        let number = receipt_number(number)?;
        let student = self.student(student_id)?;
        student
            .status
            .apply(EnrollmentEvent::PaymentVerified(student.division))?;

        if student.receipt_number.as_deref() != Some(number.as_str()) {
            warn!(
                student_id = %student.id,
                submitted = ?student.receipt_number,
                verified = %number,
                "verifying a receipt number different from the one submitted"
            );
        }

        let (receipt_id, consumed_here) = match self.ledger.consume(&number, &student.id) {
            Ok(receipt_id) => (receipt_id, true),
            Err(LedgerError::AlreadyConsumed {
                receipt_id,
                used_by: Some(owner),
                ..
            }) if owner == student.id => {
                info!(student_id = %student.id, "resuming verification of a bound receipt");
                (receipt_id, false)
            }
            Err(LedgerError::NotFound(number)) => {
                return self.reject_verification(student, NotFoundError::Receipt(number));
            }
            Err(LedgerError::AlreadyConsumed { number, .. }) => {
                return self.reject_verification(student, NotFoundError::ReceiptConsumed(number));
            }
            Err(other) => return Err(other.into()),
        };

        let student_id = student.id.clone();
        let student = match self.commit_verification(student, &number) {
            Ok(student) => student,
            Err(err) => {
                if consumed_here {
                    self.release_after_failed_commit(&student_id, &number);
                }
                return Err(err);
            }
        };
        info!(
            student_id = %student.id,
            receipt_id = %receipt_id,
            status = student.status.label(),
            "payment verified"
        );
        match student.status {
            StudentStatus::Enrolled => self.notify("student_enrolled", &student, &[]),
            _ => self.notify("assessment_started", &student, &[]),
        }

        Ok(PaymentVerification::Verified {
            student,
            receipt_id,
        })
    }

    /// Staff rejection of a submitted receipt.
    pub fn reject_payment(
        &self,
        student_id: &StudentId,
        reason: &str,
    ) -> Result<StudentRecord, EnrollmentServiceError> {
        let student = self.student(student_id)?;
        let reason = match reason.trim() {
            "" => DEFAULT_PAYMENT_REJECTION.to_string(),
            trimmed => trimmed.to_string(),
        };
        self.record_rejection(student, reason)
    }

    /// Score and store one observation day, replacing any earlier record for that day.
    pub fn save_assessment_day(
        &self,
        student_id: &StudentId,
        day: u8,
        input: AssessmentDayInput,
    ) -> Result<AssessmentDay, EnrollmentServiceError> {
        let mut student = self.student(student_id)?;
        student.status = student.status.apply(EnrollmentEvent::DayRecorded)?;

        let scored = score_day(day, input)?;
        student
            .assessment
            .get_or_insert_with(AssessmentData::default)
            .teacher_assessments
            .insert(day, scored.clone());

        let stored = self.store.update_student(student)?;
        debug!(
            student_id = %stored.id,
            day,
            daily_total = scored.daily_total_score,
            "assessment day recorded"
        );
        Ok(scored)
    }

    /// Store the parent questionnaire. Only one submission is accepted.
    pub fn save_parent_self_care(
        &self,
        student_id: &StudentId,
        input: SelfCareInput,
    ) -> Result<SelfCareAssessment, EnrollmentServiceError> {
        let mut student = self.student(student_id)?;
        student.status = student.status.apply(EnrollmentEvent::SelfCareRecorded)?;

        let assessment = student
            .assessment
            .get_or_insert_with(AssessmentData::default);
        if assessment.parent_self_care.is_some() {
            return Err(ValidationError::SelfCareAlreadySubmitted.into());
        }

        let scored = score_self_care(input);
        assessment.parent_self_care = Some(scored.clone());

        let stored = self.store.update_student(student)?;
        debug!(
            student_id = %stored.id,
            score = scored.calculated_score,
            "parent self-care recorded"
        );
        Ok(scored)
    }

    /// Replace a submitted parent questionnaire after staff confirmation.
    pub fn amend_parent_self_care(
        &self,
        student_id: &StudentId,
        input: SelfCareInput,
    ) -> Result<SelfCareAssessment, EnrollmentServiceError> {
        let mut student = self.student(student_id)?;
        student.status = student.status.apply(EnrollmentEvent::SelfCareAmended)?;

        let previous = student
            .assessment
            .as_ref()
            .and_then(|data| data.parent_self_care.as_ref())
            .map(|record| record.amendments)
            .ok_or(ValidationError::SelfCareNotSubmitted)?;

        let mut scored = score_self_care(input);
        scored.amendments = previous + 1;
        student
            .assessment
            .get_or_insert_with(AssessmentData::default)
            .parent_self_care = Some(scored.clone());

        let stored = self.store.update_student(student)?;
        info!(
            student_id = %stored.id,
            amendments = scored.amendments,
            "parent self-care amended"
        );
        Ok(scored)
    }

    /// Resolve the stage and enroll a special-needs student.
    pub fn finalize_assessment(
        &self,
        student_id: &StudentId,
    ) -> Result<FinalizedAssessment, EnrollmentServiceError> {
        let mut student = self.student(student_id)?;
        let next = student.status.apply(EnrollmentEvent::AssessmentFinalized)?;
        let base_level = student
            .base_level()
            .map(str::to_string)
            .ok_or_else(|| ValidationError::MissingBaseLevel(student.id.clone()))?;

        let assessment = student
            .assessment
            .get_or_insert_with(AssessmentData::default);
        let outcome = resolve_stage(assessment, &base_level)?;

        assessment.teacher_average = Some(outcome.teacher_average);
        assessment.final_average = Some(outcome.final_average);
        assessment.stage = Some(outcome.stage);
        assessment.is_complete = true;
        student.stage = Some(outcome.stage);
        student.assigned_class = Some(outcome.assigned_class.clone());
        student.status = next;

        let stored = self.store.update_student(student)?;
        info!(
            student_id = %stored.id,
            final_average = outcome.final_average,
            stage = outcome.stage.number(),
            assigned_class = %outcome.assigned_class,
            "assessment finalized"
        );
        self.notify(
            "student_enrolled",
            &stored,
            &[("final_average", format!("{:.2}", outcome.final_average))],
        );

        Ok(FinalizedAssessment {
            student: stored,
            outcome,
        })
    }

    pub fn add_receipt(
        &self,
        number: &str,
        amount: u32,
        issued_on: NaiveDate,
    ) -> Result<Receipt, EnrollmentServiceError> {
        let receipt = self.ledger.add(number, amount, issued_on)?;
        info!(receipt_id = %receipt.id, number = %receipt.number, "receipt registered");
        Ok(receipt)
    }

    pub fn delete_receipt(&self, receipt_id: &ReceiptId) -> Result<Receipt, EnrollmentServiceError> {
        let receipt = self.ledger.delete(receipt_id)?;
        info!(receipt_id = %receipt.id, "receipt deleted");
        Ok(receipt)
    }

    pub fn receipts(&self) -> Result<Vec<Receipt>, EnrollmentServiceError> {
        Ok(self.ledger.list()?)
    }

    pub fn application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<ApplicationRecord, EnrollmentServiceError> {
        self.store
            .fetch_application(application_id)?
            .ok_or_else(|| NotFoundError::Application(application_id.clone()).into())
    }

    pub fn student(&self, student_id: &StudentId) -> Result<StudentRecord, EnrollmentServiceError> {
        self.store
            .fetch_student(student_id)?
            .ok_or_else(|| NotFoundError::Student(student_id.clone()).into())
    }

    pub fn students(&self) -> Result<Vec<StudentRecord>, EnrollmentServiceError> {
        Ok(self.store.students()?)
    }

    pub fn students_by_status(
        &self,
        status: StudentStatus,
    ) -> Result<Vec<StudentRecord>, EnrollmentServiceError> {
        Ok(self.store.students_by_status(status)?)
    }

    pub fn students_by_assigned_class(
        &self,
        assigned_class: &str,
    ) -> Result<Vec<StudentRecord>, EnrollmentServiceError> {
        Ok(self.store.students_by_assigned_class(assigned_class.trim())?)
    }

    pub fn pending_action_counts(&self) -> Result<PendingActionCounts, EnrollmentServiceError> {
        let in_assessment = self.store.students_by_status(StudentStatus::Assessment)?;
        let ready_to_finalize = in_assessment
            .iter()
            .filter(|student| {
                student
                    .assessment
                    .as_ref()
                    .map(|data| resolve_stage(data, "").is_ok())
                    .unwrap_or(false)
            })
            .count();

        Ok(PendingActionCounts {
            pending_applications: self
                .store
                .applications_by_status(ApplicationStatus::Pending)?
                .len(),
            awaiting_payment: self
                .store
                .students_by_status(StudentStatus::WaitingPayment)?
                .len(),
            payment_verification: self
                .store
                .students_by_status(StudentStatus::PaymentVerification)?
                .len(),
            in_assessment: in_assessment.len(),
            ready_to_finalize,
        })
    }

    /// Move a pending application to approved, or return an approved one whose student has
    /// not been attached yet.
    fn claim_application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<ApplicationRecord, EnrollmentServiceError> {
        let mut application = self.application(application_id)?;
        loop {
            match application.status {
                ApplicationStatus::Approved => return Ok(application),
                ApplicationStatus::Rejected => {
                    return Err(ValidationError::ApplicationNotPending(
                        application.id,
                        application.status.label(),
                    )
                    .into())
                }
                ApplicationStatus::Pending => {
                    let mut claimed = application.clone();
                    claimed.status = ApplicationStatus::Approved;
                    match self.store.update_application(claimed) {
                        Ok(claimed) => return Ok(claimed),
                        Err(RepositoryError::Conflict) => {
                            let current = self.application(application_id)?;
                            if current.status == ApplicationStatus::Pending {
                                return Err(EnrollmentServiceError::Concurrency);
                            }
                            application = current;
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
            }
        }
    }

    /// Record the student on the claimed application. Losing to an identical attach is success.
    fn attach_student(
        &self,
        mut application: ApplicationRecord,
        student: StudentRecord,
    ) -> Result<StudentRecord, EnrollmentServiceError> {
        application.student_id = Some(student.id.clone());
        match self.store.update_application(application) {
            Ok(_) => Ok(student),
            Err(RepositoryError::Conflict) => {
                let current = self.application(&student.application_id)?;
                if current.student_id.as_ref() == Some(&student.id) {
                    Ok(student)
                } else {
                    Err(EnrollmentServiceError::Concurrency)
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Return a receipt consumed by this call when the student did not advance with it.
    fn release_after_failed_commit(&self, student_id: &StudentId, number: &str) {
        let advanced = match self.store.fetch_student(student_id) {
            Ok(Some(student)) => matches!(
                student.status,
                StudentStatus::Assessment | StudentStatus::Enrolled
            ),
            Ok(None) => false,
            Err(err) => {
                warn!(student_id = %student_id, error = %err, "cannot re-read student, keeping receipt bound");
                return;
            }
        };
        if advanced {
            return;
        }

        match self.ledger.release(number, student_id) {
            Ok(released) => {
                warn!(student_id = %student_id, number, released, "released receipt after failed verification")
            }
            Err(err) => {
                warn!(student_id = %student_id, number, error = %err, "receipt release failed")
            }
        }
    }

    /// Apply the verified transition, re-reading the student if a concurrent write won.
    fn commit_verification(
        &self,
        mut current: StudentRecord,
        number: &str,
    ) -> Result<StudentRecord, EnrollmentServiceError> {
        let mut attempt = 1;
        loop {
            let mut updated = current.clone();
            updated.status = updated
                .status
                .apply(EnrollmentEvent::PaymentVerified(updated.division))?;
            updated.receipt_number = Some(number.to_string());
            updated.payment_rejected = false;
            updated.rejection_reason = None;
            match updated.division {
                Division::Mainstream => updated.assigned_class = updated.grade.clone(),
                Division::SpecialNeeds => {
                    updated
                        .assessment
                        .get_or_insert_with(AssessmentData::default);
                }
            }

            match self.store.update_student(updated) {
                Ok(stored) => return Ok(stored),
                Err(RepositoryError::Conflict) if attempt < COMMIT_ATTEMPTS => {
                    warn!(
                        student_id = %current.id,
                        attempt,
                        "student changed while committing payment, retrying"
                    );
                    attempt += 1;
                    current = self.student(&current.id)?;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn reject_verification(
        &self,
        student: StudentRecord,
        reason: NotFoundError,
    ) -> Result<PaymentVerification, EnrollmentServiceError> {
        let reason = reason.to_string();
        let student = self.record_rejection(student, reason.clone())?;
        Ok(PaymentVerification::Rejected { student, reason })
    }

    fn record_rejection(
        &self,
        mut student: StudentRecord,
        reason: String,
    ) -> Result<StudentRecord, EnrollmentServiceError> {
        student.status = student.status.apply(EnrollmentEvent::PaymentRejected)?;
        student.payment_rejected = true;
        student.rejection_reason = Some(reason.clone());

        let stored = self.store.update_student(student)?;
        warn!(student_id = %stored.id, reason = %reason, "payment rejected");
        self.notify("payment_rejected", &stored, &[("reason", reason)]);
        Ok(stored)
    }

    fn notify(&self, template: &str, student: &StudentRecord, extra: &[(&str, String)]) {
        let mut details = BTreeMap::new();
        details.insert("learner_name".to_string(), student.learner_name.clone());
        details.insert("status".to_string(), student.status.label().to_string());
        if let Some(assigned_class) = &student.assigned_class {
            details.insert("assigned_class".to_string(), assigned_class.clone());
        }
        for (key, value) in extra {
            details.insert((*key).to_string(), value.clone());
        }

        let notification = Notification {
            template: template.to_string(),
            student_id: student.id.clone(),
            details,
        };
        if let Err(err) = self.notifications.publish(notification) {
            warn!(template, student_id = %student.id, error = %err, "notification dispatch failed");
        }
    }
}

fn receipt_number(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::BlankReceiptNumber);
    }
    Ok(trimmed.to_string())
}

fn validate_submission(
    submission: &ApplicationSubmission,
    submitted_on: NaiveDate,
) -> Result<(), ValidationError> {
    let invalid = |message: &str| Err(ValidationError::Submission(message.to_string()));

    if submission.learner_name.trim().is_empty() {
        return invalid("learner name is required");
    }
    if submission.date_of_birth >= submitted_on {
        return invalid("date of birth must be before the application date");
    }
    if submission.guardians.is_empty() {
        return invalid("at least one parent or guardian contact is required");
    }
    if submission
        .guardians
        .iter()
        .any(|guardian| guardian.name.trim().is_empty() || guardian.phone.trim().is_empty())
    {
        return invalid("every guardian needs a name and a phone number");
    }
    let has_grade = submission
        .applied_grade
        .as_deref()
        .map(|grade| !grade.trim().is_empty())
        .unwrap_or(false);
    if submission.division == Division::Mainstream && !has_grade {
        return invalid("mainstream applications must name the grade applied for");
    }
    Ok(())
}
