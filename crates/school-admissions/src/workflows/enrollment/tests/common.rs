use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::response::Response;
use chrono::{NaiveDate, NaiveTime};
use serde_json::Value;

use crate::workflows::enrollment::domain::{
    AbcLog, ApplicationId, ApplicationRecord, ApplicationStatus, ApplicationSubmission,
    AssessmentDayInput, DailyScores, Division, GuardianContact, Receipt, ReceiptId,
    Response as Answer, SelfCareInput, SelfCareResponses, StudentId, StudentRecord,
};
use crate::workflows::enrollment::lifecycle::StudentStatus;
use crate::workflows::enrollment::repository::{
    ApplicationRepository, Notification, NotificationError, NotificationPublisher,
    ReceiptConsumption, ReceiptRemoval, ReceiptRepository, RepositoryError, SequenceRepository,
    StudentRepository,
};
use crate::workflows::enrollment::{
    enrollment_router, EnrollmentService, MemoryNotifications, MemoryStore,
};

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn submitted_on() -> NaiveDate {
    date(2025, 1, 15)
}

pub(super) fn guardian() -> GuardianContact {
    GuardianContact {
        name: "Mariam Haddad".to_string(),
        relationship: "mother".to_string(),
        phone: "+961 3 555 010".to_string(),
        email: Some("mariam@example.org".to_string()),
    }
}

/// Special-needs learner who is 10 on [`submitted_on`].
pub(super) fn special_needs_submission() -> ApplicationSubmission {
    ApplicationSubmission {
        learner_name: "Rami Haddad".to_string(),
        date_of_birth: date(2014, 6, 1),
        division: Division::SpecialNeeds,
        applied_grade: None,
        guardians: vec![guardian()],
        previous_school: Some("Cedar Primary".to_string()),
        notes: None,
    }
}

pub(super) fn mainstream_submission() -> ApplicationSubmission {
    ApplicationSubmission {
        learner_name: "Lina Saab".to_string(),
        date_of_birth: date(2016, 3, 12),
        division: Division::Mainstream,
        applied_grade: Some("Grade 3".to_string()),
        guardians: vec![guardian()],
        previous_school: None,
        notes: Some("transferring mid-year".to_string()),
    }
}

pub(super) fn scores(value: u8) -> DailyScores {
    DailyScores {
        numbers: value,
        reading: value,
        self_care: value,
        behaviour: value,
        senses: value,
    }
}

pub(super) fn abc_log(is_positive: bool) -> AbcLog {
    AbcLog {
        antecedent: "transition to circle time".to_string(),
        behaviour: if is_positive {
            "joined the group".to_string()
        } else {
            "left the room".to_string()
        },
        consequence: "teacher prompt".to_string(),
        is_positive,
        time: NaiveTime::from_hms_opt(9, 30, 0).expect("valid time"),
    }
}

/// All ratings 4, thinking task answered Yes, no ABC logs: daily total 4.0.
pub(super) fn steady_day(day: u8) -> AssessmentDayInput {
    AssessmentDayInput {
        scores: scores(4),
        thinking_response: Some(Answer::Yes),
        abc_logs: Vec::new(),
        completed: true,
        date: date(2025, 2, 1) + chrono::Days::new(u64::from(day)),
    }
}

pub(super) fn self_care(response: Answer) -> SelfCareInput {
    SelfCareInput {
        responses: SelfCareResponses::uniform(response),
        comments: "  manages most routines at home  ".to_string(),
        completed_date: date(2025, 2, 10),
    }
}

pub(super) type MemoryService = EnrollmentService<MemoryStore, MemoryNotifications>;

pub(super) fn build_service() -> (MemoryService, Arc<MemoryStore>, Arc<MemoryNotifications>) {
    let store = Arc::new(MemoryStore::default());
    let notifications = Arc::new(MemoryNotifications::default());
    let service = EnrollmentService::new(store.clone(), notifications.clone());
    (service, store, notifications)
}

pub(super) fn approved_student(service: &MemoryService, submission: ApplicationSubmission) -> StudentRecord {
    let application = service
        .submit_application(submission, submitted_on())
        .expect("application accepted");
    service.enroll(&application.id).expect("application approved")
}

/// Special-needs student moved into `ASSESSMENT` with receipt `R-1001`.
pub(super) fn student_in_assessment(service: &MemoryService) -> StudentId {
    service
        .add_receipt("R-1001", 150, date(2025, 1, 10))
        .expect("receipt registered");
    let student = approved_student(service, special_needs_submission());
    service
        .submit_receipt(&student.id, "R-1001")
        .expect("receipt submitted");
    service
        .verify_receipt(&student.id, "R-1001")
        .expect("payment verified");
    student.id
}

pub(super) fn record_all_days(service: &MemoryService, student_id: &StudentId) {
    for day in 1..=14 {
        service
            .save_assessment_day(student_id, day, steady_day(day))
            .expect("day recorded");
    }
}

/// Publisher whose transport is always down.
#[derive(Default)]
pub(super) struct OfflineNotifications {
    attempts: Mutex<usize>,
}

impl OfflineNotifications {
    pub(super) fn attempts(&self) -> usize {
        *self.attempts.lock().expect("attempt mutex poisoned")
    }
}

impl NotificationPublisher for OfflineNotifications {
    fn publish(&self, _notification: Notification) -> Result<(), NotificationError> {
        *self.attempts.lock().expect("attempt mutex poisoned") += 1;
        Err(NotificationError::Transport("smtp relay offline".to_string()))
    }
}

/// Store whose backend is offline for every call.
pub(super) struct UnavailableStore;

fn offline<T>() -> Result<T, RepositoryError> {
    Err(RepositoryError::Unavailable("database offline".to_string()))
}

impl ApplicationRepository for UnavailableStore {
    fn insert_application(
        &self,
        _record: ApplicationRecord,
    ) -> Result<ApplicationRecord, RepositoryError> {
        offline()
    }

    fn update_application(
        &self,
        _record: ApplicationRecord,
    ) -> Result<ApplicationRecord, RepositoryError> {
        offline()
    }

    fn fetch_application(
        &self,
        _id: &ApplicationId,
    ) -> Result<Option<ApplicationRecord>, RepositoryError> {
        offline()
    }

    fn applications_by_status(
        &self,
        _status: ApplicationStatus,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        offline()
    }
}

impl StudentRepository for UnavailableStore {
    fn insert_student(&self, _record: StudentRecord) -> Result<StudentRecord, RepositoryError> {
        offline()
    }

    fn update_student(&self, _record: StudentRecord) -> Result<StudentRecord, RepositoryError> {
        offline()
    }

    fn fetch_student(&self, _id: &StudentId) -> Result<Option<StudentRecord>, RepositoryError> {
        offline()
    }

    fn student_for_application(
        &self,
        _id: &ApplicationId,
    ) -> Result<Option<StudentRecord>, RepositoryError> {
        offline()
    }

    fn students(&self) -> Result<Vec<StudentRecord>, RepositoryError> {
        offline()
    }

    fn students_by_status(
        &self,
        _status: StudentStatus,
    ) -> Result<Vec<StudentRecord>, RepositoryError> {
        offline()
    }

    fn students_by_assigned_class(
        &self,
        _assigned_class: &str,
    ) -> Result<Vec<StudentRecord>, RepositoryError> {
        offline()
    }
}

impl ReceiptRepository for UnavailableStore {
    fn insert_receipt(&self, _receipt: Receipt) -> Result<Receipt, RepositoryError> {
        offline()
    }

    fn fetch_receipt(&self, _number: &str) -> Result<Option<Receipt>, RepositoryError> {
        offline()
    }

    fn receipts(&self) -> Result<Vec<Receipt>, RepositoryError> {
        offline()
    }

    fn consume_receipt(
        &self,
        _number: &str,
        _student: &StudentId,
    ) -> Result<ReceiptConsumption, RepositoryError> {
        offline()
    }

    fn release_receipt(&self, _number: &str, _student: &StudentId) -> Result<bool, RepositoryError> {
        offline()
    }

    fn remove_unused_receipt(&self, _id: &ReceiptId) -> Result<ReceiptRemoval, RepositoryError> {
        offline()
    }
}

impl SequenceRepository for UnavailableStore {
    fn next_value(&self, _sequence: &str) -> Result<u64, RepositoryError> {
        offline()
    }
}

/// Scripted outcome for the next write of one kind.
pub(super) enum Fault {
    Pass,
    Unavailable,
    Conflict,
    /// Runs against the inner store before the write is forwarded.
    Before(Box<dyn FnOnce(&MemoryStore) + Send>),
}

/// [`MemoryStore`] wrapper that injects failures into student and application writes and can
/// slow down student id allocation.
#[derive(Default)]
pub(super) struct FaultyStore {
    pub(super) inner: MemoryStore,
    student_updates: Mutex<VecDeque<Fault>>,
    application_updates: Mutex<VecDeque<Fault>>,
    allocation_delay: Option<Duration>,
}

impl FaultyStore {
    pub(super) fn with_allocation_delay(delay: Duration) -> Self {
        Self {
            allocation_delay: Some(delay),
            ..Self::default()
        }
    }

    pub(super) fn script_student_updates(&self, faults: impl IntoIterator<Item = Fault>) {
        self.student_updates
            .lock()
            .expect("fault mutex poisoned")
            .extend(faults);
    }

    pub(super) fn script_application_updates(&self, faults: impl IntoIterator<Item = Fault>) {
        self.application_updates
            .lock()
            .expect("fault mutex poisoned")
            .extend(faults);
    }

    fn run_fault(&self, queue: &Mutex<VecDeque<Fault>>) -> Result<(), RepositoryError> {
        let next = queue.lock().expect("fault mutex poisoned").pop_front();
        match next {
            None | Some(Fault::Pass) => Ok(()),
            Some(Fault::Unavailable) => offline(),
            Some(Fault::Conflict) => Err(RepositoryError::Conflict),
            Some(Fault::Before(hook)) => {
                hook(&self.inner);
                Ok(())
            }
        }
    }
}

impl ApplicationRepository for FaultyStore {
    fn insert_application(
        &self,
        record: ApplicationRecord,
    ) -> Result<ApplicationRecord, RepositoryError> {
        self.inner.insert_application(record)
    }

    fn update_application(
        &self,
        record: ApplicationRecord,
    ) -> Result<ApplicationRecord, RepositoryError> {
        self.run_fault(&self.application_updates)?;
        self.inner.update_application(record)
    }

    fn fetch_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<ApplicationRecord>, RepositoryError> {
        self.inner.fetch_application(id)
    }

    fn applications_by_status(
        &self,
        status: ApplicationStatus,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        self.inner.applications_by_status(status)
    }
}

impl StudentRepository for FaultyStore {
    fn insert_student(&self, record: StudentRecord) -> Result<StudentRecord, RepositoryError> {
        self.inner.insert_student(record)
    }

    fn update_student(&self, record: StudentRecord) -> Result<StudentRecord, RepositoryError> {
        self.run_fault(&self.student_updates)?;
        self.inner.update_student(record)
    }

    fn fetch_student(&self, id: &StudentId) -> Result<Option<StudentRecord>, RepositoryError> {
        self.inner.fetch_student(id)
    }

    fn student_for_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<StudentRecord>, RepositoryError> {
        self.inner.student_for_application(id)
    }

    fn students(&self) -> Result<Vec<StudentRecord>, RepositoryError> {
        self.inner.students()
    }

    fn students_by_status(
        &self,
        status: StudentStatus,
    ) -> Result<Vec<StudentRecord>, RepositoryError> {
        self.inner.students_by_status(status)
    }

    fn students_by_assigned_class(
        &self,
        assigned_class: &str,
    ) -> Result<Vec<StudentRecord>, RepositoryError> {
        self.inner.students_by_assigned_class(assigned_class)
    }
}

impl ReceiptRepository for FaultyStore {
    fn insert_receipt(&self, receipt: Receipt) -> Result<Receipt, RepositoryError> {
        self.inner.insert_receipt(receipt)
    }

    fn fetch_receipt(&self, number: &str) -> Result<Option<Receipt>, RepositoryError> {
        self.inner.fetch_receipt(number)
    }

    fn receipts(&self) -> Result<Vec<Receipt>, RepositoryError> {
        self.inner.receipts()
    }

    fn consume_receipt(
        &self,
        number: &str,
        student: &StudentId,
    ) -> Result<ReceiptConsumption, RepositoryError> {
        self.inner.consume_receipt(number, student)
    }

    fn release_receipt(&self, number: &str, student: &StudentId) -> Result<bool, RepositoryError> {
        self.inner.release_receipt(number, student)
    }

    fn remove_unused_receipt(&self, id: &ReceiptId) -> Result<ReceiptRemoval, RepositoryError> {
        self.inner.remove_unused_receipt(id)
    }
}

impl SequenceRepository for FaultyStore {
    fn next_value(&self, sequence: &str) -> Result<u64, RepositoryError> {
        if sequence == "student_id" {
            if let Some(delay) = self.allocation_delay {
                std::thread::sleep(delay);
            }
        }
        self.inner.next_value(sequence)
    }
}

pub(super) type FaultyService = EnrollmentService<FaultyStore, MemoryNotifications>;

pub(super) fn build_faulty_service(
    store: FaultyStore,
) -> (FaultyService, Arc<FaultyStore>, Arc<MemoryNotifications>) {
    let store = Arc::new(store);
    let notifications = Arc::new(MemoryNotifications::default());
    let service = EnrollmentService::new(store.clone(), notifications.clone());
    (service, store, notifications)
}

pub(super) fn router_with_service(service: MemoryService) -> axum::Router {
    enrollment_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
