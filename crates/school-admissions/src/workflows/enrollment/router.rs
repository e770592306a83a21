use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::assessment::{day_percentage, thinking_tasks};
use super::domain::{
    ApplicationId, ApplicationSubmission, AssessmentDayInput, ReceiptId, SelfCareInput, StudentId,
    StudentStatusView,
};
use super::errors::EnrollmentServiceError;
use super::lifecycle::StudentStatus;
use super::repository::{AdmissionsStore, NotificationPublisher, RepositoryError};
use super::service::{EnrollmentService, PaymentVerification};

type SharedService<S, N> = State<Arc<EnrollmentService<S, N>>>;

/// Router builder exposing HTTP endpoints for intake, payment and assessment.
pub fn enrollment_router<S, N>(service: Arc<EnrollmentService<S, N>>) -> Router
where
    S: AdmissionsStore + 'static,
    N: NotificationPublisher + 'static,
{
    Router::new()
        .route(
            "/api/v1/admissions/applications",
            post(submit_application_handler::<S, N>),
        )
        .route(
            "/api/v1/admissions/applications/:application_id",
            get(application_handler::<S, N>),
        )
        .route(
            "/api/v1/admissions/applications/:application_id/approve",
            post(approve_handler::<S, N>),
        )
        .route(
            "/api/v1/admissions/applications/:application_id/reject",
            post(reject_application_handler::<S, N>),
        )
        .route("/api/v1/admissions/students", get(students_handler::<S, N>))
        .route(
            "/api/v1/admissions/students/:student_id",
            get(student_handler::<S, N>),
        )
        .route(
            "/api/v1/admissions/students/:student_id/receipt",
            post(submit_receipt_handler::<S, N>),
        )
        .route(
            "/api/v1/admissions/students/:student_id/payment/verify",
            post(verify_receipt_handler::<S, N>),
        )
        .route(
            "/api/v1/admissions/students/:student_id/payment/reject",
            post(reject_payment_handler::<S, N>),
        )
        .route(
            "/api/v1/admissions/students/:student_id/assessment/days/:day",
            put(assessment_day_handler::<S, N>),
        )
        .route(
            "/api/v1/admissions/students/:student_id/assessment/self-care",
            post(self_care_handler::<S, N>).put(amend_self_care_handler::<S, N>),
        )
        .route(
            "/api/v1/admissions/students/:student_id/assessment/finalize",
            post(finalize_handler::<S, N>),
        )
        .route(
            "/api/v1/admissions/receipts",
            get(receipts_handler::<S, N>).post(add_receipt_handler::<S, N>),
        )
        .route(
            "/api/v1/admissions/receipts/:receipt_id",
            delete(delete_receipt_handler::<S, N>),
        )
        .route(
            "/api/v1/admissions/pending",
            get(pending_counts_handler::<S, N>),
        )
        .route(
            "/api/v1/admissions/thinking-tasks",
            get(thinking_tasks_handler),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ApplicationRequest {
    #[serde(flatten)]
    pub submission: ApplicationSubmission,
    #[serde(default)]
    pub submitted_on: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct NoteRequest {
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ReceiptNumberRequest {
    pub receipt_number: String,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct PaymentRejectionRequest {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct NewReceiptRequest {
    pub number: String,
    pub amount: u32,
    #[serde(default)]
    pub issued_on: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StudentQuery {
    pub status: Option<String>,
    pub assigned_class: Option<String>,
}

pub(crate) fn error_response(error: EnrollmentServiceError) -> Response {
    let status = match &error {
        EnrollmentServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EnrollmentServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        EnrollmentServiceError::Concurrency => StatusCode::CONFLICT,
        EnrollmentServiceError::Persistence(RepositoryError::Unavailable(_)) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        EnrollmentServiceError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({ "error": error.to_string() });
    (status, Json(payload)).into_response()
}

fn respond<T: Serialize>(status: StatusCode, result: Result<T, EnrollmentServiceError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(error) => error_response(error),
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub(crate) async fn submit_application_handler<S, N>(
    State(service): SharedService<S, N>,
    Json(request): Json<ApplicationRequest>,
) -> Response
where
    S: AdmissionsStore + 'static,
    N: NotificationPublisher + 'static,
{
    let submitted_on = request.submitted_on.unwrap_or_else(today);
    respond(
        StatusCode::CREATED,
        service.submit_application(request.submission, submitted_on),
    )
}

pub(crate) async fn application_handler<S, N>(
    State(service): SharedService<S, N>,
    Path(application_id): Path<String>,
) -> Response
where
    S: AdmissionsStore + 'static,
    N: NotificationPublisher + 'static,
{
    respond(
        StatusCode::OK,
        service.application(&ApplicationId(application_id)),
    )
}

pub(crate) async fn approve_handler<S, N>(
    State(service): SharedService<S, N>,
    Path(application_id): Path<String>,
) -> Response
where
    S: AdmissionsStore + 'static,
    N: NotificationPublisher + 'static,
{
    let result = service
        .enroll(&ApplicationId(application_id))
        .map(|student| student.status_view());
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn reject_application_handler<S, N>(
    State(service): SharedService<S, N>,
    Path(application_id): Path<String>,
    Json(request): Json<NoteRequest>,
) -> Response
where
    S: AdmissionsStore + 'static,
    N: NotificationPublisher + 'static,
{
    respond(
        StatusCode::OK,
        service.reject_application(&ApplicationId(application_id), &request.note),
    )
}

pub(crate) async fn students_handler<S, N>(
    State(service): SharedService<S, N>,
    Query(query): Query<StudentQuery>,
) -> Response
where
    S: AdmissionsStore + 'static,
    N: NotificationPublisher + 'static,
{
    let status = match query.status.as_deref() {
        Some(raw) => match StudentStatus::parse(raw) {
            Some(status) => Some(status),
            None => {
                let payload = json!({ "error": format!("unknown student status '{raw}'") });
                return (StatusCode::BAD_REQUEST, Json(payload)).into_response();
            }
        },
        None => None,
    };

    let result = match (status, query.assigned_class.as_deref()) {
        (Some(status), Some(assigned_class)) => {
            service.students_by_status(status).map(|students| {
                students
                    .into_iter()
                    .filter(|student| {
                        student.assigned_class.as_deref() == Some(assigned_class.trim())
                    })
                    .collect()
            })
        }
        (Some(status), None) => service.students_by_status(status),
        (None, Some(assigned_class)) => service.students_by_assigned_class(assigned_class),
        (None, None) => service.students(),
    };

    let result = result.map(|students| {
        students
            .iter()
            .map(|student| student.status_view())
            .collect::<Vec<StudentStatusView>>()
    });
    respond(StatusCode::OK, result)
}

pub(crate) async fn student_handler<S, N>(
    State(service): SharedService<S, N>,
    Path(student_id): Path<String>,
) -> Response
where
    S: AdmissionsStore + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, service.student(&StudentId(student_id)))
}

pub(crate) async fn submit_receipt_handler<S, N>(
    State(service): SharedService<S, N>,
    Path(student_id): Path<String>,
    Json(request): Json<ReceiptNumberRequest>,
) -> Response
where
    S: AdmissionsStore + 'static,
    N: NotificationPublisher + 'static,
{
    let result = service
        .submit_receipt(&StudentId(student_id), &request.receipt_number)
        .map(|student| student.status_view());
    respond(StatusCode::ACCEPTED, result)
}

pub(crate) async fn verify_receipt_handler<S, N>(
    State(service): SharedService<S, N>,
    Path(student_id): Path<String>,
    Json(request): Json<ReceiptNumberRequest>,
) -> Response
where
    S: AdmissionsStore + 'static,
    N: NotificationPublisher + 'static,
{
    match service.verify_receipt(&StudentId(student_id), &request.receipt_number) {
        Ok(PaymentVerification::Verified {
            student,
            receipt_id,
        }) => {
            let payload = json!({
                "outcome": "verified",
                "receipt_id": receipt_id,
                "student": student.status_view(),
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Ok(PaymentVerification::Rejected { student, reason }) => {
            let payload = json!({
                "outcome": "rejected",
                "reason": reason,
                "student": student.status_view(),
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn reject_payment_handler<S, N>(
    State(service): SharedService<S, N>,
    Path(student_id): Path<String>,
    Json(request): Json<PaymentRejectionRequest>,
) -> Response
where
    S: AdmissionsStore + 'static,
    N: NotificationPublisher + 'static,
{
    let result = service
        .reject_payment(&StudentId(student_id), &request.reason)
        .map(|student| student.status_view());
    respond(StatusCode::OK, result)
}

pub(crate) async fn assessment_day_handler<S, N>(
    State(service): SharedService<S, N>,
    Path((student_id, day)): Path<(String, u8)>,
    Json(input): Json<AssessmentDayInput>,
) -> Response
where
    S: AdmissionsStore + 'static,
    N: NotificationPublisher + 'static,
{
    match service.save_assessment_day(&StudentId(student_id), day, input) {
        Ok(record) => {
            let payload = json!({
                "day_percentage": day_percentage(record.daily_total_score),
                "record": record,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn self_care_handler<S, N>(
    State(service): SharedService<S, N>,
    Path(student_id): Path<String>,
    Json(input): Json<SelfCareInput>,
) -> Response
where
    S: AdmissionsStore + 'static,
    N: NotificationPublisher + 'static,
{
    respond(
        StatusCode::CREATED,
        service.save_parent_self_care(&StudentId(student_id), input),
    )
}

pub(crate) async fn amend_self_care_handler<S, N>(
    State(service): SharedService<S, N>,
    Path(student_id): Path<String>,
    Json(input): Json<SelfCareInput>,
) -> Response
where
    S: AdmissionsStore + 'static,
    N: NotificationPublisher + 'static,
{
    respond(
        StatusCode::OK,
        service.amend_parent_self_care(&StudentId(student_id), input),
    )
}

pub(crate) async fn finalize_handler<S, N>(
    State(service): SharedService<S, N>,
    Path(student_id): Path<String>,
) -> Response
where
    S: AdmissionsStore + 'static,
    N: NotificationPublisher + 'static,
{
    match service.finalize_assessment(&StudentId(student_id)) {
        Ok(finalized) => {
            let payload = json!({
                "outcome": finalized.outcome,
                "student": finalized.student.status_view(),
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn receipts_handler<S, N>(State(service): SharedService<S, N>) -> Response
where
    S: AdmissionsStore + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, service.receipts())
}

pub(crate) async fn add_receipt_handler<S, N>(
    State(service): SharedService<S, N>,
    Json(request): Json<NewReceiptRequest>,
) -> Response
where
    S: AdmissionsStore + 'static,
    N: NotificationPublisher + 'static,
{
    let issued_on = request.issued_on.unwrap_or_else(today);
    respond(
        StatusCode::CREATED,
        service.add_receipt(&request.number, request.amount, issued_on),
    )
}

pub(crate) async fn delete_receipt_handler<S, N>(
    State(service): SharedService<S, N>,
    Path(receipt_id): Path<String>,
) -> Response
where
    S: AdmissionsStore + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, service.delete_receipt(&ReceiptId(receipt_id)))
}

pub(crate) async fn pending_counts_handler<S, N>(State(service): SharedService<S, N>) -> Response
where
    S: AdmissionsStore + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, service.pending_action_counts())
}

pub(crate) async fn thinking_tasks_handler() -> Json<serde_json::Value> {
    Json(json!({ "tasks": thinking_tasks() }))
}
