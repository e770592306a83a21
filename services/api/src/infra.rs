use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use school_admissions::config::AdmissionsConfig;
use school_admissions::workflows::enrollment::{
    EnrollmentService, MemoryNotifications, MemoryStore,
};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type InMemoryService = EnrollmentService<MemoryStore, MemoryNotifications>;

/// Service backed by the process-local store; data is lost on restart.
pub(crate) fn in_memory_service(config: &AdmissionsConfig) -> InMemoryService {
    EnrollmentService::with_allocator(
        Arc::new(MemoryStore::default()),
        Arc::new(MemoryNotifications::default()),
        config.allocator(),
    )
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
