//! Process-local store used by the service binary, the CLI demo and tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{
    ApplicationId, ApplicationRecord, ApplicationStatus, Receipt, ReceiptId, StudentId,
    StudentRecord,
};
use super::lifecycle::StudentStatus;
use super::repository::{
    ApplicationRepository, Notification, NotificationError, NotificationPublisher,
    ReceiptConsumption, ReceiptRemoval, ReceiptRepository, RepositoryError, SequenceRepository,
    StudentRepository,
};

#[derive(Default, Clone)]
pub struct MemoryStore {
    applications: Arc<Mutex<BTreeMap<ApplicationId, ApplicationRecord>>>,
    students: Arc<Mutex<BTreeMap<StudentId, StudentRecord>>>,
    receipts: Arc<Mutex<BTreeMap<ReceiptId, Receipt>>>,
    sequences: Arc<Mutex<HashMap<String, u64>>>,
}

fn lock<'a, T>(mutex: &'a Mutex<T>, name: &str) -> Result<MutexGuard<'a, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable(format!("{name} lock poisoned")))
}

impl ApplicationRepository for MemoryStore {
    fn insert_application(
        &self,
        record: ApplicationRecord,
    ) -> Result<ApplicationRecord, RepositoryError> {
        let mut guard = lock(&self.applications, "applications")?;
        if guard.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn update_application(
        &self,
        mut record: ApplicationRecord,
    ) -> Result<ApplicationRecord, RepositoryError> {
        let mut guard = lock(&self.applications, "applications")?;
        let stored = guard.get_mut(&record.id).ok_or(RepositoryError::NotFound)?;
        if stored.version != record.version {
            return Err(RepositoryError::Conflict);
        }
        record.version += 1;
        *stored = record.clone();
        Ok(record)
    }

    fn fetch_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let guard = lock(&self.applications, "applications")?;
        Ok(guard.get(id).cloned())
    }

    fn applications_by_status(
        &self,
        status: ApplicationStatus,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        let guard = lock(&self.applications, "applications")?;
        Ok(guard
            .values()
            .filter(|record| record.status == status)
            .cloned()
            .collect())
    }
}

impl StudentRepository for MemoryStore {
    fn insert_student(&self, record: StudentRecord) -> Result<StudentRecord, RepositoryError> {
        let mut guard = lock(&self.students, "students")?;
        if guard.contains_key(&record.id)
            || guard
                .values()
                .any(|stored| stored.application_id == record.application_id)
        {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn update_student(&self, mut record: StudentRecord) -> Result<StudentRecord, RepositoryError> {
        let mut guard = lock(&self.students, "students")?;
        let stored = guard.get_mut(&record.id).ok_or(RepositoryError::NotFound)?;
        if stored.version != record.version {
            return Err(RepositoryError::Conflict);
        }
        record.version += 1;
        *stored = record.clone();
        Ok(record)
    }

    fn fetch_student(&self, id: &StudentId) -> Result<Option<StudentRecord>, RepositoryError> {
        let guard = lock(&self.students, "students")?;
        Ok(guard.get(id).cloned())
    }

    fn student_for_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<StudentRecord>, RepositoryError> {
        let guard = lock(&self.students, "students")?;
        Ok(guard
            .values()
            .find(|record| &record.application_id == id)
            .cloned())
    }

    fn students(&self) -> Result<Vec<StudentRecord>, RepositoryError> {
        let guard = lock(&self.students, "students")?;
        Ok(guard.values().cloned().collect())
    }

    fn students_by_status(
        &self,
        status: StudentStatus,
    ) -> Result<Vec<StudentRecord>, RepositoryError> {
        let guard = lock(&self.students, "students")?;
        Ok(guard
            .values()
            .filter(|record| record.status == status)
            .cloned()
            .collect())
    }

    fn students_by_assigned_class(
        &self,
        assigned_class: &str,
    ) -> Result<Vec<StudentRecord>, RepositoryError> {
        let guard = lock(&self.students, "students")?;
        Ok(guard
            .values()
            .filter(|record| record.assigned_class.as_deref() == Some(assigned_class))
            .cloned()
            .collect())
    }
}

impl ReceiptRepository for MemoryStore {
    fn insert_receipt(&self, receipt: Receipt) -> Result<Receipt, RepositoryError> {
        let mut guard = lock(&self.receipts, "receipts")?;
        if guard.contains_key(&receipt.id)
            || guard.values().any(|stored| stored.number == receipt.number)
        {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(receipt.id.clone(), receipt.clone());
        Ok(receipt)
    }

    fn fetch_receipt(&self, number: &str) -> Result<Option<Receipt>, RepositoryError> {
        let guard = lock(&self.receipts, "receipts")?;
        Ok(guard.values().find(|receipt| receipt.number == number).cloned())
    }

    fn receipts(&self) -> Result<Vec<Receipt>, RepositoryError> {
        let guard = lock(&self.receipts, "receipts")?;
        Ok(guard.values().cloned().collect())
    }

    fn consume_receipt(
        &self,
        number: &str,
        student: &StudentId,
    ) -> Result<ReceiptConsumption, RepositoryError> {
        let mut guard = lock(&self.receipts, "receipts")?;
        let Some(receipt) = guard.values_mut().find(|receipt| receipt.number == number) else {
            return Ok(ReceiptConsumption::Missing);
        };
        if receipt.is_used {
            return Ok(ReceiptConsumption::AlreadyUsed(receipt.clone()));
        }
        receipt.is_used = true;
        receipt.used_by_student_id = Some(student.clone());
        Ok(ReceiptConsumption::Consumed(receipt.clone()))
    }

    fn release_receipt(&self, number: &str, student: &StudentId) -> Result<bool, RepositoryError> {
        let mut guard = lock(&self.receipts, "receipts")?;
        match guard.values_mut().find(|receipt| receipt.number == number) {
            Some(receipt) if receipt.used_by_student_id.as_ref() == Some(student) => {
                receipt.is_used = false;
                receipt.used_by_student_id = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn remove_unused_receipt(&self, id: &ReceiptId) -> Result<ReceiptRemoval, RepositoryError> {
        let mut guard = lock(&self.receipts, "receipts")?;
        match guard.get(id) {
            None => Ok(ReceiptRemoval::Missing),
            Some(receipt) if receipt.is_used => Ok(ReceiptRemoval::InUse(receipt.clone())),
            Some(_) => Ok(guard
                .remove(id)
                .map(ReceiptRemoval::Removed)
                .unwrap_or(ReceiptRemoval::Missing)),
        }
    }
}

impl SequenceRepository for MemoryStore {
    fn next_value(&self, sequence: &str) -> Result<u64, RepositoryError> {
        let mut guard = lock(&self.sequences, "sequences")?;
        let counter = guard.entry(sequence.to_string()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }
}

/// Collects notifications in memory instead of handing them to a mail client.
#[derive(Default, Clone)]
pub struct MemoryNotifications {
    events: Arc<Mutex<Vec<Notification>>>,
}

impl MemoryNotifications {
    pub fn events(&self) -> Vec<Notification> {
        self.events
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl NotificationPublisher for MemoryNotifications {
    fn publish(&self, notification: Notification) -> Result<(), NotificationError> {
        self.events
            .lock()
            .map_err(|_| NotificationError::Transport("notification lock poisoned".to_string()))?
            .push(notification);
        Ok(())
    }
}
