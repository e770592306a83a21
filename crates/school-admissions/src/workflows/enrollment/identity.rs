use super::domain::StudentId;
use super::repository::{RepositoryError, SequenceRepository};

pub(crate) const STUDENT_SEQUENCE: &str = "student_id";
pub(crate) const APPLICATION_SEQUENCE: &str = "application_id";
pub(crate) const RECEIPT_SEQUENCE: &str = "receipt_id";

pub const DEFAULT_STUDENT_ID_PREFIX: &str = "STU";
pub const DEFAULT_STUDENT_ID_WIDTH: usize = 5;

/// Issues `PREFIX-00042` style identifiers from a store-side counter.
///
/// Each call is one atomic increment; a failed increment is returned to the caller as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentIdAllocator {
    prefix: String,
    width: usize,
}

impl StudentIdAllocator {
    pub fn new(prefix: impl Into<String>, width: usize) -> Self {
        let prefix = prefix.into();
        let prefix = if prefix.trim().is_empty() {
            DEFAULT_STUDENT_ID_PREFIX.to_string()
        } else {
            prefix.trim().to_string()
        };

        Self {
            prefix,
            width: width.max(1),
        }
    }

    pub fn allocate<S>(&self, sequences: &S) -> Result<StudentId, RepositoryError>
    where
        S: SequenceRepository + ?Sized,
    {
        let value = sequences.next_value(STUDENT_SEQUENCE)?;
        Ok(StudentId(self.format(value)))
    }

    pub fn format(&self, value: u64) -> String {
        format!("{}-{:0width$}", self.prefix, value, width = self.width)
    }
}

impl Default for StudentIdAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_STUDENT_ID_PREFIX, DEFAULT_STUDENT_ID_WIDTH)
    }
}
