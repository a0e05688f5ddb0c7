use std::collections::HashSet;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::{LedgerError, LedgerResult, SubjectId, SubjectRegistry};

/// In-memory registry for embedding hosts and tests.
#[derive(Debug, Default)]
pub struct StaticSubjectRegistry {
    subjects: RwLock<HashSet<SubjectId>>,
}

impl StaticSubjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subjects(subjects: impl IntoIterator<Item = SubjectId>) -> Self {
        Self {
            subjects: RwLock::new(subjects.into_iter().collect()),
        }
    }

    pub fn insert(&self, subject_id: SubjectId) -> LedgerResult<bool> {
        let mut guard = self
            .subjects
            .write()
            .map_err(|_| LedgerError::internal("subject registry lock poisoned"))?;
        Ok(guard.insert(subject_id))
    }

    pub fn remove(&self, subject_id: SubjectId) -> LedgerResult<bool> {
        let mut guard = self
            .subjects
            .write()
            .map_err(|_| LedgerError::internal("subject registry lock poisoned"))?;
        Ok(guard.remove(&subject_id))
    }
}

#[async_trait]
impl SubjectRegistry for StaticSubjectRegistry {
    async fn exists(&self, subject_id: SubjectId) -> LedgerResult<bool> {
        let guard = self
            .subjects
            .read()
            .map_err(|_| LedgerError::internal("subject registry lock poisoned"))?;
        Ok(guard.contains(&subject_id))
    }
}
