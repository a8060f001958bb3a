use dashmap::DashMap;

use crate::error::RunError;
use crate::run::{RunId, RunRecord};

/// Concurrent map of run records keyed by [`RunId`].
///
/// Updates to one id are linearized under that entry's shard guard; updates
/// to different ids do not share a lock beyond the shard they hash to.
/// Records are never evicted.
#[derive(Debug, Default)]
pub struct RunStore {
    runs: DashMap<RunId, RunRecord>,
}

impl RunStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new record and return its id.
    pub fn create(&self, record: RunRecord) -> RunId {
        let id = record.id;
        self.runs.insert(id, record);
        id
    }

    /// Snapshot of a record.
    pub fn get(&self, id: RunId) -> Result<RunRecord, RunError> {
        self.runs
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(RunError::NotFound(id))
    }

    /// Apply `transform` to the stored record while holding its write guard.
    ///
    /// The transform sees a scratch copy; the stored record is replaced only
    /// if the transform succeeds, so a rejected transition leaves no trace.
    pub fn update<T, F>(&self, id: RunId, transform: F) -> Result<T, RunError>
    where
        F: FnOnce(&mut RunRecord) -> Result<T, RunError>,
    {
        let mut entry = self.runs.get_mut(&id).ok_or(RunError::NotFound(id))?;
        let mut next = entry.value().clone();
        let out = transform(&mut next)?;
        *entry.value_mut() = next;
        Ok(out)
    }

    /// Number of runs ever submitted.
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Whether no run has been submitted.
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}
