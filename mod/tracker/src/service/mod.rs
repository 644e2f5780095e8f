pub mod stats;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use metrics::gauge;
use tracing::{debug, info};

use habits_core::ServiceError;
use habits_store::{Store, StoreError};

use crate::model::{HabitEntry, HabitSummary};

const MAX_NAME_LEN: usize = 20;
const MAX_NOTE_LEN: usize = 1024;
// Accepted timestamp window: year 2000 through year 2100.
const MIN_TIMESTAMP: i64 = 946_684_800;
const MAX_TIMESTAMP: i64 = 4_102_444_800;

/// Tracker service error type.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Storage(String),
}

impl From<StoreError> for TrackerError {
    fn from(e: StoreError) -> Self {
        TrackerError::Storage(e.to_string())
    }
}

impl From<TrackerError> for ServiceError {
    fn from(e: TrackerError) -> Self {
        match e {
            TrackerError::Validation(m) => ServiceError::Validation(m),
            TrackerError::NotFound(m) => ServiceError::NotFound(m),
            TrackerError::Storage(m) => ServiceError::Storage(m),
        }
    }
}

/// The tracker service. Holds the repository and the active-habit gauge
/// bookkeeping.
pub struct TrackerService {
    store: Arc<dyn Store>,
    // user_id -> habit count, so the total gauge can be kept as a sum.
    active_counts: Mutex<HashMap<String, usize>>,
}

impl TrackerService {
    pub fn new(store: Arc<dyn Store>) -> Arc<Self> {
        Arc::new(Self {
            store,
            active_counts: Mutex::new(HashMap::new()),
        })
    }

    /// Validate and store one habit entry. The name is trimmed first.
    pub fn track(&self, user_id: &str, mut entry: HabitEntry) -> Result<HabitEntry, TrackerError> {
        entry.name = entry.name.trim().to_string();
        validate_entry(&entry)?;

        info!(user_id, habit = %entry.name, timestamp = entry.timestamp, "storing habit");
        self.store.put_habit(user_id, &entry)?;

        self.refresh_gauges(user_id)?;
        Ok(entry)
    }

    /// The user's habit names, deduplicated.
    pub fn list(&self, user_id: &str) -> Result<Vec<String>, TrackerError> {
        Ok(self.store.list_habit_names(user_id)?)
    }

    /// All entries for one habit; absent habits are a NotFound error.
    pub fn entries(&self, user_id: &str, name: &str) -> Result<Vec<HabitEntry>, TrackerError> {
        let entries = self.store.get_habit(user_id, name)?;
        if entries.is_empty() {
            return Err(TrackerError::NotFound("habit not found".into()));
        }
        Ok(entries)
    }

    /// Derived statistics. A habit with no entries yields all zeros rather
    /// than an error.
    pub fn summary(&self, user_id: &str, name: &str) -> Result<HabitSummary, TrackerError> {
        let entries = self.store.get_habit(user_id, name)?;
        debug!(user_id, habit = name, entries = entries.len(), "computing summary");
        Ok(stats::summarize(name, &entries, chrono::Utc::now()))
    }

    /// Delete every entry under the habit name. Idempotent.
    pub fn delete(&self, user_id: &str, name: &str) -> Result<(), TrackerError> {
        info!(user_id, habit = name, "deleting habit");
        self.store.delete_habit(user_id, name)?;
        self.refresh_gauges(user_id)?;
        Ok(())
    }

    /// Recount the user's habits and push both active-habit gauges.
    fn refresh_gauges(&self, user_id: &str) -> Result<(), TrackerError> {
        let count = self.store.list_habit_names(user_id)?.len();

        let mut counts = self.active_counts.lock().unwrap();
        if count == 0 {
            counts.remove(user_id);
        } else {
            counts.insert(user_id.to_string(), count);
        }
        let total: usize = counts.values().sum();
        drop(counts);

        gauge!("habits_active_habits_per_user", "user_id" => user_id.to_string())
            .set(count as f64);
        gauge!("habits_active_habits_total").set(total as f64);
        Ok(())
    }
}

fn validate_entry(entry: &HabitEntry) -> Result<(), TrackerError> {
    if entry.name.is_empty() || entry.name.len() > MAX_NAME_LEN {
        return Err(TrackerError::Validation(format!(
            "bad habit name: must be 1-{MAX_NAME_LEN} characters"
        )));
    }
    if entry.note.len() > MAX_NOTE_LEN {
        return Err(TrackerError::Validation(format!(
            "bad habit note: must be 0-{MAX_NOTE_LEN} characters"
        )));
    }
    if entry.timestamp < MIN_TIMESTAMP || entry.timestamp > MAX_TIMESTAMP {
        return Err(TrackerError::Validation("invalid timestamp".into()));
    }
    Ok(())
}
