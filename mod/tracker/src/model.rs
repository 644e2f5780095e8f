use serde::{Deserialize, Serialize};

pub use habits_store::HabitEntry;

/// Derived statistics for one habit. Recomputed per request, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HabitSummary {
    pub name: String,
    pub current_streak: u32,
    pub longest_streak: u32,
    /// Unix seconds of the earliest entry; 0 when there are none.
    pub first_logged: i64,
    /// Distinct UTC calendar days with at least one entry.
    pub total_days_done: u32,
    /// Maximum distinct-day count of any (year, month) bucket.
    pub best_month: u32,
    /// Distinct days in the current UTC month.
    pub this_month: u32,
    /// Server wall clock at computation time, unix seconds.
    pub last_write: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitListResponse {
    pub habits: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitGetResponse {
    pub habit_id: String,
    pub entries: Vec<HabitEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitSummaryResponse {
    pub habit_id: String,
    #[serde(flatten)]
    pub summary: HabitSummary,
}
