use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use habits_core::{CurrentUser, ServiceError};

use crate::api::AppState;
use crate::model::{HabitEntry, HabitGetResponse, HabitListResponse, HabitSummaryResponse};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/habits", get(list_habits).post(track_habit))
        .route("/habits/{habit_id}", get(get_habit).delete(delete_habit))
        .route("/habits/{habit_id}/summary", get(get_habit_summary))
}

/// Resolve the acting user id. With auth disabled everything belongs to
/// "anonymous"; with auth enabled the middleware must have attached a user.
fn request_user_id(
    state: &AppState,
    user: Option<&Extension<CurrentUser>>,
) -> Result<String, ServiceError> {
    if !state.auth_enabled {
        return Ok("anonymous".to_string());
    }
    user.map(|u| u.user_id.clone())
        .ok_or_else(|| ServiceError::Validation("user id is required".into()))
}

/// POST /habits — validate and store one entry.
async fn track_habit(
    State(state): State<AppState>,
    user: Option<Extension<CurrentUser>>,
    Json(entry): Json<HabitEntry>,
) -> Result<(StatusCode, Json<HabitEntry>), ServiceError> {
    let user_id = request_user_id(&state, user.as_ref())?;
    let stored = state.svc.track(&user_id, entry).map_err(ServiceError::from)?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// GET /habits — the caller's habit names.
async fn list_habits(
    State(state): State<AppState>,
    user: Option<Extension<CurrentUser>>,
) -> Result<Json<HabitListResponse>, ServiceError> {
    let user_id = request_user_id(&state, user.as_ref())?;
    let habits = state.svc.list(&user_id).map_err(ServiceError::from)?;
    Ok(Json(HabitListResponse { habits }))
}

/// GET /habits/{habit_id} — all entries for one habit, 404 when none.
async fn get_habit(
    State(state): State<AppState>,
    user: Option<Extension<CurrentUser>>,
    Path(habit_id): Path<String>,
) -> Result<Json<HabitGetResponse>, ServiceError> {
    let user_id = request_user_id(&state, user.as_ref())?;
    require_habit_id(&habit_id)?;
    let entries = state
        .svc
        .entries(&user_id, &habit_id)
        .map_err(ServiceError::from)?;
    Ok(Json(HabitGetResponse { habit_id, entries }))
}

/// GET /habits/{habit_id}/summary — derived statistics.
async fn get_habit_summary(
    State(state): State<AppState>,
    user: Option<Extension<CurrentUser>>,
    Path(habit_id): Path<String>,
) -> Result<Json<HabitSummaryResponse>, ServiceError> {
    let user_id = request_user_id(&state, user.as_ref())?;
    require_habit_id(&habit_id)?;
    let summary = state
        .svc
        .summary(&user_id, &habit_id)
        .map_err(ServiceError::from)?;
    Ok(Json(HabitSummaryResponse { habit_id, summary }))
}

/// DELETE /habits/{habit_id} — remove every entry under the name.
async fn delete_habit(
    State(state): State<AppState>,
    user: Option<Extension<CurrentUser>>,
    Path(habit_id): Path<String>,
) -> Result<StatusCode, ServiceError> {
    let user_id = request_user_id(&state, user.as_ref())?;
    require_habit_id(&habit_id)?;
    state
        .svc
        .delete(&user_id, &habit_id)
        .map_err(ServiceError::from)?;
    Ok(StatusCode::NO_CONTENT)
}

fn require_habit_id(habit_id: &str) -> Result<(), ServiceError> {
    if habit_id.is_empty() {
        return Err(ServiceError::Validation("habit id is required".into()));
    }
    Ok(())
}
