use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use shared::meal_record::{day_slots, DaySlot, MealRecord, NewRecord, RecordPatch};
use shared::stats::{summarize, StatsSummary};
use shared::validation::validate_record_date;
use tracing::info;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::auth::middleware::UserId;
use crate::error::AppError;
use crate::handlers::records_live;
use crate::AppState;

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_records).post(create_record))
        .route("/live", get(records_live))
        .route("/day/:date", get(day_view))
        .route("/:id", axum::routing::patch(patch_record).delete(delete_record))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub date: Option<String>,
}

fn check_date(date: &str) -> Result<(), AppError> {
    validate_record_date(date).map_err(|e| {
        let mut errors = ValidationErrors::new();
        errors.add("date", e);
        AppError::Validation(errors)
    })
}

async fn list_records(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<MealRecord>>, AppError> {
    let mut records = state.store.list_records(&user_id.0).await?;
    if let Some(date) = query.date {
        check_date(&date)?;
        records.retain(|r| r.date == date);
    }
    Ok(Json(records))
}

async fn create_record(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Json(payload): Json<NewRecord>,
) -> Result<(StatusCode, Json<MealRecord>), AppError> {
    payload.validate()?;
    let record = payload.into_record(Uuid::new_v4().to_string());
    let stored = state.store.upsert_record(&user_id.0, record).await?;
    info!("🍜 {} logged {} at {} ({})", user_id.0, stored.meal_name, stored.shop_name, stored.date);
    Ok((StatusCode::CREATED, Json(stored)))
}

async fn patch_record(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Path(id): Path<String>,
    Json(patch): Json<RecordPatch>,
) -> Result<Json<MealRecord>, AppError> {
    patch.validate()?;
    let existing = state
        .store
        .get_record(&user_id.0, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Record {} not found", id)))?;

    // replace rather than upsert so an explicit empty image clears it
    let updated = state.store.replace_record(&user_id.0, patch.apply(existing)).await?;
    Ok(Json(updated))
}

async fn delete_record(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if state.store.remove_record(&user_id.0, &id).await? {
        info!("🗑️ {} deleted record {}", user_id.0, id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Record {} not found", id)))
    }
}

async fn day_view(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Path(date): Path<String>,
) -> Result<Json<Vec<DaySlot>>, AppError> {
    check_date(&date)?;
    let records = state.store.list_records(&user_id.0).await?;
    Ok(Json(day_slots(&records, &date)))
}

pub async fn stats(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<StatsSummary>, AppError> {
    let records = state.store.list_records(&user_id.0).await?;
    Ok(Json(summarize(&records)))
}
