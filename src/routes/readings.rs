//! Reading endpoints: list, record, edit, delete.
//!
//! Handlers here only validate shape and authorize scope; the actual
//! baseline/consumption/alert work happens in `evaluator`, which is handed
//! an already-authorized request (scope is checked against the target
//! meter's unit before the evaluator runs).

use axum::{
    extract::Path, extract::Query, extract::State, http::StatusCode,
    response::IntoResponse, routing::get, Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::PgPool;

use crate::{auth::Caller, error::AppError, evaluator, models::ReadingDetail};

// ---

pub fn router() -> Router<PgPool> {
    // ---
    Router::new()
        .route("/api/readings", get(list).post(create))
        .route("/api/readings/{id}", get(fetch).put(update).delete(remove))
}

/// Request body shared by create and edit.
#[derive(Debug, Deserialize)]
struct ReadingPayload {
    meter_id: i64,
    reading: f64,
    date: NaiveDate,
}

#[derive(Debug, Deserialize)]
struct ReadingsQuery {
    meter_id: Option<i64>,
    unit_id: Option<i64>,
}

const SELECT_DETAIL: &str = r#"
    SELECT
        r.id, r.meter_id, r.reading, r.consumption, r.date, r.is_alert,
        r.created_at, r.updated_at,
        m.meter_type, m.unit_id,
        u.number AS unit_number, u.building_id,
        b.name AS building_name
    FROM readings r
    JOIN meters m ON m.id = r.meter_id
    JOIN units u ON u.id = m.unit_id
    JOIN buildings b ON b.id = u.building_id
"#;

// ---

/// Unit a meter belongs to, for the pre-evaluator scope check.
async fn meter_unit(pool: &PgPool, meter_id: i64) -> Result<Option<i64>, AppError> {
    // ---
    let unit_id: Option<i64> = sqlx::query_scalar("SELECT unit_id FROM meters WHERE id = $1")
        .bind(meter_id)
        .fetch_optional(pool)
        .await?;
    Ok(unit_id)
}

fn authorize_meter(caller: &Caller, unit_id: Option<i64>, meter_id: i64) -> Result<(), AppError> {
    // ---
    let unit_id = unit_id
        .ok_or_else(|| AppError::validation(format!("meter {meter_id} not found")))?;
    caller.authorize_unit(unit_id)
}

async fn list(
    caller: Caller,
    Query(params): Query<ReadingsQuery>,
    State(pool): State<PgPool>,
) -> Result<Json<Vec<ReadingDetail>>, AppError> {
    // ---
    let (meter_filter, unit_filter) = if caller.is_admin() {
        (params.meter_id, params.unit_id)
    } else {
        match caller.unit_id {
            Some(id) => (params.meter_id, Some(id)),
            None => return Ok(Json(Vec::new())),
        }
    };

    let readings = sqlx::query_as::<_, ReadingDetail>(&format!(
        r#"
        {SELECT_DETAIL}
        WHERE ($1::BIGINT IS NULL OR r.meter_id = $1)
          AND ($2::BIGINT IS NULL OR m.unit_id = $2)
        ORDER BY r.date DESC, r.created_at DESC
        "#
    ))
    .bind(meter_filter)
    .bind(unit_filter)
    .fetch_all(&pool)
    .await?;

    Ok(Json(readings))
}

async fn fetch(
    caller: Caller,
    Path(id): Path<i64>,
    State(pool): State<PgPool>,
) -> Result<Json<ReadingDetail>, AppError> {
    // ---
    let reading = sqlx::query_as::<_, ReadingDetail>(&format!("{SELECT_DETAIL} WHERE r.id = $1"))
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| AppError::not_found(format!("reading {id} not found")))?;

    caller.authorize_unit(reading.unit_id)?;

    Ok(Json(reading))
}

async fn create(
    caller: Caller,
    State(pool): State<PgPool>,
    Json(payload): Json<ReadingPayload>,
) -> Result<impl IntoResponse, AppError> {
    // ---
    let unit_id = meter_unit(&pool, payload.meter_id).await?;
    authorize_meter(&caller, unit_id, payload.meter_id)?;

    let reading =
        evaluator::create_reading(&pool, payload.meter_id, payload.reading, payload.date).await?;

    Ok((StatusCode::CREATED, Json(reading)))
}

async fn update(
    caller: Caller,
    Path(id): Path<i64>,
    State(pool): State<PgPool>,
    Json(payload): Json<ReadingPayload>,
) -> Result<Json<ReadingDetail>, AppError> {
    // ---
    // Scope must cover both the reading's current unit and the target meter's.
    let current_unit: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT m.unit_id
        FROM readings r
        JOIN meters m ON m.id = r.meter_id
        WHERE r.id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?;
    let current_unit =
        current_unit.ok_or_else(|| AppError::not_found(format!("reading {id} not found")))?;
    caller.authorize_unit(current_unit)?;

    let target_unit = meter_unit(&pool, payload.meter_id).await?;
    authorize_meter(&caller, target_unit, payload.meter_id)?;

    let reading =
        evaluator::update_reading(&pool, id, payload.meter_id, payload.reading, payload.date)
            .await?;

    Ok(Json(reading))
}

async fn remove(
    caller: Caller,
    Path(id): Path<i64>,
    State(pool): State<PgPool>,
) -> Result<StatusCode, AppError> {
    // ---
    let unit_id: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT m.unit_id
        FROM readings r
        JOIN meters m ON m.id = r.meter_id
        WHERE r.id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?;
    let unit_id = unit_id.ok_or_else(|| AppError::not_found(format!("reading {id} not found")))?;
    caller.authorize_unit(unit_id)?;

    sqlx::query("DELETE FROM readings WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
