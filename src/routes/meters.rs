//! CRUD for water/energy meters.
//!
//! A unit carries at most one meter of each type; the meter type is fixed
//! after creation (updates only touch the numeric configuration). Deleting
//! a meter cascades to its readings.

use axum::{
    extract::Path, extract::Query, extract::State, http::StatusCode,
    response::IntoResponse, routing::get, Json, Router,
};
use serde::Deserialize;
use sqlx::PgPool;

use crate::{
    auth::Caller,
    error::AppError,
    models::{Meter, MeterType},
};

// ---

pub fn router() -> Router<PgPool> {
    // ---
    Router::new()
        .route("/api/meters", get(list).post(create))
        .route("/api/meters/{id}", get(fetch).put(update).delete(remove))
}

#[derive(Debug, Deserialize)]
struct CreateMeterPayload {
    unit_id: i64,
    meter_type: MeterType,
    #[serde(default)]
    initial_reading: f64,
    #[serde(default)]
    threshold: f64,
    total_digits: Option<i32>,
    calculation_digits: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct UpdateMeterPayload {
    initial_reading: f64,
    threshold: f64,
    total_digits: Option<i32>,
    calculation_digits: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct MetersQuery {
    unit_id: Option<i64>,
}

fn check_config(initial_reading: f64, threshold: f64) -> Result<(), AppError> {
    // ---
    if !initial_reading.is_finite() || initial_reading < 0.0 {
        return Err(AppError::validation(
            "initial reading must be a non-negative number",
        ));
    }
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(AppError::validation("threshold must be a non-negative number"));
    }
    Ok(())
}

const SELECT_METER: &str = r#"
    SELECT id, unit_id, meter_type, initial_reading, threshold,
           total_digits, calculation_digits, created_at
    FROM meters
"#;

// ---

async fn list(
    caller: Caller,
    Query(params): Query<MetersQuery>,
    State(pool): State<PgPool>,
) -> Result<Json<Vec<Meter>>, AppError> {
    // ---
    let unit_filter = if caller.is_admin() {
        params.unit_id
    } else {
        match caller.unit_id {
            Some(id) => Some(id),
            None => return Ok(Json(Vec::new())),
        }
    };

    let meters = sqlx::query_as::<_, Meter>(&format!(
        "{SELECT_METER} WHERE ($1::BIGINT IS NULL OR unit_id = $1) ORDER BY unit_id, meter_type"
    ))
    .bind(unit_filter)
    .fetch_all(&pool)
    .await?;

    Ok(Json(meters))
}

async fn fetch(
    caller: Caller,
    Path(id): Path<i64>,
    State(pool): State<PgPool>,
) -> Result<Json<Meter>, AppError> {
    // ---
    let meter = sqlx::query_as::<_, Meter>(&format!("{SELECT_METER} WHERE id = $1"))
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| AppError::not_found(format!("meter {id} not found")))?;

    caller.authorize_unit(meter.unit_id)?;

    Ok(Json(meter))
}

async fn create(
    caller: Caller,
    State(pool): State<PgPool>,
    Json(payload): Json<CreateMeterPayload>,
) -> Result<impl IntoResponse, AppError> {
    // ---
    caller.require_admin()?;
    check_config(payload.initial_reading, payload.threshold)?;

    let unit: Option<i64> = sqlx::query_scalar("SELECT id FROM units WHERE id = $1")
        .bind(payload.unit_id)
        .fetch_optional(&pool)
        .await?;
    if unit.is_none() {
        return Err(AppError::validation(format!(
            "unit {} not found",
            payload.unit_id
        )));
    }

    // One meter per type per unit; the unique index is the backstop for races.
    let duplicate: Option<i64> =
        sqlx::query_scalar("SELECT id FROM meters WHERE unit_id = $1 AND meter_type = $2")
            .bind(payload.unit_id)
            .bind(payload.meter_type)
            .fetch_optional(&pool)
            .await?;
    if duplicate.is_some() {
        return Err(AppError::validation(format!(
            "unit {} already has a meter of that type",
            payload.unit_id
        )));
    }

    let meter = sqlx::query_as::<_, Meter>(
        r#"
        INSERT INTO meters (unit_id, meter_type, initial_reading, threshold,
                            total_digits, calculation_digits)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, unit_id, meter_type, initial_reading, threshold,
                  total_digits, calculation_digits, created_at
        "#,
    )
    .bind(payload.unit_id)
    .bind(payload.meter_type)
    .bind(payload.initial_reading)
    .bind(payload.threshold)
    .bind(payload.total_digits.unwrap_or(8))
    .bind(payload.calculation_digits.unwrap_or(5))
    .fetch_one(&pool)
    .await?;

    Ok((StatusCode::CREATED, Json(meter)))
}

async fn update(
    caller: Caller,
    Path(id): Path<i64>,
    State(pool): State<PgPool>,
    Json(payload): Json<UpdateMeterPayload>,
) -> Result<Json<Meter>, AppError> {
    // ---
    caller.require_admin()?;
    check_config(payload.initial_reading, payload.threshold)?;

    let meter = sqlx::query_as::<_, Meter>(
        r#"
        UPDATE meters
        SET initial_reading = $2, threshold = $3,
            total_digits = COALESCE($4, total_digits),
            calculation_digits = COALESCE($5, calculation_digits)
        WHERE id = $1
        RETURNING id, unit_id, meter_type, initial_reading, threshold,
                  total_digits, calculation_digits, created_at
        "#,
    )
    .bind(id)
    .bind(payload.initial_reading)
    .bind(payload.threshold)
    .bind(payload.total_digits)
    .bind(payload.calculation_digits)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::not_found(format!("meter {id} not found")))?;

    Ok(Json(meter))
}

async fn remove(
    caller: Caller,
    Path(id): Path<i64>,
    State(pool): State<PgPool>,
) -> Result<StatusCode, AppError> {
    // ---
    caller.require_admin()?;

    let result = sqlx::query("DELETE FROM meters WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found(format!("meter {id} not found")));
    }

    Ok(StatusCode::NO_CONTENT)
}
