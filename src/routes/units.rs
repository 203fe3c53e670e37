//! CRUD for units (apartments/offices) within a building.

use axum::{
    extract::Path, extract::Query, extract::State, http::StatusCode,
    response::IntoResponse, routing::get, Json, Router,
};
use serde::Deserialize;
use sqlx::PgPool;

use crate::{auth::Caller, error::AppError, models::Unit};

// ---

pub fn router() -> Router<PgPool> {
    // ---
    Router::new()
        .route("/api/units", get(list).post(create))
        .route("/api/units/{id}", get(fetch).put(update).delete(remove))
}

#[derive(Debug, Deserialize)]
struct UnitPayload {
    building_id: i64,
    number: String,
    floor: Option<i32>,
}

impl UnitPayload {
    fn validate(&self) -> Result<(), AppError> {
        // ---
        if self.number.trim().is_empty() {
            return Err(AppError::validation("unit number is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct UnitsQuery {
    building_id: Option<i64>,
}

// ---

async fn building_exists(pool: &PgPool, building_id: i64) -> Result<bool, AppError> {
    // ---
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM buildings WHERE id = $1")
        .bind(building_id)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

async fn list(
    caller: Caller,
    Query(params): Query<UnitsQuery>,
    State(pool): State<PgPool>,
) -> Result<Json<Vec<Unit>>, AppError> {
    // ---
    // Non-admin callers see their own unit only, regardless of filters.
    let (building_filter, unit_filter) = if caller.is_admin() {
        (params.building_id, None)
    } else {
        match caller.unit_id {
            Some(id) => (None, Some(id)),
            None => return Ok(Json(Vec::new())),
        }
    };

    let units = sqlx::query_as::<_, Unit>(
        r#"
        SELECT id, building_id, number, floor, created_at
        FROM units
        WHERE ($1::BIGINT IS NULL OR building_id = $1)
          AND ($2::BIGINT IS NULL OR id = $2)
        ORDER BY building_id, number
        "#,
    )
    .bind(building_filter)
    .bind(unit_filter)
    .fetch_all(&pool)
    .await?;

    Ok(Json(units))
}

async fn fetch(
    caller: Caller,
    Path(id): Path<i64>,
    State(pool): State<PgPool>,
) -> Result<Json<Unit>, AppError> {
    // ---
    caller.authorize_unit(id)?;

    let unit = sqlx::query_as::<_, Unit>(
        "SELECT id, building_id, number, floor, created_at FROM units WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::not_found(format!("unit {id} not found")))?;

    Ok(Json(unit))
}

async fn create(
    caller: Caller,
    State(pool): State<PgPool>,
    Json(payload): Json<UnitPayload>,
) -> Result<impl IntoResponse, AppError> {
    // ---
    caller.require_admin()?;
    payload.validate()?;

    if !building_exists(&pool, payload.building_id).await? {
        return Err(AppError::validation(format!(
            "building {} not found",
            payload.building_id
        )));
    }

    let unit = sqlx::query_as::<_, Unit>(
        r#"
        INSERT INTO units (building_id, number, floor)
        VALUES ($1, $2, $3)
        RETURNING id, building_id, number, floor, created_at
        "#,
    )
    .bind(payload.building_id)
    .bind(payload.number.trim())
    .bind(payload.floor)
    .fetch_one(&pool)
    .await?;

    Ok((StatusCode::CREATED, Json(unit)))
}

async fn update(
    caller: Caller,
    Path(id): Path<i64>,
    State(pool): State<PgPool>,
    Json(payload): Json<UnitPayload>,
) -> Result<Json<Unit>, AppError> {
    // ---
    caller.require_admin()?;
    payload.validate()?;

    if !building_exists(&pool, payload.building_id).await? {
        return Err(AppError::validation(format!(
            "building {} not found",
            payload.building_id
        )));
    }

    let unit = sqlx::query_as::<_, Unit>(
        r#"
        UPDATE units
        SET building_id = $2, number = $3, floor = $4
        WHERE id = $1
        RETURNING id, building_id, number, floor, created_at
        "#,
    )
    .bind(id)
    .bind(payload.building_id)
    .bind(payload.number.trim())
    .bind(payload.floor)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::not_found(format!("unit {id} not found")))?;

    Ok(Json(unit))
}

async fn remove(
    caller: Caller,
    Path(id): Path<i64>,
    State(pool): State<PgPool>,
) -> Result<StatusCode, AppError> {
    // ---
    caller.require_admin()?;

    let result = sqlx::query("DELETE FROM units WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found(format!("unit {id} not found")));
    }

    Ok(StatusCode::NO_CONTENT)
}
