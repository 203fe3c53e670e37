//! CRUD for buildings, the top-level tenant grouping.
//!
//! Mutations are admin-only; reads are scoped, so a non-admin caller only
//! ever sees their own building.

use axum::{
    extract::Path, extract::State, http::StatusCode, response::IntoResponse,
    routing::get, Json, Router,
};
use serde::Deserialize;
use sqlx::PgPool;

use crate::{auth::Caller, error::AppError, models::Building};

// ---

pub fn router() -> Router<PgPool> {
    // ---
    Router::new()
        .route("/api/buildings", get(list).post(create))
        .route(
            "/api/buildings/{id}",
            get(fetch).put(update).delete(remove),
        )
}

#[derive(Debug, Deserialize)]
struct BuildingPayload {
    name: String,
    address: Option<String>,
}

impl BuildingPayload {
    fn validate(&self) -> Result<(), AppError> {
        // ---
        if self.name.trim().is_empty() {
            return Err(AppError::validation("building name is required"));
        }
        Ok(())
    }
}

// ---

async fn list(
    caller: Caller,
    State(pool): State<PgPool>,
) -> Result<Json<Vec<Building>>, AppError> {
    // ---
    let scope = if caller.is_admin() {
        None
    } else {
        match caller.building_id {
            Some(id) => Some(id),
            None => return Ok(Json(Vec::new())),
        }
    };

    let buildings = sqlx::query_as::<_, Building>(
        r#"
        SELECT id, name, address, created_at
        FROM buildings
        WHERE ($1::BIGINT IS NULL OR id = $1)
        ORDER BY name
        "#,
    )
    .bind(scope)
    .fetch_all(&pool)
    .await?;

    Ok(Json(buildings))
}

async fn fetch(
    caller: Caller,
    Path(id): Path<i64>,
    State(pool): State<PgPool>,
) -> Result<Json<Building>, AppError> {
    // ---
    caller.authorize_building(id)?;

    let building = sqlx::query_as::<_, Building>(
        "SELECT id, name, address, created_at FROM buildings WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::not_found(format!("building {id} not found")))?;

    Ok(Json(building))
}

async fn create(
    caller: Caller,
    State(pool): State<PgPool>,
    Json(payload): Json<BuildingPayload>,
) -> Result<impl IntoResponse, AppError> {
    // ---
    caller.require_admin()?;
    payload.validate()?;

    let building = sqlx::query_as::<_, Building>(
        r#"
        INSERT INTO buildings (name, address)
        VALUES ($1, $2)
        RETURNING id, name, address, created_at
        "#,
    )
    .bind(payload.name.trim())
    .bind(payload.address)
    .fetch_one(&pool)
    .await?;

    Ok((StatusCode::CREATED, Json(building)))
}

async fn update(
    caller: Caller,
    Path(id): Path<i64>,
    State(pool): State<PgPool>,
    Json(payload): Json<BuildingPayload>,
) -> Result<Json<Building>, AppError> {
    // ---
    caller.require_admin()?;
    payload.validate()?;

    let building = sqlx::query_as::<_, Building>(
        r#"
        UPDATE buildings
        SET name = $2, address = $3
        WHERE id = $1
        RETURNING id, name, address, created_at
        "#,
    )
    .bind(id)
    .bind(payload.name.trim())
    .bind(payload.address)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::not_found(format!("building {id} not found")))?;

    Ok(Json(building))
}

async fn remove(
    caller: Caller,
    Path(id): Path<i64>,
    State(pool): State<PgPool>,
) -> Result<StatusCode, AppError> {
    // ---
    caller.require_admin()?;

    let result = sqlx::query("DELETE FROM buildings WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found(format!("building {id} not found")));
    }

    Ok(StatusCode::NO_CONTENT)
}
