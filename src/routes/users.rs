//! Admin-only user management.
//!
//! Rows here carry identity and visibility scope only. Passwords, cookies,
//! and session issuance live with the fronting auth provider.

use axum::{
    extract::Path, extract::State, http::StatusCode, response::IntoResponse,
    routing::get, Json, Router,
};
use serde::Deserialize;
use sqlx::PgPool;

use crate::{
    auth::Caller,
    error::AppError,
    models::{Role, User},
};

// ---

pub fn router() -> Router<PgPool> {
    // ---
    Router::new()
        .route("/api/users", get(list).post(create))
        .route("/api/users/{id}", get(fetch).put(update).delete(remove))
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    name: String,
    email: String,
    role: Role,
    building_id: Option<i64>,
    unit_id: Option<i64>,
}

impl UserPayload {
    fn validate(&self) -> Result<(), AppError> {
        // ---
        if self.name.trim().is_empty() {
            return Err(AppError::validation("user name is required"));
        }
        if !self.email.contains('@') {
            return Err(AppError::validation("a valid email address is required"));
        }
        Ok(())
    }
}

const SELECT_USER: &str = r#"
    SELECT id, name, email, role, building_id, unit_id, created_at
    FROM users
"#;

// ---

async fn email_taken(pool: &PgPool, email: &str, exclude: Option<i64>) -> Result<bool, AppError> {
    // ---
    let found: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM users WHERE email = $1 AND ($2::BIGINT IS NULL OR id <> $2)",
    )
    .bind(email)
    .bind(exclude)
    .fetch_optional(pool)
    .await?;
    Ok(found.is_some())
}

async fn list(caller: Caller, State(pool): State<PgPool>) -> Result<Json<Vec<User>>, AppError> {
    // ---
    caller.require_admin()?;

    let users = sqlx::query_as::<_, User>(&format!("{SELECT_USER} ORDER BY name"))
        .fetch_all(&pool)
        .await?;

    Ok(Json(users))
}

async fn fetch(
    caller: Caller,
    Path(id): Path<i64>,
    State(pool): State<PgPool>,
) -> Result<Json<User>, AppError> {
    // ---
    caller.require_admin()?;

    let user = sqlx::query_as::<_, User>(&format!("{SELECT_USER} WHERE id = $1"))
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| AppError::not_found(format!("user {id} not found")))?;

    Ok(Json(user))
}

async fn create(
    caller: Caller,
    State(pool): State<PgPool>,
    Json(payload): Json<UserPayload>,
) -> Result<impl IntoResponse, AppError> {
    // ---
    caller.require_admin()?;
    payload.validate()?;

    if email_taken(&pool, &payload.email, None).await? {
        return Err(AppError::validation("email already in use"));
    }

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (name, email, role, building_id, unit_id)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, name, email, role, building_id, unit_id, created_at
        "#,
    )
    .bind(payload.name.trim())
    .bind(&payload.email)
    .bind(payload.role)
    .bind(payload.building_id)
    .bind(payload.unit_id)
    .fetch_one(&pool)
    .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

async fn update(
    caller: Caller,
    Path(id): Path<i64>,
    State(pool): State<PgPool>,
    Json(payload): Json<UserPayload>,
) -> Result<Json<User>, AppError> {
    // ---
    caller.require_admin()?;
    payload.validate()?;

    if email_taken(&pool, &payload.email, Some(id)).await? {
        return Err(AppError::validation("email already in use"));
    }

    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET name = $2, email = $3, role = $4, building_id = $5, unit_id = $6
        WHERE id = $1
        RETURNING id, name, email, role, building_id, unit_id, created_at
        "#,
    )
    .bind(id)
    .bind(payload.name.trim())
    .bind(&payload.email)
    .bind(payload.role)
    .bind(payload.building_id)
    .bind(payload.unit_id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::not_found(format!("user {id} not found")))?;

    Ok(Json(user))
}

async fn remove(
    caller: Caller,
    Path(id): Path<i64>,
    State(pool): State<PgPool>,
) -> Result<StatusCode, AppError> {
    // ---
    caller.require_admin()?;

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found(format!("user {id} not found")));
    }

    Ok(StatusCode::NO_CONTENT)
}
