//! Database schema management for meterhub.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs` (EMBP: single gateway call).

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates the building → unit → meter → reading hierarchy plus the users
/// table. Deleting a parent cascades to its children (a meter takes its
/// readings with it). Safe to call on every startup; no-op if objects
/// already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS buildings (
            id         BIGSERIAL PRIMARY KEY,
            name       TEXT        NOT NULL,
            address    TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS units (
            id          BIGSERIAL PRIMARY KEY,
            building_id BIGINT      NOT NULL REFERENCES buildings (id) ON DELETE CASCADE,
            number      TEXT        NOT NULL,
            floor       INTEGER,
            created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS meters (
            id                 BIGSERIAL PRIMARY KEY,
            unit_id            BIGINT           NOT NULL REFERENCES units (id) ON DELETE CASCADE,
            meter_type         TEXT             NOT NULL,
            initial_reading    DOUBLE PRECISION NOT NULL DEFAULT 0,
            threshold          DOUBLE PRECISION NOT NULL DEFAULT 0,
            total_digits       INTEGER          NOT NULL DEFAULT 8,
            calculation_digits INTEGER          NOT NULL DEFAULT 5,
            created_at         TIMESTAMPTZ      NOT NULL DEFAULT now()
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS readings (
            id          BIGSERIAL PRIMARY KEY,
            meter_id    BIGINT           NOT NULL REFERENCES meters (id) ON DELETE CASCADE,
            reading     DOUBLE PRECISION NOT NULL,
            consumption DOUBLE PRECISION NOT NULL,
            date        DATE             NOT NULL,
            is_alert    BOOLEAN          NOT NULL DEFAULT FALSE,
            created_at  TIMESTAMPTZ      NOT NULL DEFAULT now(),
            updated_at  TIMESTAMPTZ      NOT NULL DEFAULT now()
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id          BIGSERIAL PRIMARY KEY,
            name        TEXT        NOT NULL,
            email       TEXT        NOT NULL UNIQUE,
            role        TEXT        NOT NULL DEFAULT 'user',
            building_id BIGINT      REFERENCES buildings (id) ON DELETE SET NULL,
            unit_id     BIGINT      REFERENCES units (id) ON DELETE SET NULL,
            created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // At most one meter of a given type per unit
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_meters_unit_type
            ON meters (unit_id, meter_type);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Baseline lookup ordering for the reading evaluator
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_readings_meter_date
            ON readings (meter_id, date DESC, created_at DESC);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
