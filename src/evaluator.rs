//! Reading ingestion and consumption evaluation.
//!
//! This is the one piece of real domain logic in the service: given a new or
//! edited meter reading, find the correct "previous reading" baseline,
//! compute `consumption = reading - baseline`, and flag the reading as an
//! alert when consumption strictly exceeds the meter's threshold.
//!
//! Baseline rules:
//! - Readings are ordered by `date DESC, created_at DESC`; when several
//!   readings share a date, the one created last wins. That tie-break is the
//!   only ordering rule in the system and changes computed consumption for
//!   same-day multi-entry scenarios, so it must not be reordered.
//! - A meter with no prior readings falls back to its `initial_reading`.
//! - Creating a reading compares against the latest reading overall; editing
//!   one compares against readings dated strictly before the edited date,
//!   excluding the reading itself. Both paths go through [`baseline`] so the
//!   ordering cannot diverge.
//!
//! Readings are a monotonic counter: a value below the baseline is rejected
//! outright. The meter's digit-count fields are not consulted, so a physical
//! counter rollover is rejected like any other decrease.
//!
//! Concurrency: each evaluation runs in a transaction that first locks the
//! meter row (`SELECT ... FOR UPDATE`). Two concurrent writes to the same
//! meter therefore serialize, and the second one sees the first one's row
//! when it computes its baseline.

use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool};

use crate::{error::AppError, models::ReadingDetail};

// ---

/// Outcome of the pure consumption/alert computation.
#[derive(Debug, PartialEq)]
pub struct Evaluation {
    pub consumption: f64,
    pub is_alert: bool,
}

/// Compute consumption and the alert flag for a candidate value against a
/// baseline.
///
/// Fails with a `ValidationError` when the value is below the baseline.
/// Consumption exactly equal to the threshold is not an alert.
pub fn evaluate(baseline: f64, value: f64, threshold: f64) -> Result<Evaluation, AppError> {
    // ---
    if value < baseline {
        return Err(AppError::validation(
            "reading cannot be lower than previous reading",
        ));
    }

    let consumption = value - baseline;
    Ok(Evaluation {
        consumption,
        is_alert: consumption > threshold,
    })
}

// ---

#[derive(Debug, sqlx::FromRow)]
struct MeterConfig {
    initial_reading: f64,
    threshold: f64,
}

/// Lock the meter row for the duration of the surrounding transaction and
/// return its evaluation config. `None` if the meter does not exist.
async fn lock_meter(
    conn: &mut PgConnection,
    meter_id: i64,
) -> Result<Option<MeterConfig>, sqlx::Error> {
    // ---
    sqlx::query_as::<_, MeterConfig>(
        r#"
        SELECT initial_reading, threshold
        FROM meters
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(meter_id)
    .fetch_optional(&mut *conn)
    .await
}

/// Find the baseline value for an evaluation.
///
/// One parameterized lookup serves both the create path (no exclusion, no
/// date filter) and the edit path (exclude the edited reading, only readings
/// dated strictly before the new date). Falls back to `initial_reading` when
/// no prior reading matches.
async fn baseline(
    conn: &mut PgConnection,
    meter_id: i64,
    exclude_reading_id: Option<i64>,
    before_date: Option<NaiveDate>,
    initial_reading: f64,
) -> Result<f64, sqlx::Error> {
    // ---
    let previous: Option<f64> = sqlx::query_scalar(
        r#"
        SELECT reading
        FROM readings
        WHERE meter_id = $1
          AND ($2::BIGINT IS NULL OR id <> $2)
          AND ($3::DATE IS NULL OR date < $3)
        ORDER BY date DESC, created_at DESC
        LIMIT 1
        "#,
    )
    .bind(meter_id)
    .bind(exclude_reading_id)
    .bind(before_date)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(previous.unwrap_or(initial_reading))
}

/// Fetch a reading joined with its meter/unit/building display fields.
async fn fetch_detail(conn: &mut PgConnection, reading_id: i64) -> Result<ReadingDetail, sqlx::Error> {
    // ---
    sqlx::query_as::<_, ReadingDetail>(
        r#"
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
        WHERE r.id = $1
        "#,
    )
    .bind(reading_id)
    .fetch_one(&mut *conn)
    .await
}

fn check_value(value: f64) -> Result<(), AppError> {
    // ---
    if !value.is_finite() || value < 0.0 {
        return Err(AppError::validation("reading must be a non-negative number"));
    }
    Ok(())
}

// ---

/// Evaluate and persist a new reading.
///
/// The caller is assumed to be authorized for the meter's unit already. On
/// success exactly one row was inserted; on failure nothing was written.
pub async fn create_reading(
    pool: &PgPool,
    meter_id: i64,
    value: f64,
    date: NaiveDate,
) -> Result<ReadingDetail, AppError> {
    // ---
    check_value(value)?;

    let mut tx = pool.begin().await?;

    let meter = lock_meter(&mut tx, meter_id)
        .await?
        .ok_or_else(|| AppError::validation(format!("meter {meter_id} not found")))?;

    let base = baseline(&mut tx, meter_id, None, None, meter.initial_reading).await?;
    let outcome = evaluate(base, value, meter.threshold)?;

    let reading_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO readings (meter_id, reading, consumption, date, is_alert)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(meter_id)
    .bind(value)
    .bind(outcome.consumption)
    .bind(date)
    .bind(outcome.is_alert)
    .fetch_one(&mut *tx)
    .await?;

    let detail = fetch_detail(&mut tx, reading_id).await?;
    tx.commit().await?;

    tracing::info!(
        "recorded reading {} for meter {}: consumption={}, alert={}",
        reading_id,
        meter_id,
        outcome.consumption,
        outcome.is_alert
    );

    Ok(detail)
}

/// Re-evaluate and persist an edited reading.
///
/// The baseline search excludes the reading being edited and only considers
/// readings dated strictly before the (possibly changed) date.
pub async fn update_reading(
    pool: &PgPool,
    reading_id: i64,
    meter_id: i64,
    value: f64,
    date: NaiveDate,
) -> Result<ReadingDetail, AppError> {
    // ---
    check_value(value)?;

    let mut tx = pool.begin().await?;

    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM readings WHERE id = $1 FOR UPDATE")
        .bind(reading_id)
        .fetch_optional(&mut *tx)
        .await?;
    if existing.is_none() {
        return Err(AppError::not_found(format!("reading {reading_id} not found")));
    }

    let meter = lock_meter(&mut tx, meter_id)
        .await?
        .ok_or_else(|| AppError::validation(format!("meter {meter_id} not found")))?;

    let base = baseline(
        &mut tx,
        meter_id,
        Some(reading_id),
        Some(date),
        meter.initial_reading,
    )
    .await?;
    let outcome = evaluate(base, value, meter.threshold)?;

    sqlx::query(
        r#"
        UPDATE readings
        SET meter_id = $2, reading = $3, consumption = $4, date = $5,
            is_alert = $6, updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(reading_id)
    .bind(meter_id)
    .bind(value)
    .bind(outcome.consumption)
    .bind(date)
    .bind(outcome.is_alert)
    .execute(&mut *tx)
    .await?;

    let detail = fetch_detail(&mut tx, reading_id).await?;
    tx.commit().await?;

    tracing::info!(
        "updated reading {} for meter {}: consumption={}, alert={}",
        reading_id,
        meter_id,
        outcome.consumption,
        outcome.is_alert
    );

    Ok(detail)
}

// ---

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn first_reading_uses_initial_reading_as_baseline() {
        // ---
        // initial_reading=1000, threshold=50, first reading 1030 on day one
        let outcome = evaluate(1000.0, 1030.0, 50.0).unwrap();
        assert_eq!(outcome.consumption, 30.0);
        assert!(!outcome.is_alert);
    }

    #[test]
    fn consumption_above_threshold_is_an_alert() {
        // ---
        // second reading 1090 against baseline 1030, threshold 50
        let outcome = evaluate(1030.0, 1090.0, 50.0).unwrap();
        assert_eq!(outcome.consumption, 60.0);
        assert!(outcome.is_alert);
    }

    #[test]
    fn consumption_equal_to_threshold_is_not_an_alert() {
        // ---
        let outcome = evaluate(1030.0, 1080.0, 50.0).unwrap();
        assert_eq!(outcome.consumption, 50.0);
        assert!(!outcome.is_alert);
    }

    #[test]
    fn value_below_baseline_is_rejected() {
        // ---
        // third reading attempt 1080 against baseline 1090
        let err = evaluate(1090.0, 1080.0, 50.0).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(
            err.to_string(),
            "reading cannot be lower than previous reading"
        );
    }

    #[test]
    fn value_equal_to_baseline_means_zero_consumption() {
        // ---
        let outcome = evaluate(500.0, 500.0, 0.0).unwrap();
        assert_eq!(outcome.consumption, 0.0);
        assert!(!outcome.is_alert);
    }

    #[test]
    fn zero_threshold_alerts_on_any_consumption() {
        // ---
        let outcome = evaluate(500.0, 500.5, 0.0).unwrap();
        assert_eq!(outcome.consumption, 0.5);
        assert!(outcome.is_alert);
    }

    #[test]
    fn negative_and_non_finite_values_are_rejected() {
        // ---
        assert!(check_value(-1.0).is_err());
        assert!(check_value(f64::NAN).is_err());
        assert!(check_value(f64::INFINITY).is_err());
        assert!(check_value(0.0).is_ok());
    }
}
