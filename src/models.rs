//! Domain rows for the meterhub service.
//!
//! Each struct maps one-to-one onto a table from `schema.rs`, except
//! [`ReadingDetail`], which is the joined shape returned by the readings
//! endpoints (reading plus meter/unit/building display fields).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ---

/// Kind of consumption a meter measures.
///
/// Stored as lowercase text; at most one meter of a given type may exist
/// per unit (enforced by a unique index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum MeterType {
    Water,
    Energy,
}

/// Caller role, as asserted by the fronting auth provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

// ---

/// Top-level tenant grouping; owns zero or more units.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct Building {
    pub id: i64,
    pub name: String,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A unit inside a building; owns zero or more meters.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct Unit {
    pub id: i64,
    pub building_id: i64,
    pub number: String,
    pub floor: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// A physical water/energy meter attached to a unit.
///
/// `total_digits`/`calculation_digits` describe the physical counter face.
/// They are stored and served for display, but no code path uses them for
/// rollover handling: readings are treated as a strictly monotonic counter.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct Meter {
    pub id: i64,
    pub unit_id: i64,
    pub meter_type: MeterType,
    pub initial_reading: f64,
    pub threshold: f64,
    pub total_digits: i32,
    pub calculation_digits: i32,
    pub created_at: DateTime<Utc>,
}

/// A recorded point-in-time measurement of a meter, joined with its
/// meter/unit/building labels for response shaping.
///
/// `consumption` and `is_alert` are computed on write by the evaluator,
/// never supplied by the caller.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ReadingDetail {
    pub id: i64,
    pub meter_id: i64,
    pub reading: f64,
    pub consumption: f64,
    pub date: NaiveDate,
    pub is_alert: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub meter_type: MeterType,
    pub unit_id: i64,
    pub unit_number: String,
    pub building_id: i64,
    pub building_name: String,
}

/// Service-side identity record. Credentials and sessions live with the
/// external auth provider; this row only carries role and visibility scope.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub building_id: Option<i64>,
    pub unit_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}
