//! End-to-end tests against a running meterhub instance.
//!
//! Point `BASE_URL` at a server started with a scratch database (defaults to
//! `http://localhost:8080`). Identity headers stand in for the fronting auth
//! provider.

use anyhow::Result;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

// ---

#[derive(Debug, Deserialize)]
struct ReadingDetail {
    id: i64,
    meter_id: i64,
    reading: f64,
    consumption: f64,
    date: NaiveDate,
    is_alert: bool,
    unit_number: String,
    building_name: String,
}

fn base_url() -> String {
    std::env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:8080".into())
}

fn admin(client: &Client, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
    // ---
    client.request(method, url).header("x-user-role", "admin")
}

/// Create a building, a unit, and an energy meter; returns (unit_id, meter_id).
async fn setup_meter(
    client: &Client,
    base: &str,
    initial_reading: f64,
    threshold: f64,
) -> Result<(i64, i64)> {
    // ---
    let building: Value = admin(client, reqwest::Method::POST, format!("{base}/api/buildings"))
        .json(&json!({ "name": format!("test-building-{}", std::process::id()) }))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    let building_id = building["id"].as_i64().unwrap();

    let unit: Value = admin(client, reqwest::Method::POST, format!("{base}/api/units"))
        .json(&json!({ "building_id": building_id, "number": "1A", "floor": 1 }))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    let unit_id = unit["id"].as_i64().unwrap();

    let meter: Value = admin(client, reqwest::Method::POST, format!("{base}/api/meters"))
        .json(&json!({
            "unit_id": unit_id,
            "meter_type": "energy",
            "initial_reading": initial_reading,
            "threshold": threshold,
        }))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    Ok((unit_id, meter["id"].as_i64().unwrap()))
}

async fn post_reading(
    client: &Client,
    base: &str,
    meter_id: i64,
    reading: f64,
    date: &str,
) -> Result<reqwest::Response> {
    // ---
    Ok(
        admin(client, reqwest::Method::POST, format!("{base}/api/readings"))
            .json(&json!({ "meter_id": meter_id, "reading": reading, "date": date }))
            .send()
            .await?,
    )
}

// ---

#[tokio::test]
async fn reading_lifecycle_end_to_end() -> Result<()> {
    // ---
    let base = base_url();
    let client = Client::new();

    // initial_reading=1000, threshold=50
    let (_unit_id, meter_id) = setup_meter(&client, &base, 1000.0, 50.0).await?;

    // First reading: baseline is the meter's initial reading
    let resp = post_reading(&client, &base, meter_id, 1030.0, "2024-01-01").await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let first: ReadingDetail = resp.json().await?;
    assert_eq!(first.meter_id, meter_id);
    assert_eq!(first.consumption, 30.0);
    assert!(!first.is_alert);
    assert_eq!(first.unit_number, "1A");
    assert!(!first.building_name.is_empty());

    // Second reading: baseline 1030, consumption 60 > threshold 50 → alert
    let resp = post_reading(&client, &base, meter_id, 1090.0, "2024-02-01").await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let second: ReadingDetail = resp.json().await?;
    assert_eq!(second.consumption, 60.0);
    assert!(second.is_alert);

    // A value below the latest reading is rejected and nothing is written
    let resp = post_reading(&client, &base, meter_id, 1080.0, "2024-03-01").await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await?;
    assert_eq!(body["error"], "reading cannot be lower than previous reading");

    let listed: Vec<ReadingDetail> = admin(
        &client,
        reqwest::Method::GET,
        format!("{base}/api/readings?meter_id={meter_id}"),
    )
    .send()
    .await?
    .error_for_status()?
    .json()
    .await?;
    assert_eq!(listed.len(), 2, "rejected reading must not be persisted");

    // Editing the second reading recomputes against readings dated strictly
    // before its date, excluding itself: baseline 1030 → consumption 65
    let resp = admin(
        &client,
        reqwest::Method::PUT,
        format!("{base}/api/readings/{}", second.id),
    )
    .json(&json!({ "meter_id": meter_id, "reading": 1095.0, "date": "2024-02-01" }))
    .send()
    .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let edited: ReadingDetail = resp.json().await?;
    assert_eq!(edited.id, second.id);
    assert_eq!(edited.reading, 1095.0);
    assert_eq!(edited.consumption, 65.0);
    assert!(edited.is_alert);
    assert_eq!(edited.date, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());

    // Unknown meter id on create is a validation failure
    let resp = post_reading(&client, &base, 999_999_999, 1.0, "2024-03-01").await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // Unknown reading id on edit is a 404
    let resp = admin(
        &client,
        reqwest::Method::PUT,
        format!("{base}/api/readings/999999999"),
    )
    .json(&json!({ "meter_id": meter_id, "reading": 1200.0, "date": "2024-03-01" }))
    .send()
    .await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn same_date_tie_break_uses_latest_created() -> Result<()> {
    // ---
    let base = base_url();
    let client = Client::new();

    let (_unit_id, meter_id) = setup_meter(&client, &base, 0.0, 1_000_000.0).await?;

    // Two readings on the same date; the later-created one is the baseline
    let resp = post_reading(&client, &base, meter_id, 100.0, "2024-04-01").await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let resp = post_reading(&client, &base, meter_id, 120.0, "2024-04-01").await?;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = post_reading(&client, &base, meter_id, 150.0, "2024-05-01").await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let third: ReadingDetail = resp.json().await?;
    assert_eq!(third.consumption, 30.0, "baseline must be the later-created 120");

    Ok(())
}

#[tokio::test]
async fn scope_is_enforced_for_non_admin_callers() -> Result<()> {
    // ---
    let base = base_url();
    let client = Client::new();

    let (unit_id, meter_id) = setup_meter(&client, &base, 0.0, 100.0).await?;

    // A caller scoped to a different unit may not record readings here
    let resp = client
        .post(format!("{base}/api/readings"))
        .header("x-user-role", "user")
        .header("x-user-unit", (unit_id + 1).to_string())
        .json(&json!({ "meter_id": meter_id, "reading": 10.0, "date": "2024-01-01" }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // The occupant of the unit may
    let resp = client
        .post(format!("{base}/api/readings"))
        .header("x-user-role", "user")
        .header("x-user-unit", unit_id.to_string())
        .json(&json!({ "meter_id": meter_id, "reading": 10.0, "date": "2024-01-01" }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);

    // Missing identity headers are rejected outright
    let resp = client
        .get(format!("{base}/api/readings"))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // Mutating collection endpoints are admin-only
    let resp = client
        .post(format!("{base}/api/buildings"))
        .header("x-user-role", "user")
        .header("x-user-unit", unit_id.to_string())
        .json(&json!({ "name": "not allowed" }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn health_endpoint_is_reachable() -> Result<()> {
    // ---
    let base = base_url();
    let client = Client::new();

    let body: Value = client
        .get(format!("{base}/health"))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    assert_eq!(body["status"], "ok");

    Ok(())
}
