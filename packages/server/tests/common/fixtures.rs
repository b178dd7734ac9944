//! Test fixtures for creating test data.
//!
//! Professionals are inserted with plain SQL; the service never writes them.

use anyhow::Result;
use chrono::{DateTime, Utc};
use miles_core::common::{MatchId, ProfessionalId};
use miles_core::domains::requests::models::{NewServiceRequest, ServiceRequest};
use miles_core::domains::requests::RequestStore;
use sqlx::PgPool;
use std::sync::atomic::{AtomicU32, Ordering};

use super::TestHarness;

static NEXT_ORIGIN: AtomicU32 = AtomicU32::new(0);

/// A point far (> 200km) from every other test's point.
pub fn unique_origin() -> (f64, f64) {
    let n = NEXT_ORIGIN.fetch_add(1, Ordering::SeqCst);
    let lat = -60.0 + f64::from(n % 60) * 2.0;
    let lng = -170.0 + f64::from(n / 60) * 4.0;
    (lat, lng)
}

/// Insert an active professional `km_north` kilometres north of `origin`.
pub async fn create_professional(
    pool: &PgPool,
    name: &str,
    origin: (f64, f64),
    km_north: f64,
) -> Result<ProfessionalId> {
    let id = ProfessionalId::new();
    // One degree of latitude is ~111.2 km
    let latitude = origin.0 + km_north / 111.195;

    sqlx::query(
        "INSERT INTO professionals (id, name, email, push_token, latitude, longitude)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(id)
    .bind(name)
    .bind(format!("{}@example.com", name.to_lowercase()))
    .bind(format!("ExponentPushToken[{}]", name.to_lowercase()))
    .bind(latitude)
    .bind(origin.1)
    .execute(pool)
    .await?;

    Ok(id)
}

pub async fn create_request_at(harness: &TestHarness, origin: (f64, f64)) -> Result<ServiceRequest> {
    harness
        .deps
        .requests
        .insert(
            NewServiceRequest::builder()
                .client_name("Aiko Tanaka")
                .client_email("aiko@example.com")
                .address("Tokyo, Shibuya")
                .latitude(origin.0)
                .longitude(origin.1)
                .build(),
        )
        .await
}

/// Push an offer's deadline into the past.
pub async fn backdate_offer(pool: &PgPool, id: MatchId, expires_at: DateTime<Utc>) -> Result<()> {
    sqlx::query("UPDATE matches SET expires_at = $2 WHERE id = $1")
        .bind(id)
        .bind(expires_at)
        .execute(pool)
        .await?;
    Ok(())
}
