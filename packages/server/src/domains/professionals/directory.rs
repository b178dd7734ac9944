use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, instrument};

use super::models::Candidate;

/// Geospatial lookup over the professional directory.
#[async_trait]
pub trait ProfessionalDirectory: Send + Sync {
    /// Active professionals within `radius_km` of the point, nearest first
    /// (ties broken by id so the order is deterministic).
    async fn find_nearby(&self, latitude: f64, longitude: f64, radius_km: f64)
        -> Result<Vec<Candidate>>;
}

/// Directory backed by the `find_nearby_pros` SQL function.
pub struct PostgresProfessionalDirectory {
    pool: PgPool,
}

impl PostgresProfessionalDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfessionalDirectory for PostgresProfessionalDirectory {
    #[instrument(skip(self))]
    async fn find_nearby(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    ) -> Result<Vec<Candidate>> {
        let candidates = sqlx::query_as::<_, Candidate>(
            "SELECT professional_id, name, email, push_token, distance_km
             FROM find_nearby_pros($1, $2, $3)",
        )
        .bind(latitude)
        .bind(longitude)
        .bind(radius_km)
        .fetch_all(&self.pool)
        .await?;

        debug!("Found {} candidates within {}km", candidates.len(), radius_km);

        Ok(candidates)
    }
}
