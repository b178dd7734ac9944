//! Request Store: persistence for service requests.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::common::pagination::ValidatedPage;
use crate::common::RequestId;

use super::models::{NewServiceRequest, RequestStatus, ServiceRequest};

/// Storage for service requests.
///
/// The only mutation after creation is `mark_matched`, a guarded
/// `pending` → `matched` write.
#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn insert(&self, request: NewServiceRequest) -> Result<ServiceRequest>;

    async fn find_by_id(&self, id: RequestId) -> Result<Option<ServiceRequest>>;

    /// Move a request from `pending` to `matched`.
    ///
    /// Returns `true` only for the call that performed the transition.
    async fn mark_matched(&self, id: RequestId) -> Result<bool>;

    /// Requests placed by a client (case-insensitive email), newest first.
    async fn find_by_client_email(&self, client_email: &str) -> Result<Vec<ServiceRequest>>;

    /// One page of all requests, newest first. Fetches `page.fetch_limit()` rows.
    async fn find_page(&self, page: &ValidatedPage) -> Result<Vec<ServiceRequest>>;
}

/// PostgreSQL-backed request store.
pub struct PostgresRequestStore {
    pool: PgPool,
}

impl PostgresRequestStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RequestStore for PostgresRequestStore {
    async fn insert(&self, request: NewServiceRequest) -> Result<ServiceRequest> {
        let row = request.into_request();

        sqlx::query_as::<_, ServiceRequest>(
            r#"
            INSERT INTO requests
                (id, created_at, client_name, client_email, address, latitude, longitude, note, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(row.id)
        .bind(row.created_at)
        .bind(&row.client_name)
        .bind(&row.client_email)
        .bind(&row.address)
        .bind(row.latitude)
        .bind(row.longitude)
        .bind(&row.note)
        .bind(row.status)
        .fetch_one(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn find_by_id(&self, id: RequestId) -> Result<Option<ServiceRequest>> {
        sqlx::query_as::<_, ServiceRequest>("SELECT * FROM requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn mark_matched(&self, id: RequestId) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE requests SET status = $2 WHERE id = $1 AND status = $3",
        )
        .bind(id)
        .bind(RequestStatus::Matched)
        .bind(RequestStatus::Pending)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_by_client_email(&self, client_email: &str) -> Result<Vec<ServiceRequest>> {
        sqlx::query_as::<_, ServiceRequest>(
            "SELECT * FROM requests
             WHERE lower(client_email) = lower($1)
             ORDER BY created_at DESC, id DESC",
        )
        .bind(client_email.trim())
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn find_page(&self, page: &ValidatedPage) -> Result<Vec<ServiceRequest>> {
        sqlx::query_as::<_, ServiceRequest>(
            "SELECT * FROM requests
             WHERE ($1::uuid IS NULL OR id < $1)
             ORDER BY id DESC
             LIMIT $2",
        )
        .bind(page.cursor)
        .bind(page.fetch_limit())
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }
}
