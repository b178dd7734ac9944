//! Match Ledger: every offer ever extended, with guarded status transitions.
//!
//! Each invariant is held by a single-row guarded write:
//! - `(request_id, professional_id)` is unique, so a professional is offered a
//!   request at most once; `create_offer` reports the loser instead of failing.
//! - a partial unique index allows one `accepted` row per request.
//! - answers require `status = 'waiting' AND expires_at > now`, the sweeper
//!   requires `status = 'waiting' AND expires_at < now`; whichever commits
//!   first wins.

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::common::{MatchId, ProfessionalId, RequestId};

use super::models::{Match, MatchStatus};

const ONE_ACCEPTED_CONSTRAINT: &str = "matches_one_accepted_per_request";

/// Result of inserting an offer.
#[derive(Debug, Clone)]
pub enum OfferInsert {
    Created(Match),
    /// Another invocation already offered this request to the professional
    AlreadyOffered,
}

/// Result of a guarded transition out of `waiting`.
#[derive(Debug, Clone)]
pub enum GuardedWrite {
    Applied(Match),
    /// The row was no longer waiting, or its window had closed
    Stale,
    /// Another offer for the same request is already accepted
    AcceptedElsewhere,
}

#[async_trait]
pub trait MatchLedger: Send + Sync {
    async fn find_by_id(&self, id: MatchId) -> Result<Option<Match>>;

    /// All offers for a request in creation order.
    async fn find_by_request(&self, request_id: RequestId) -> Result<Vec<Match>>;

    async fn find_accepted(&self, request_id: RequestId) -> Result<Option<Match>>;

    /// Professionals already offered this request, whatever the offer's status.
    async fn offered_professionals(&self, request_id: RequestId) -> Result<HashSet<ProfessionalId>>;

    async fn create_offer(
        &self,
        request_id: RequestId,
        professional_id: ProfessionalId,
        expires_at: DateTime<Utc>,
    ) -> Result<OfferInsert>;

    /// `waiting` → `accepted`, only while the window is open at `now`.
    async fn accept(&self, id: MatchId, now: DateTime<Utc>) -> Result<GuardedWrite>;

    /// `waiting` → `rejected`, only while the window is open at `now`.
    async fn reject(&self, id: MatchId, now: DateTime<Utc>) -> Result<GuardedWrite>;

    /// `waiting` → `expired` for one offer regardless of its deadline.
    /// Returns `true` if the row changed.
    async fn withdraw(&self, id: MatchId) -> Result<bool>;

    /// Expire every other waiting offer of the request. Returns how many changed.
    async fn expire_others(&self, request_id: RequestId, keep: MatchId) -> Result<u64>;

    /// Expire every waiting offer whose deadline is before `now`, returning them.
    async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Match>>;
}

/// PostgreSQL-backed ledger.
pub struct PostgresMatchLedger {
    pool: PgPool,
}

impl PostgresMatchLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn close_waiting(
        &self,
        id: MatchId,
        to: MatchStatus,
        now: DateTime<Utc>,
    ) -> Result<GuardedWrite> {
        let result = sqlx::query_as::<_, Match>(
            "UPDATE matches
             SET status = $2
             WHERE id = $1 AND status = $3 AND expires_at > $4
             RETURNING *",
        )
        .bind(id)
        .bind(to)
        .bind(MatchStatus::Waiting)
        .bind(now)
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(Some(row)) => Ok(GuardedWrite::Applied(row)),
            Ok(None) => Ok(GuardedWrite::Stale),
            Err(sqlx::Error::Database(db))
                if db.is_unique_violation() && db.constraint() == Some(ONE_ACCEPTED_CONSTRAINT) =>
            {
                Ok(GuardedWrite::AcceptedElsewhere)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl MatchLedger for PostgresMatchLedger {
    async fn find_by_id(&self, id: MatchId) -> Result<Option<Match>> {
        sqlx::query_as::<_, Match>("SELECT * FROM matches WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn find_by_request(&self, request_id: RequestId) -> Result<Vec<Match>> {
        sqlx::query_as::<_, Match>(
            "SELECT * FROM matches WHERE request_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn find_accepted(&self, request_id: RequestId) -> Result<Option<Match>> {
        sqlx::query_as::<_, Match>("SELECT * FROM matches WHERE request_id = $1 AND status = $2")
            .bind(request_id)
            .bind(MatchStatus::Accepted)
            .fetch_optional(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn offered_professionals(&self, request_id: RequestId) -> Result<HashSet<ProfessionalId>> {
        let ids = sqlx::query_scalar::<_, ProfessionalId>(
            "SELECT professional_id FROM matches WHERE request_id = $1",
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().collect())
    }

    async fn create_offer(
        &self,
        request_id: RequestId,
        professional_id: ProfessionalId,
        expires_at: DateTime<Utc>,
    ) -> Result<OfferInsert> {
        let offer = Match::new_waiting(request_id, professional_id, expires_at);

        let inserted = sqlx::query_as::<_, Match>(
            "INSERT INTO matches (id, request_id, professional_id, status, expires_at, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (request_id, professional_id) DO NOTHING
             RETURNING *",
        )
        .bind(offer.id)
        .bind(offer.request_id)
        .bind(offer.professional_id)
        .bind(offer.status)
        .bind(offer.expires_at)
        .bind(offer.created_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match inserted {
            Some(row) => OfferInsert::Created(row),
            None => OfferInsert::AlreadyOffered,
        })
    }

    async fn accept(&self, id: MatchId, now: DateTime<Utc>) -> Result<GuardedWrite> {
        self.close_waiting(id, MatchStatus::Accepted, now).await
    }

    async fn reject(&self, id: MatchId, now: DateTime<Utc>) -> Result<GuardedWrite> {
        self.close_waiting(id, MatchStatus::Rejected, now).await
    }

    async fn withdraw(&self, id: MatchId) -> Result<bool> {
        let result = sqlx::query("UPDATE matches SET status = $2 WHERE id = $1 AND status = $3")
            .bind(id)
            .bind(MatchStatus::Expired)
            .bind(MatchStatus::Waiting)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn expire_others(&self, request_id: RequestId, keep: MatchId) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE matches SET status = $3
             WHERE request_id = $1 AND id <> $2 AND status = $4",
        )
        .bind(request_id)
        .bind(keep)
        .bind(MatchStatus::Expired)
        .bind(MatchStatus::Waiting)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Match>> {
        sqlx::query_as::<_, Match>(
            "UPDATE matches SET status = $2
             WHERE status = $3 AND expires_at < $1
             RETURNING *",
        )
        .bind(now)
        .bind(MatchStatus::Expired)
        .bind(MatchStatus::Waiting)
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }
}
