use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{MatchId, ProfessionalId, RequestId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "match_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Offer sent, no answer yet
    #[default]
    Waiting,
    Accepted,
    Rejected,
    Expired,
}

impl MatchStatus {
    pub fn is_waiting(&self) -> bool {
        matches!(self, MatchStatus::Waiting)
    }
}

/// Offer extended to one professional for one request
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Match {
    pub id: MatchId,
    pub request_id: RequestId,
    pub professional_id: ProfessionalId,
    pub status: MatchStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Match {
    pub fn new_waiting(
        request_id: RequestId,
        professional_id: ProfessionalId,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MatchId::new(),
            request_id,
            professional_id,
            status: MatchStatus::Waiting,
            expires_at,
            created_at: Utc::now(),
        }
    }

    /// Still waiting and inside its window at `now`.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.status.is_waiting() && self.expires_at > now
    }

    /// Waiting but past its deadline; the sweeper's target.
    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        self.status.is_waiting() && self.expires_at < now
    }
}
