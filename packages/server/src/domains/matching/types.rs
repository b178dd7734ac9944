use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::common::{MatchId, ProfessionalId, RequestId};
use crate::config::DEFAULT_SEARCH_RADIUS_KM;

/// How long a professional has to answer an offer
pub const OFFER_WINDOW_MINUTES: i64 = 7;

/// Tunables for the matching engine
#[derive(Debug, Clone, TypedBuilder)]
pub struct MatchingSettings {
    #[builder(default = DEFAULT_SEARCH_RADIUS_KM)]
    pub default_radius_km: f64,
    #[builder(default = Duration::minutes(OFFER_WINDOW_MINUTES))]
    pub offer_window: Duration,
    /// Base URL for accept/reject links, without trailing slash
    #[builder(setter(into))]
    pub public_base_url: String,
}

impl MatchingSettings {
    pub fn accept_link(&self, match_id: MatchId) -> String {
        format!("{}/api/matches/{}/accept", self.public_base_url, match_id)
    }

    pub fn reject_link(&self, match_id: MatchId) -> String {
        format!("{}/api/matches/{}/reject", self.public_base_url, match_id)
    }
}

// =============================================================================
// Notification delivery
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    Sent,
    Failed,
    /// The professional has no address for this channel
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub email: ChannelStatus,
    pub push: ChannelStatus,
}

impl DeliveryReport {
    pub fn any_sent(&self) -> bool {
        self.email == ChannelStatus::Sent || self.push == ChannelStatus::Sent
    }
}

// =============================================================================
// Engine outcomes
// =============================================================================

/// Result of selecting and notifying the next candidate
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AdvanceOutcome {
    Offered {
        match_id: MatchId,
        professional_id: ProfessionalId,
        distance_km: f64,
        expires_at: DateTime<Utc>,
        delivery: DeliveryReport,
    },
    /// Everyone within the radius has already been offered this request
    NoMoreCandidates,
    /// The request is missing or no longer pending
    AlreadyResolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Accept,
    Reject,
}

/// Result of a professional answering an offer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RespondOutcome {
    Matched {
        request_id: RequestId,
    },
    Rejected {
        request_id: RequestId,
        /// What happened when the next candidate was sought; `None` if that failed
        next: Option<AdvanceOutcome>,
    },
    NotFound,
    AlreadyFinalized,
    Expired,
}

impl RespondOutcome {
    /// Plain-language message for the person who clicked the link
    pub fn message(&self) -> &'static str {
        match self {
            RespondOutcome::Matched { .. } => {
                "You got the job! The customer has been matched with you and will be in touch."
            }
            RespondOutcome::Rejected { .. } => {
                "Thanks for letting us know. We'll offer this request to someone else."
            }
            RespondOutcome::NotFound => "We couldn't find this offer.",
            RespondOutcome::AlreadyFinalized => {
                "This request is already closed. Another professional accepted it."
            }
            RespondOutcome::Expired => "This link has expired.",
        }
    }
}

/// Summary of one sweep run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Offers moved from waiting to expired
    pub expired: usize,
    /// Requests that got a new offer
    pub advanced: usize,
    /// Requests with nobody left to offer
    pub exhausted: usize,
    /// Requests that were already matched
    pub already_resolved: usize,
    /// Requests whose advance returned an error
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_links() {
        let settings = MatchingSettings::builder()
            .public_base_url("https://miles.example")
            .build();
        let id = MatchId::new();

        assert_eq!(
            settings.accept_link(id),
            format!("https://miles.example/api/matches/{}/accept", id)
        );
        assert_eq!(
            settings.reject_link(id),
            format!("https://miles.example/api/matches/{}/reject", id)
        );
        assert_eq!(settings.default_radius_km, 50.0);
        assert_eq!(settings.offer_window, Duration::minutes(7));
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(AdvanceOutcome::NoMoreCandidates).unwrap();
        assert_eq!(json, serde_json::json!({ "outcome": "no_more_candidates" }));

        let json = serde_json::to_value(RespondOutcome::Expired).unwrap();
        assert_eq!(json, serde_json::json!({ "outcome": "expired" }));

        let decision: Decision = serde_json::from_str("\"reject\"").unwrap();
        assert_eq!(decision, Decision::Reject);
    }
}
