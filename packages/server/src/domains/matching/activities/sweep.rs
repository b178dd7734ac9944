//! Expiry sweep: close overdue offers and move their requests along.
//!
//! Runs from the cron scheduler, the `sweep_expired` binary or the HTTP
//! trigger. Each run is independent; a second run with nothing overdue
//! changes nothing.

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{error, info, instrument};

use crate::common::RequestId;
use crate::domains::matching::activities::advance::advance;
use crate::domains::matching::types::{AdvanceOutcome, SweepReport};
use crate::kernel::ServerDeps;

#[instrument(skip(deps))]
pub async fn sweep_expired(deps: &ServerDeps) -> Result<SweepReport> {
    let expired = deps
        .matches
        .expire_overdue(Utc::now())
        .await
        .context("Failed to expire overdue offers")?;

    let mut report = SweepReport {
        expired: expired.len(),
        ..Default::default()
    };

    if expired.is_empty() {
        return Ok(report);
    }

    let mut request_ids: Vec<RequestId> = Vec::new();
    for offer in &expired {
        if !request_ids.contains(&offer.request_id) {
            request_ids.push(offer.request_id);
        }
    }

    info!(
        expired = report.expired,
        requests = request_ids.len(),
        "Expired overdue offers"
    );

    // One request failing to advance must not stop the others
    for request_id in request_ids {
        match advance(request_id, deps.settings.default_radius_km, deps).await {
            Ok(AdvanceOutcome::Offered { .. }) => report.advanced += 1,
            Ok(AdvanceOutcome::NoMoreCandidates) => report.exhausted += 1,
            Ok(AdvanceOutcome::AlreadyResolved) => report.already_resolved += 1,
            Err(e) => {
                error!(request_id = %request_id, error = %e, "Advance after expiry failed");
                report.failed += 1;
            }
        }
    }

    info!(?report, "Sweep complete");

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::matching::models::MatchStatus;
    use crate::kernel::test_dependencies::{shibuya_request, TestDependencies};
    use chrono::Duration;

    #[tokio::test]
    async fn test_sweep_with_nothing_overdue_is_noop() {
        let test_deps = TestDependencies::new().with_shibuya_professionals().await;
        let deps = test_deps.server_deps();
        let request = test_deps.insert_request(shibuya_request()).await;
        advance(request.id, 50.0, &deps).await.unwrap();

        let report = sweep_expired(&deps).await.unwrap();

        assert_eq!(report, SweepReport::default());
        let offers = deps.matches.find_by_request(request.id).await.unwrap();
        assert_eq!(offers[0].status, MatchStatus::Waiting);
    }

    #[tokio::test]
    async fn test_sweep_expires_and_advances() {
        let test_deps = TestDependencies::new().with_shibuya_professionals().await;
        let deps = test_deps.server_deps();
        let request = test_deps.insert_request(shibuya_request()).await;

        let AdvanceOutcome::Offered { match_id, .. } =
            advance(request.id, 50.0, &deps).await.unwrap()
        else {
            panic!("expected an offer");
        };
        test_deps
            .matches
            .backdate(match_id, Utc::now() - Duration::minutes(1))
            .await;

        let report = sweep_expired(&deps).await.unwrap();

        assert_eq!(report.expired, 1);
        assert_eq!(report.advanced, 1);

        let offers = deps.matches.find_by_request(request.id).await.unwrap();
        assert_eq!(offers.len(), 2);
        assert_eq!(offers[0].status, MatchStatus::Expired);
        assert_eq!(offers[1].status, MatchStatus::Waiting);
    }

    #[tokio::test]
    async fn test_sweep_exhausts_single_candidate() {
        // Only the 2km professional is within a 5km radius
        let test_deps = TestDependencies::new()
            .with_default_radius(5.0)
            .with_shibuya_professionals()
            .await;
        let deps = test_deps.server_deps();
        let request = test_deps.insert_request(shibuya_request()).await;

        let AdvanceOutcome::Offered { match_id, .. } =
            advance(request.id, 5.0, &deps).await.unwrap()
        else {
            panic!("expected an offer");
        };
        test_deps
            .matches
            .backdate(match_id, Utc::now() - Duration::minutes(1))
            .await;

        let report = sweep_expired(&deps).await.unwrap();
        assert_eq!(report.expired, 1);
        assert_eq!(report.exhausted, 1);

        let stored = deps.requests.find_by_id(request.id).await.unwrap().unwrap();
        assert!(stored.is_pending());

        // Running again finds nothing new
        let again = sweep_expired(&deps).await.unwrap();
        assert_eq!(again, SweepReport::default());
        assert_eq!(deps.matches.find_by_request(request.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_skips_matched_requests() {
        let test_deps = TestDependencies::new().with_shibuya_professionals().await;
        let deps = test_deps.server_deps();
        let request = test_deps.insert_request(shibuya_request()).await;

        let AdvanceOutcome::Offered { match_id, .. } =
            advance(request.id, 50.0, &deps).await.unwrap()
        else {
            panic!("expected an offer");
        };
        test_deps
            .matches
            .backdate(match_id, Utc::now() - Duration::minutes(1))
            .await;
        deps.requests.mark_matched(request.id).await.unwrap();

        let report = sweep_expired(&deps).await.unwrap();

        assert_eq!(report.expired, 1);
        assert_eq!(report.already_resolved, 1);
        assert_eq!(deps.matches.find_by_request(request.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_groups_offers_by_request() {
        let test_deps = TestDependencies::new().with_shibuya_professionals().await;
        let deps = test_deps.server_deps();
        let request = test_deps.insert_request(shibuya_request()).await;

        for _ in 0..2 {
            let AdvanceOutcome::Offered { match_id, .. } =
                advance(request.id, 50.0, &deps).await.unwrap()
            else {
                panic!("expected an offer");
            };
            test_deps
                .matches
                .backdate(match_id, Utc::now() - Duration::minutes(1))
                .await;
        }

        let report = sweep_expired(&deps).await.unwrap();

        assert_eq!(report.expired, 2);
        // One advance for the request, which finds nobody left in 50km
        assert_eq!(report.exhausted, 1);
        assert_eq!(report.advanced, 0);
    }
}
