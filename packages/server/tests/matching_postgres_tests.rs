//! Matching engine against a real Postgres: the guarded writes, unique
//! indexes and `find_nearby_pros` ordering.
//!
//! Requires Docker. Run with: cargo test --test matching_postgres_tests -- --ignored

mod common;

use chrono::{Duration, Utc};
use common::*;
use miles_core::domains::matching::activities::{advance, respond, sweep_expired};
use miles_core::domains::matching::{
    AdvanceOutcome, Decision, GuardedWrite, MatchStatus, OfferInsert, RespondOutcome,
};
use miles_core::domains::professionals::ProfessionalDirectory;
use miles_core::domains::requests::RequestStore;

#[tokio::test]
#[ignore = "requires Docker"]
async fn find_nearby_pros_orders_by_distance_within_radius() {
    let harness = TestHarness::new().await.unwrap();
    let origin = unique_origin();
    let near = create_professional(&harness.db_pool, "Near", origin, 2.0).await.unwrap();
    let mid = create_professional(&harness.db_pool, "Mid", origin, 10.0).await.unwrap();
    create_professional(&harness.db_pool, "Far", origin, 80.0).await.unwrap();

    let candidates = harness
        .deps
        .directory
        .find_nearby(origin.0, origin.1, 50.0)
        .await
        .unwrap();

    let ids: Vec<_> = candidates.iter().map(|c| c.professional_id).collect();
    assert_eq!(ids, vec![near, mid]);
    assert!((candidates[0].distance_km - 2.0).abs() < 0.05);
    assert_eq!(candidates[0].email.as_deref(), Some("near@example.com"));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn inactive_professionals_are_not_candidates() {
    let harness = TestHarness::new().await.unwrap();
    let origin = unique_origin();
    let id = create_professional(&harness.db_pool, "Retired", origin, 1.0).await.unwrap();
    sqlx::query("UPDATE professionals SET active = FALSE WHERE id = $1")
        .bind(id)
        .execute(&harness.db_pool)
        .await
        .unwrap();

    let candidates = harness
        .deps
        .directory
        .find_nearby(origin.0, origin.1, 50.0)
        .await
        .unwrap();

    assert!(candidates.is_empty());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn offer_insert_is_unique_per_professional() {
    let harness = TestHarness::new().await.unwrap();
    let origin = unique_origin();
    let pro = create_professional(&harness.db_pool, "Kenji", origin, 2.0).await.unwrap();
    let request = create_request_at(&harness, origin).await.unwrap();
    let expires_at = Utc::now() + Duration::minutes(7);

    let first = harness
        .deps
        .matches
        .create_offer(request.id, pro, expires_at)
        .await
        .unwrap();
    let second = harness
        .deps
        .matches
        .create_offer(request.id, pro, expires_at)
        .await
        .unwrap();

    assert!(matches!(first, OfferInsert::Created(_)));
    assert!(matches!(second, OfferInsert::AlreadyOffered));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn second_accept_hits_partial_unique_index() {
    let harness = TestHarness::new().await.unwrap();
    let origin = unique_origin();
    let a = create_professional(&harness.db_pool, "Kenji", origin, 2.0).await.unwrap();
    let b = create_professional(&harness.db_pool, "Mei", origin, 3.0).await.unwrap();
    let request = create_request_at(&harness, origin).await.unwrap();
    let expires_at = Utc::now() + Duration::minutes(7);
    let ledger = &harness.deps.matches;

    let OfferInsert::Created(offer_a) = ledger.create_offer(request.id, a, expires_at).await.unwrap()
    else {
        panic!("offer to a must be created");
    };
    let OfferInsert::Created(offer_b) = ledger.create_offer(request.id, b, expires_at).await.unwrap()
    else {
        panic!("offer to b must be created");
    };

    let now = Utc::now();
    assert!(matches!(
        ledger.accept(offer_a.id, now).await.unwrap(),
        GuardedWrite::Applied(_)
    ));
    assert!(matches!(
        ledger.accept(offer_b.id, now).await.unwrap(),
        GuardedWrite::AcceptedElsewhere
    ));
    assert!(matches!(
        ledger.accept(offer_a.id, now).await.unwrap(),
        GuardedWrite::Stale
    ));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn full_flow_reject_then_accept() {
    let harness = TestHarness::new().await.unwrap();
    let origin = unique_origin();
    create_professional(&harness.db_pool, "Kenji", origin, 2.0).await.unwrap();
    create_professional(&harness.db_pool, "Mei", origin, 10.0).await.unwrap();
    create_professional(&harness.db_pool, "Haruto", origin, 80.0).await.unwrap();
    let request = create_request_at(&harness, origin).await.unwrap();
    let deps = &harness.deps;

    let AdvanceOutcome::Offered { match_id: first, .. } =
        advance(request.id, 50.0, deps).await.unwrap()
    else {
        panic!("expected first offer");
    };

    let RespondOutcome::Rejected {
        next: Some(AdvanceOutcome::Offered { match_id: second, distance_km, .. }),
        ..
    } = respond(first, Decision::Reject, deps).await.unwrap()
    else {
        panic!("expected follow-up offer");
    };
    assert!((distance_km - 10.0).abs() < 0.1);

    assert_eq!(
        respond(second, Decision::Accept, deps).await.unwrap(),
        RespondOutcome::Matched { request_id: request.id }
    );

    let stored = deps.requests.find_by_id(request.id).await.unwrap().unwrap();
    assert!(!stored.is_pending());

    let statuses: Vec<_> = deps
        .matches
        .find_by_request(request.id)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.status)
        .collect();
    assert_eq!(statuses, vec![MatchStatus::Rejected, MatchStatus::Accepted]);

    assert_eq!(harness.email.sent().await.len(), 2);
    assert_eq!(harness.push.sent().await.len(), 2);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn concurrent_accepts_have_exactly_one_winner() {
    let harness = TestHarness::new().await.unwrap();
    let origin = unique_origin();
    create_professional(&harness.db_pool, "Kenji", origin, 2.0).await.unwrap();
    create_professional(&harness.db_pool, "Mei", origin, 4.0).await.unwrap();
    let request = create_request_at(&harness, origin).await.unwrap();
    let deps = harness.deps.clone();

    let mut offers = Vec::new();
    for _ in 0..2 {
        match advance(request.id, 50.0, &deps).await.unwrap() {
            AdvanceOutcome::Offered { match_id, .. } => offers.push(match_id),
            other => panic!("expected an offer, got {:?}", other),
        }
    }

    let handles: Vec<_> = offers
        .into_iter()
        .map(|id| {
            let deps = deps.clone();
            tokio::spawn(async move { respond(id, Decision::Accept, &deps).await })
        })
        .collect();

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap().unwrap());
    }

    let winners = outcomes
        .iter()
        .filter(|o| matches!(o, RespondOutcome::Matched { .. }))
        .count();
    assert_eq!(winners, 1);
    assert!(outcomes.contains(&RespondOutcome::AlreadyFinalized));

    let accepted: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM matches WHERE request_id = $1 AND status = 'accepted'",
    )
    .bind(request.id)
    .fetch_one(&harness.db_pool)
    .await
    .unwrap();
    assert_eq!(accepted, 1);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn concurrent_advances_offer_distinct_professionals() {
    let harness = TestHarness::new().await.unwrap();
    let origin = unique_origin();
    for (name, km) in [("Kenji", 1.0), ("Mei", 2.0), ("Haruto", 3.0)] {
        create_professional(&harness.db_pool, name, origin, km).await.unwrap();
    }
    let request = create_request_at(&harness, origin).await.unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let deps = harness.deps.clone();
            tokio::spawn(async move { advance(request.id, 50.0, &deps).await })
        })
        .collect();

    let mut offered = 0;
    for handle in handles {
        if let AdvanceOutcome::Offered { .. } = handle.await.unwrap().unwrap() {
            offered += 1;
        }
    }
    assert_eq!(offered, 3);

    let (total, distinct): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COUNT(DISTINCT professional_id) FROM matches WHERE request_id = $1",
    )
    .bind(request.id)
    .fetch_one(&harness.db_pool)
    .await
    .unwrap();
    assert_eq!((total, distinct), (3, 3));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn sweep_expires_then_exhausts() {
    let harness = TestHarness::new().await.unwrap();
    let origin = unique_origin();
    create_professional(&harness.db_pool, "Kenji", origin, 2.0).await.unwrap();
    let request = create_request_at(&harness, origin).await.unwrap();
    let deps = &harness.deps;

    let AdvanceOutcome::Offered { match_id, .. } = advance(request.id, 50.0, deps).await.unwrap()
    else {
        panic!("expected an offer");
    };
    backdate_offer(&harness.db_pool, match_id, Utc::now() - Duration::minutes(1))
        .await
        .unwrap();

    // A late accept loses to the expired deadline
    assert_eq!(
        respond(match_id, Decision::Accept, deps).await.unwrap(),
        RespondOutcome::Expired
    );

    // Other tests share the database, so only this request's numbers are checked
    sweep_expired(deps).await.unwrap();

    let offer = deps.matches.find_by_id(match_id).await.unwrap().unwrap();
    assert_eq!(offer.status, MatchStatus::Expired);
    let stored = deps.requests.find_by_id(request.id).await.unwrap().unwrap();
    assert!(stored.is_pending());
    assert_eq!(deps.matches.find_by_request(request.id).await.unwrap().len(), 1);

    assert_eq!(
        advance(request.id, 50.0, deps).await.unwrap(),
        AdvanceOutcome::NoMoreCandidates
    );
}
