//! Advance a pending request to its next candidate.
//!
//! Pipeline:
//! 1. Load request (missing or no longer pending = already resolved)
//! 2. Derive the already-offered set from the ledger
//! 3. Radius query against the directory, nearest first
//! 4. Pick the first candidate not yet offered
//! 5. Insert the offer (unique per request + professional)
//! 6. Notify over email and push

use std::collections::HashSet;

use anyhow::{ensure, Context, Result};
use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::common::{ProfessionalId, RequestId};
use crate::domains::matching::activities::notify::notify_candidate;
use crate::domains::matching::activities::respond::finish_accept;
use crate::domains::matching::ledger::OfferInsert;
use crate::domains::matching::types::AdvanceOutcome;
use crate::domains::professionals::Candidate;
use crate::kernel::ServerDeps;

/// First candidate, in directory order, that has not been offered the request.
pub fn select_next_candidate<'a>(
    candidates: &'a [Candidate],
    offered: &HashSet<ProfessionalId>,
) -> Option<&'a Candidate> {
    candidates
        .iter()
        .find(|c| !offered.contains(&c.professional_id))
}

/// Offer the request to the nearest professional who has not seen it yet.
///
/// Concurrent calls for the same request are safe: the ledger rejects a
/// second offer to the same professional and the loser re-runs selection.
#[instrument(skip(deps), fields(request_id = %request_id))]
pub async fn advance(
    request_id: RequestId,
    radius_km: f64,
    deps: &ServerDeps,
) -> Result<AdvanceOutcome> {
    ensure!(
        radius_km.is_finite() && radius_km > 0.0,
        "search radius must be a positive distance, got {}",
        radius_km
    );

    let request = match deps
        .requests
        .find_by_id(request_id)
        .await
        .context("Failed to load request")?
    {
        Some(request) if request.is_pending() => request,
        Some(_) | None => {
            debug!("Request missing or already resolved, nothing to advance");
            return Ok(AdvanceOutcome::AlreadyResolved);
        }
    };

    // An accept that committed without flipping the request is finished here
    if let Some(accepted) = deps.matches.find_accepted(request_id).await? {
        info!(match_id = %accepted.id, "Request has an accepted offer, closing it");
        finish_accept(request_id, accepted.id, deps).await?;
        return Ok(AdvanceOutcome::AlreadyResolved);
    }

    let candidates = deps
        .directory
        .find_nearby(request.latitude, request.longitude, radius_km)
        .await
        .context("Professional directory lookup failed")?;

    debug!(
        candidates = candidates.len(),
        radius_km, "Directory returned candidates"
    );

    // Each lost insert race removes one candidate, so this always terminates
    for _ in 0..=candidates.len() {
        let offered = deps.matches.offered_professionals(request_id).await?;

        let Some(candidate) = select_next_candidate(&candidates, &offered) else {
            warn!(
                offered = offered.len(),
                radius_km, "No more candidates for request; needs manual follow-up"
            );
            return Ok(AdvanceOutcome::NoMoreCandidates);
        };

        let expires_at = Utc::now() + deps.settings.offer_window;

        let offer = match deps
            .matches
            .create_offer(request_id, candidate.professional_id, expires_at)
            .await?
        {
            OfferInsert::Created(offer) => offer,
            OfferInsert::AlreadyOffered => {
                debug!(
                    professional_id = %candidate.professional_id,
                    "Candidate was offered concurrently, selecting again"
                );
                if !still_pending(request_id, deps).await? {
                    return Ok(AdvanceOutcome::AlreadyResolved);
                }
                continue;
            }
        };

        // The request may have been accepted while we were selecting
        if !still_pending(request_id, deps).await? {
            deps.matches.withdraw(offer.id).await?;
            info!(match_id = %offer.id, "Request resolved during selection, offer withdrawn");
            return Ok(AdvanceOutcome::AlreadyResolved);
        }

        info!(
            match_id = %offer.id,
            professional_id = %candidate.professional_id,
            distance_km = candidate.distance_km,
            "Offer created"
        );

        let delivery = notify_candidate(&request, candidate, &offer, deps).await;

        return Ok(AdvanceOutcome::Offered {
            match_id: offer.id,
            professional_id: candidate.professional_id,
            distance_km: candidate.distance_km,
            expires_at: offer.expires_at,
            delivery,
        });
    }

    warn!("Candidate selection kept losing races; giving up for this call");
    Ok(AdvanceOutcome::NoMoreCandidates)
}

async fn still_pending(request_id: RequestId, deps: &ServerDeps) -> Result<bool> {
    Ok(deps
        .requests
        .find_by_id(request_id)
        .await?
        .is_some_and(|r| r.is_pending()))
}
