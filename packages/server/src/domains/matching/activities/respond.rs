//! A professional's answer to an offer.

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{error, info, instrument, warn};

use crate::common::{MatchId, RequestId};
use crate::domains::matching::activities::advance::advance;
use crate::domains::matching::ledger::GuardedWrite;
use crate::domains::matching::types::{Decision, RespondOutcome};
use crate::kernel::ServerDeps;

/// Apply an accept or reject to an offer.
///
/// Every transition is a guarded write, so concurrent answers for the same
/// request (or an answer racing the sweeper) resolve to exactly one winner;
/// the losers get `AlreadyFinalized` or `Expired`.
#[instrument(skip(deps), fields(match_id = %match_id))]
pub async fn respond(
    match_id: MatchId,
    decision: Decision,
    deps: &ServerDeps,
) -> Result<RespondOutcome> {
    let Some(offer) = deps
        .matches
        .find_by_id(match_id)
        .await
        .context("Failed to load offer")?
    else {
        return Ok(RespondOutcome::NotFound);
    };

    let request_id = offer.request_id;

    let request = deps
        .requests
        .find_by_id(request_id)
        .await
        .context("Failed to load request")?;
    if !request.as_ref().is_some_and(|r| r.is_pending()) {
        info!("Response arrived after the request was closed");
        return Ok(RespondOutcome::AlreadyFinalized);
    }

    // An earlier accept committed but never closed the request
    if let Some(accepted) = deps.matches.find_accepted(request_id).await? {
        finish_accept(request_id, accepted.id, deps).await?;
        return Ok(accepted_outcome(accepted.id, match_id, request_id));
    }

    let now = Utc::now();
    if !offer.is_open_at(now) {
        info!(status = ?offer.status, "Response arrived for a closed offer");
        return Ok(RespondOutcome::Expired);
    }

    match decision {
        Decision::Accept => accept(match_id, request_id, deps).await,
        Decision::Reject => reject(match_id, request_id, deps).await,
    }
}

async fn accept(match_id: MatchId, request_id: RequestId, deps: &ServerDeps) -> Result<RespondOutcome> {
    match deps.matches.accept(match_id, Utc::now()).await? {
        GuardedWrite::Applied(_) => {}
        GuardedWrite::AcceptedElsewhere => {
            info!("Another offer for this request was accepted first");
            if let Some(accepted) = deps.matches.find_accepted(request_id).await? {
                finish_accept(request_id, accepted.id, deps).await?;
            }
            return Ok(RespondOutcome::AlreadyFinalized);
        }
        GuardedWrite::Stale => return stale_outcome(match_id, request_id, deps).await,
    }

    if !finish_accept(request_id, match_id, deps).await? {
        // Only possible if the request was closed by another path; the
        // accepted row stays, the ledger's one-accepted index holds.
        warn!("Request was no longer pending when the accept committed");
    }

    Ok(RespondOutcome::Matched { request_id })
}

/// Close the request around its accepted offer: flip the request to matched
/// and expire every other waiting offer. Both writes are guarded, so running
/// this again after a partial failure is safe.
///
/// Returns whether this call flipped the request.
pub(crate) async fn finish_accept(
    request_id: RequestId,
    accepted_id: MatchId,
    deps: &ServerDeps,
) -> Result<bool> {
    let flipped = deps.requests.mark_matched(request_id).await?;
    let expired = deps.matches.expire_others(request_id, accepted_id).await?;

    info!(
        request_id = %request_id,
        match_id = %accepted_id,
        expired_siblings = expired,
        "Offer accepted, request matched"
    );

    Ok(flipped)
}

/// The owner of the accepted offer hears `Matched`, everyone else hears the
/// request is closed.
fn accepted_outcome(accepted_id: MatchId, match_id: MatchId, request_id: RequestId) -> RespondOutcome {
    if accepted_id == match_id {
        RespondOutcome::Matched { request_id }
    } else {
        RespondOutcome::AlreadyFinalized
    }
}

async fn reject(match_id: MatchId, request_id: RequestId, deps: &ServerDeps) -> Result<RespondOutcome> {
    match deps.matches.reject(match_id, Utc::now()).await? {
        GuardedWrite::Applied(_) => {}
        GuardedWrite::AcceptedElsewhere => return Ok(RespondOutcome::AlreadyFinalized),
        GuardedWrite::Stale => return stale_outcome(match_id, request_id, deps).await,
    }

    info!(request_id = %request_id, "Offer rejected, seeking next candidate");

    // The rejection stands even if finding the next candidate fails
    let next = match advance(request_id, deps.settings.default_radius_km, deps).await {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            error!(request_id = %request_id, error = %e, "Advance after rejection failed");
            None
        }
    };

    Ok(RespondOutcome::Rejected { request_id, next })
}

/// The guarded write found the offer already closed; tell the caller why.
async fn stale_outcome(
    match_id: MatchId,
    request_id: RequestId,
    deps: &ServerDeps,
) -> Result<RespondOutcome> {
    // A concurrent accept may have won the guard and not closed the request yet
    if let Some(accepted) = deps.matches.find_accepted(request_id).await? {
        finish_accept(request_id, accepted.id, deps).await?;
        return Ok(accepted_outcome(accepted.id, match_id, request_id));
    }

    let still_pending = deps
        .requests
        .find_by_id(request_id)
        .await?
        .is_some_and(|r| r.is_pending());

    Ok(if still_pending {
        RespondOutcome::Expired
    } else {
        RespondOutcome::AlreadyFinalized
    })
}
