//! Offer notification dispatch.
//!
//! Email and push go out concurrently and independently. A failed channel
//! is logged and recorded in the report; it never fails the offer.

use tracing::{info, instrument, warn};

use crate::domains::matching::models::Match;
use crate::domains::matching::types::{ChannelStatus, DeliveryReport, MatchingSettings};
use crate::domains::professionals::Candidate;
use crate::domains::requests::models::ServiceRequest;
use crate::kernel::{EmailMessage, ServerDeps};

/// Rendered content of one offer, shared by both channels
#[derive(Debug, Clone)]
pub struct OfferNotice {
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
    pub push_title: String,
    pub push_body: String,
    pub data: serde_json::Value,
}

impl OfferNotice {
    pub fn render(
        request: &ServiceRequest,
        candidate: &Candidate,
        offer: &Match,
        settings: &MatchingSettings,
    ) -> Self {
        let accept = settings.accept_link(offer.id);
        let reject = settings.reject_link(offer.id);
        let plan = request.plan_label();
        let what = plan.as_deref().unwrap_or("a service request");
        let minutes = settings.offer_window.num_minutes();

        let subject = format!("New request near you: {}", what);

        let text_body = format!(
            "Hi {name},\n\n\
             A customer near you is looking for help with {what}.\n\n\
             Address: {address}\n\
             Distance: {distance:.1} km\n\n\
             Accept: {accept}\n\
             Decline: {reject}\n\n\
             This offer is yours for {minutes} minutes. Once another professional \
             accepts, these links stop working.\n",
            name = candidate.name,
            what = what,
            address = request.address,
            distance = candidate.distance_km,
            accept = accept,
            reject = reject,
            minutes = minutes,
        );

        let html_body = format!(
            "<p>Hi {name},</p>\
             <p>A customer near you is looking for help with {what}.</p>\
             <p><strong>Address:</strong> {address}<br><strong>Distance:</strong> {distance:.1} km</p>\
             <p><a href=\"{accept}\">Accept this request</a> &middot; <a href=\"{reject}\">Decline</a></p>\
             <p>This offer is yours for {minutes} minutes. Once another professional accepts, \
             these links stop working.</p>",
            name = escape_html(&candidate.name),
            what = escape_html(what),
            address = escape_html(&request.address),
            distance = candidate.distance_km,
            accept = accept,
            reject = reject,
            minutes = minutes,
        );

        let push_body = format!(
            "{} ({:.1} km away). Open to accept or decline within {} minutes.",
            request.address, candidate.distance_km, minutes
        );

        let data = serde_json::json!({
            "match_id": offer.id.to_string(),
            "request_id": request.id.to_string(),
            "address": request.address,
            "accept_url": accept,
            "reject_url": reject,
            "expires_at": offer.expires_at.to_rfc3339(),
        });

        Self {
            subject,
            text_body,
            html_body,
            push_title: "New request near you".to_string(),
            push_body,
            data,
        }
    }
}

/// Notify a candidate about a fresh offer over every channel they have.
#[instrument(skip_all, fields(match_id = %offer.id, professional_id = %candidate.professional_id))]
pub async fn notify_candidate(
    request: &ServiceRequest,
    candidate: &Candidate,
    offer: &Match,
    deps: &ServerDeps,
) -> DeliveryReport {
    let notice = OfferNotice::render(request, candidate, offer, &deps.settings);

    let email = async {
        let Some(address) = candidate.email_address() else {
            return ChannelStatus::Skipped;
        };
        let message = EmailMessage {
            to: address.to_string(),
            subject: notice.subject.clone(),
            text_body: notice.text_body.clone(),
            html_body: Some(notice.html_body.clone()),
        };
        match deps.email_service.send_email(&message).await {
            Ok(()) => ChannelStatus::Sent,
            Err(e) => {
                warn!(error = %e, "Offer email failed");
                ChannelStatus::Failed
            }
        }
    };

    let push = async {
        let Some(token) = candidate.push_identity() else {
            return ChannelStatus::Skipped;
        };
        match deps
            .push_service
            .send_notification(
                token,
                &notice.push_title,
                &notice.push_body,
                notice.data.clone(),
            )
            .await
        {
            Ok(()) => ChannelStatus::Sent,
            Err(e) => {
                warn!(error = %e, "Offer push notification failed");
                ChannelStatus::Failed
            }
        }
    };

    let (email, push) = tokio::join!(email, push);
    let report = DeliveryReport { email, push };

    if report.any_sent() {
        info!(?report, "Offer notification dispatched");
    } else {
        warn!(?report, "Offer notification reached no channel");
    }

    report
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
