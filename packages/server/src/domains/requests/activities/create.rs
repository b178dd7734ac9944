//! Request intake: validate, geocode, persist, then make the first offer.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, instrument};

use crate::domains::matching::activities::advance;
use crate::domains::matching::AdvanceOutcome;
use crate::domains::requests::models::{compose_note, NewServiceRequest, ServiceRequest};
use crate::kernel::ServerDeps;

/// Customer order as submitted
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateRequestInput {
    pub client_name: String,
    pub client_email: String,
    pub address: String,
    #[serde(default)]
    pub note: Option<String>,
    /// Title of the plan the customer picked; stored as the note's first line
    #[serde(default)]
    pub plan: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Could not locate address: {0}")]
    Geocoding(#[source] anyhow::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// The stored request plus what happened when its first offer was attempted
#[derive(Debug, Clone, Serialize)]
pub struct CreatedRequest {
    pub request: ServiceRequest,
    /// `None` if the first advance failed; the request still exists
    pub first_offer: Option<AdvanceOutcome>,
}

/// Trimmed, checked copy of the input
#[derive(Debug, Clone, PartialEq)]
struct ValidInput {
    client_name: String,
    client_email: String,
    address: String,
    note: Option<String>,
}

fn validate(input: &CreateRequestInput) -> Result<ValidInput, ValidationError> {
    let required = |field: &'static str, value: &str| -> Result<String, ValidationError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(ValidationError {
                field,
                message: "is required",
            });
        }
        Ok(value.to_string())
    };

    let client_name = required("client_name", &input.client_name)?;
    let client_email = required("client_email", &input.client_email)?.to_lowercase();
    let address = required("address", &input.address)?;

    if !is_plausible_email(&client_email) {
        return Err(ValidationError {
            field: "client_email",
            message: "is not a valid email address",
        });
    }

    Ok(ValidInput {
        client_name,
        client_email,
        address,
        note: compose_note(input.plan.as_deref(), input.note.as_deref()),
    })
}

fn is_plausible_email(email: &str) -> bool {
    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty() && !domain.is_empty() && !email.contains(char::is_whitespace)
        }
        _ => false,
    }
}

/// Create a request and offer it to the nearest professional.
///
/// Geocoding runs before anything is stored, so a bad address leaves no
/// trace. The first advance is fire-and-forget: its failure is logged and
/// reported as `first_offer: None`.
#[instrument(skip(input, deps), fields(client_email = %input.client_email))]
pub async fn create_request(
    input: CreateRequestInput,
    deps: &ServerDeps,
) -> Result<CreatedRequest, IntakeError> {
    let valid = validate(&input)?;

    let location = deps
        .geocoder
        .geocode(&valid.address)
        .await
        .map_err(IntakeError::Geocoding)?;

    let request = deps
        .requests
        .insert(
            NewServiceRequest::builder()
                .client_name(valid.client_name)
                .client_email(valid.client_email)
                .address(valid.address)
                .latitude(location.latitude)
                .longitude(location.longitude)
                .note(valid.note)
                .build(),
        )
        .await?;

    info!(
        request_id = %request.id,
        latitude = request.latitude,
        longitude = request.longitude,
        "Request created"
    );

    let first_offer = match advance(request.id, deps.settings.default_radius_km, deps).await {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            error!(request_id = %request.id, error = %e, "First advance failed");
            None
        }
    };

    Ok(CreatedRequest {
        request,
        first_offer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::test_dependencies::{MockGeocoder, TestDependencies};

    fn input() -> CreateRequestInput {
        CreateRequestInput {
            client_name: "  Aiko Tanaka ".to_string(),
            client_email: "Aiko@Example.com".to_string(),
            address: "Tokyo, Shibuya".to_string(),
            note: Some("Ring twice".to_string()),
            plan: Some("Family portraits".to_string()),
        }
    }

    #[test]
    fn test_validate_trims_and_normalizes() {
        let valid = validate(&input()).unwrap();

        assert_eq!(valid.client_name, "Aiko Tanaka");
        assert_eq!(valid.client_email, "aiko@example.com");
        assert_eq!(
            valid.note.as_deref(),
            Some("Plan: Family portraits\nRing twice")
        );
    }

    #[test]
    fn test_validate_rejects_blank_and_bad_email() {
        let mut blank = input();
        blank.address = "   ".to_string();
        assert_eq!(validate(&blank).unwrap_err().field, "address");

        for email in ["no-at-sign", "@example.com", "aiko@", "a@b@c", "a iko@example.com"] {
            let mut bad = input();
            bad.client_email = email.to_string();
            assert_eq!(
                validate(&bad).unwrap_err(),
                ValidationError {
                    field: "client_email",
                    message: "is not a valid email address",
                },
                "{email} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_create_geocodes_persists_and_offers() {
        let test_deps = TestDependencies::new().with_shibuya_professionals().await;
        let deps = test_deps.server_deps();

        let created = create_request(input(), &deps).await.unwrap();

        assert!(created.request.is_pending());
        assert_eq!(created.request.latitude, 35.66);
        assert_eq!(created.request.plan_label().as_deref(), Some("Family portraits"));
        assert!(matches!(
            created.first_offer,
            Some(AdvanceOutcome::Offered { .. })
        ));
        assert_eq!(test_deps.geocoder.calls().await, vec!["Tokyo, Shibuya"]);
        assert_eq!(test_deps.email.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn test_geocode_failure_persists_nothing() {
        let test_deps = TestDependencies::new()
            .mock_geocoder(MockGeocoder::failing())
            .with_shibuya_professionals()
            .await;
        let deps = test_deps.server_deps();

        let err = create_request(input(), &deps).await.unwrap_err();

        assert!(matches!(err, IntakeError::Geocoding(_)));
        let stored = deps
            .requests
            .find_by_client_email("aiko@example.com")
            .await
            .unwrap();
        assert!(stored.is_empty());
    }

    #[tokio::test]
    async fn test_validation_failure_skips_geocoding() {
        let test_deps = TestDependencies::new();
        let deps = test_deps.server_deps();
        let mut bad = input();
        bad.client_name = String::new();

        let err = create_request(bad, &deps).await.unwrap_err();

        assert!(matches!(err, IntakeError::Validation(_)));
        assert!(test_deps.geocoder.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_request_survives_with_no_candidates() {
        let test_deps = TestDependencies::new();
        let deps = test_deps.server_deps();

        let created = create_request(input(), &deps).await.unwrap();

        assert_eq!(created.first_offer, Some(AdvanceOutcome::NoMoreCandidates));
        assert!(deps.requests.find_by_id(created.request.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_request_survives_failed_first_advance() {
        let test_deps = TestDependencies::new();
        test_deps.directory.fail_lookups(true);
        let deps = test_deps.server_deps();

        let created = create_request(input(), &deps).await.unwrap();

        assert_eq!(created.first_offer, None);
        assert!(deps.requests.find_by_id(created.request.id).await.unwrap().is_some());
    }
}
