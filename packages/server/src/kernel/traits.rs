// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Matching decisions live in domains/matching; these just talk to providers.
//
// Naming convention: Base* for trait names (e.g., BaseGeocoder, BaseEmailService)

use anyhow::Result;
use async_trait::async_trait;

use crate::common::utils::GeocodedLocation;

// =============================================================================
// Geocoder Trait (Infrastructure)
// =============================================================================

#[async_trait]
pub trait BaseGeocoder: Send + Sync {
    /// Resolve a free-text address to coordinates
    async fn geocode(&self, address: &str) -> Result<GeocodedLocation>;
}

// =============================================================================
// Email Trait (Infrastructure)
// =============================================================================

/// Outbound email, provider-agnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: Option<String>,
}

#[async_trait]
pub trait BaseEmailService: Send + Sync {
    async fn send_email(&self, message: &EmailMessage) -> Result<()>;
}

// =============================================================================
// Push Notification Trait (Infrastructure)
// =============================================================================

#[async_trait]
pub trait BasePushNotificationService: Send + Sync {
    /// Send a push notification to a push token
    async fn send_notification(
        &self,
        push_token: &str,
        title: &str,
        body: &str,
        data: serde_json::Value,
    ) -> Result<()>;
}
