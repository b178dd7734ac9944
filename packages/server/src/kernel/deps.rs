//! Server dependencies for domain activities (using traits for testability)
//!
//! Every store and external provider is reached through a trait object so
//! tests can swap in the in-memory versions from `test_dependencies`.

use sqlx::PgPool;
use std::sync::Arc;

use crate::common::utils::{ExpoClient, GoogleGeocoder, PostmarkClient};
use crate::config::Config;
use crate::domains::matching::ledger::{MatchLedger, PostgresMatchLedger};
use crate::domains::matching::MatchingSettings;
use crate::domains::professionals::{PostgresProfessionalDirectory, ProfessionalDirectory};
use crate::domains::requests::store::{PostgresRequestStore, RequestStore};
use crate::kernel::{BaseEmailService, BaseGeocoder, BasePushNotificationService};

/// Dependencies shared by every invocation (HTTP handler, sweep, CLI)
#[derive(Clone)]
pub struct ServerDeps {
    pub requests: Arc<dyn RequestStore>,
    pub matches: Arc<dyn MatchLedger>,
    pub directory: Arc<dyn ProfessionalDirectory>,
    pub geocoder: Arc<dyn BaseGeocoder>,
    pub email_service: Arc<dyn BaseEmailService>,
    pub push_service: Arc<dyn BasePushNotificationService>,
    pub settings: MatchingSettings,
}

impl ServerDeps {
    pub fn new(
        requests: Arc<dyn RequestStore>,
        matches: Arc<dyn MatchLedger>,
        directory: Arc<dyn ProfessionalDirectory>,
        geocoder: Arc<dyn BaseGeocoder>,
        email_service: Arc<dyn BaseEmailService>,
        push_service: Arc<dyn BasePushNotificationService>,
        settings: MatchingSettings,
    ) -> Self {
        Self {
            requests,
            matches,
            directory,
            geocoder,
            email_service,
            push_service,
            settings,
        }
    }

    /// Production wiring: Postgres stores plus the real provider clients
    pub fn from_config(config: &Config, pool: PgPool) -> Self {
        let settings = MatchingSettings::builder()
            .default_radius_km(config.default_radius_km)
            .public_base_url(config.public_base_url.clone())
            .build();

        Self::new(
            Arc::new(PostgresRequestStore::new(pool.clone())),
            Arc::new(PostgresMatchLedger::new(pool.clone())),
            Arc::new(PostgresProfessionalDirectory::new(pool)),
            Arc::new(GoogleGeocoder::new(config.geocoding_api_key.clone())),
            Arc::new(PostmarkClient::new(
                config.postmark_server_token.clone(),
                config.email_from.clone(),
            )),
            Arc::new(ExpoClient::new(config.expo_access_token.clone())),
            settings,
        )
    }
}
