// TestDependencies - in-memory stores and mock providers for testing
//
// The in-memory stores enforce the same guards as the Postgres versions
// (unique offer per professional, one accepted offer per request, windowed
// answers), so engine tests exercise the real race outcomes.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{
    BaseEmailService, BaseGeocoder, BasePushNotificationService, EmailMessage, ServerDeps,
};
use crate::common::pagination::ValidatedPage;
use crate::common::utils::{calculate_distance_km, GeocodedLocation};
use crate::common::{MatchId, ProfessionalId, RequestId};
use crate::config::DEFAULT_SEARCH_RADIUS_KM;
use crate::domains::matching::ledger::{GuardedWrite, MatchLedger, OfferInsert};
use crate::domains::matching::models::{Match, MatchStatus};
use crate::domains::matching::MatchingSettings;
use crate::domains::professionals::{Candidate, ProfessionalDirectory};
use crate::domains::requests::models::{NewServiceRequest, RequestStatus, ServiceRequest};
use crate::domains::requests::store::RequestStore;

/// Coordinates of "Tokyo, Shibuya", the location most tests revolve around
pub const SHIBUYA: (f64, f64) = (35.66, 139.70);

/// A geocoded request at Shibuya
pub fn shibuya_request() -> NewServiceRequest {
    NewServiceRequest::builder()
        .client_name("Aiko Tanaka")
        .client_email("aiko@example.com")
        .address("Tokyo, Shibuya")
        .latitude(SHIBUYA.0)
        .longitude(SHIBUYA.1)
        .note(Some("Plan: Family portraits".to_string()))
        .build()
}

// =============================================================================
// In-memory Request Store
// =============================================================================

#[derive(Default)]
pub struct InMemoryRequestStore {
    rows: Mutex<Vec<ServiceRequest>>,
}

impl InMemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RequestStore for InMemoryRequestStore {
    async fn insert(&self, request: NewServiceRequest) -> Result<ServiceRequest> {
        let row = request.into_request();
        self.rows.lock().await.push(row.clone());
        Ok(row)
    }

    async fn find_by_id(&self, id: RequestId) -> Result<Option<ServiceRequest>> {
        Ok(self.rows.lock().await.iter().find(|r| r.id == id).cloned())
    }

    async fn mark_matched(&self, id: RequestId) -> Result<bool> {
        let mut rows = self.rows.lock().await;
        match rows.iter_mut().find(|r| r.id == id && r.is_pending()) {
            Some(row) => {
                row.status = RequestStatus::Matched;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_by_client_email(&self, client_email: &str) -> Result<Vec<ServiceRequest>> {
        let wanted = client_email.trim().to_lowercase();
        let mut found: Vec<_> = self
            .rows
            .lock()
            .await
            .iter()
            .filter(|r| r.client_email.to_lowercase() == wanted)
            .cloned()
            .collect();
        found.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(found)
    }

    async fn find_page(&self, page: &ValidatedPage) -> Result<Vec<ServiceRequest>> {
        let mut rows: Vec<_> = self
            .rows
            .lock()
            .await
            .iter()
            .filter(|r| page.cursor.map_or(true, |c| *r.id.as_uuid() < c))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.id.cmp(&a.id));
        rows.truncate(page.fetch_limit() as usize);
        Ok(rows)
    }
}

// =============================================================================
// In-memory Match Ledger
// =============================================================================

#[derive(Default)]
pub struct InMemoryMatchLedger {
    rows: Mutex<Vec<Match>>,
}

impl InMemoryMatchLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move an offer's deadline, e.g. into the past so the sweeper picks it up.
    pub async fn backdate(&self, id: MatchId, expires_at: DateTime<Utc>) {
        if let Some(row) = self.rows.lock().await.iter_mut().find(|m| m.id == id) {
            row.expires_at = expires_at;
        }
    }

    async fn close_waiting(
        &self,
        id: MatchId,
        to: MatchStatus,
        now: DateTime<Utc>,
    ) -> Result<GuardedWrite> {
        let mut rows = self.rows.lock().await;

        let Some(index) = rows.iter().position(|m| m.id == id && m.is_open_at(now)) else {
            return Ok(GuardedWrite::Stale);
        };

        let request_id = rows[index].request_id;
        if to == MatchStatus::Accepted
            && rows
                .iter()
                .any(|m| m.request_id == request_id && m.status == MatchStatus::Accepted)
        {
            return Ok(GuardedWrite::AcceptedElsewhere);
        }

        rows[index].status = to;
        Ok(GuardedWrite::Applied(rows[index].clone()))
    }
}

#[async_trait]
impl MatchLedger for InMemoryMatchLedger {
    async fn find_by_id(&self, id: MatchId) -> Result<Option<Match>> {
        Ok(self.rows.lock().await.iter().find(|m| m.id == id).cloned())
    }

    async fn find_by_request(&self, request_id: RequestId) -> Result<Vec<Match>> {
        Ok(self
            .rows
            .lock()
            .await
            .iter()
            .filter(|m| m.request_id == request_id)
            .cloned()
            .collect())
    }

    async fn find_accepted(&self, request_id: RequestId) -> Result<Option<Match>> {
        Ok(self
            .rows
            .lock()
            .await
            .iter()
            .find(|m| m.request_id == request_id && m.status == MatchStatus::Accepted)
            .cloned())
    }

    async fn offered_professionals(&self, request_id: RequestId) -> Result<HashSet<ProfessionalId>> {
        Ok(self
            .rows
            .lock()
            .await
            .iter()
            .filter(|m| m.request_id == request_id)
            .map(|m| m.professional_id)
            .collect())
    }

    async fn create_offer(
        &self,
        request_id: RequestId,
        professional_id: ProfessionalId,
        expires_at: DateTime<Utc>,
    ) -> Result<OfferInsert> {
        let mut rows = self.rows.lock().await;

        if rows
            .iter()
            .any(|m| m.request_id == request_id && m.professional_id == professional_id)
        {
            return Ok(OfferInsert::AlreadyOffered);
        }

        let offer = Match::new_waiting(request_id, professional_id, expires_at);
        rows.push(offer.clone());
        Ok(OfferInsert::Created(offer))
    }

    async fn accept(&self, id: MatchId, now: DateTime<Utc>) -> Result<GuardedWrite> {
        self.close_waiting(id, MatchStatus::Accepted, now).await
    }

    async fn reject(&self, id: MatchId, now: DateTime<Utc>) -> Result<GuardedWrite> {
        self.close_waiting(id, MatchStatus::Rejected, now).await
    }

    async fn withdraw(&self, id: MatchId) -> Result<bool> {
        let mut rows = self.rows.lock().await;
        match rows.iter_mut().find(|m| m.id == id && m.status.is_waiting()) {
            Some(row) => {
                row.status = MatchStatus::Expired;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn expire_others(&self, request_id: RequestId, keep: MatchId) -> Result<u64> {
        let mut changed = 0;
        for row in self.rows.lock().await.iter_mut() {
            if row.request_id == request_id && row.id != keep && row.status.is_waiting() {
                row.status = MatchStatus::Expired;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Match>> {
        let mut expired = Vec::new();
        for row in self.rows.lock().await.iter_mut() {
            if row.is_overdue_at(now) {
                row.status = MatchStatus::Expired;
                expired.push(row.clone());
            }
        }
        Ok(expired)
    }
}

// =============================================================================
// In-memory Professional Directory
// =============================================================================

/// Professional as registered in the in-memory directory
#[derive(Debug, Clone)]
pub struct TestProfessional {
    pub id: ProfessionalId,
    pub name: String,
    pub email: Option<String>,
    pub push_token: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub active: bool,
}

impl TestProfessional {
    /// Active professional reachable on both channels
    pub fn at(name: &str, latitude: f64, longitude: f64) -> Self {
        let slug = name.to_lowercase().replace(' ', ".");
        Self {
            id: ProfessionalId::new(),
            name: name.to_string(),
            email: Some(format!("{}@example.com", slug)),
            push_token: Some(format!("ExponentPushToken[{}]", slug)),
            latitude,
            longitude,
            active: true,
        }
    }
}

#[derive(Default)]
pub struct InMemoryDirectory {
    professionals: Mutex<Vec<TestProfessional>>,
    fail: AtomicBool,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, professional: TestProfessional) -> ProfessionalId {
        let id = professional.id;
        self.professionals.lock().await.push(professional);
        id
    }

    /// Make every lookup return an error
    pub fn fail_lookups(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProfessionalDirectory for InMemoryDirectory {
    async fn find_nearby(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    ) -> Result<Vec<Candidate>> {
        if self.fail.load(Ordering::SeqCst) {
            bail!("directory unavailable");
        }

        let mut candidates: Vec<Candidate> = self
            .professionals
            .lock()
            .await
            .iter()
            .filter(|p| p.active)
            .map(|p| Candidate {
                professional_id: p.id,
                name: p.name.clone(),
                distance_km: calculate_distance_km(latitude, longitude, p.latitude, p.longitude),
                email: p.email.clone(),
                push_token: p.push_token.clone(),
            })
            .filter(|c| c.distance_km <= radius_km)
            .collect();

        candidates.sort_by(|a, b| {
            a.distance_km
                .total_cmp(&b.distance_km)
                .then_with(|| a.professional_id.cmp(&b.professional_id))
        });

        Ok(candidates)
    }
}

// =============================================================================
// Mock Geocoder
// =============================================================================

pub struct MockGeocoder {
    location: Mutex<Option<GeocodedLocation>>,
    calls: Mutex<Vec<String>>,
}

impl MockGeocoder {
    /// Resolves every address to Shibuya
    pub fn new() -> Self {
        Self::resolving_to(SHIBUYA.0, SHIBUYA.1)
    }

    pub fn resolving_to(latitude: f64, longitude: f64) -> Self {
        Self {
            location: Mutex::new(Some(GeocodedLocation {
                latitude,
                longitude,
                display_name: "Mock location".to_string(),
            })),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every address fails to resolve
    pub fn failing() -> Self {
        Self {
            location: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Addresses passed to `geocode`
    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }
}

impl Default for MockGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseGeocoder for MockGeocoder {
    async fn geocode(&self, address: &str) -> Result<GeocodedLocation> {
        self.calls.lock().await.push(address.to_string());
        self.location
            .lock()
            .await
            .clone()
            .ok_or_else(|| anyhow!("No geocoding results for address: {}", address))
    }
}

// =============================================================================
// Mock Email Service
// =============================================================================

#[derive(Default)]
pub struct MockEmailService {
    sent: Mutex<Vec<EmailMessage>>,
    fail: AtomicBool,
}

impl MockEmailService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Emails accepted for delivery
    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl BaseEmailService for MockEmailService {
    async fn send_email(&self, message: &EmailMessage) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            bail!("email provider unavailable");
        }
        self.sent.lock().await.push(message.clone());
        Ok(())
    }
}

// =============================================================================
// Mock Push Notification Service
// =============================================================================

/// A push notification captured by the mock
#[derive(Debug, Clone)]
pub struct SentPush {
    pub push_token: String,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}

#[derive(Default)]
pub struct MockPushNotificationService {
    sent: Mutex<Vec<SentPush>>,
    fail: AtomicBool,
}

impl MockPushNotificationService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Notifications accepted for delivery
    pub async fn sent(&self) -> Vec<SentPush> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl BasePushNotificationService for MockPushNotificationService {
    async fn send_notification(
        &self,
        push_token: &str,
        title: &str,
        body: &str,
        data: serde_json::Value,
    ) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            bail!("push provider unavailable");
        }
        self.sent.lock().await.push(SentPush {
            push_token: push_token.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            data,
        });
        Ok(())
    }
}

// =============================================================================
// TestDependencies
// =============================================================================

/// Handles to every in-memory store and mock, plus the `ServerDeps` wired from them
pub struct TestDependencies {
    pub requests: Arc<InMemoryRequestStore>,
    pub matches: Arc<InMemoryMatchLedger>,
    pub directory: Arc<InMemoryDirectory>,
    pub geocoder: Arc<MockGeocoder>,
    pub email: Arc<MockEmailService>,
    pub push: Arc<MockPushNotificationService>,
    pub default_radius_km: f64,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            requests: Arc::new(InMemoryRequestStore::new()),
            matches: Arc::new(InMemoryMatchLedger::new()),
            directory: Arc::new(InMemoryDirectory::new()),
            geocoder: Arc::new(MockGeocoder::new()),
            email: Arc::new(MockEmailService::new()),
            push: Arc::new(MockPushNotificationService::new()),
            default_radius_km: DEFAULT_SEARCH_RADIUS_KM,
        }
    }

    /// Set a mock geocoder
    pub fn mock_geocoder(mut self, geocoder: MockGeocoder) -> Self {
        self.geocoder = Arc::new(geocoder);
        self
    }

    /// Radius used by engine paths that pick the default (reject, sweep, intake)
    pub fn with_default_radius(mut self, radius_km: f64) -> Self {
        self.default_radius_km = radius_km;
        self
    }

    /// Three professionals around Shibuya: ~2km, ~10km and ~80km north
    pub async fn with_shibuya_professionals(self) -> Self {
        let (lat, lng) = SHIBUYA;
        self.directory
            .add(TestProfessional::at("Kenji Sato", lat + 0.018, lng))
            .await;
        self.directory
            .add(TestProfessional::at("Mei Suzuki", lat + 0.09, lng))
            .await;
        self.directory
            .add(TestProfessional::at("Haruto Ito", lat + 0.72, lng))
            .await;
        self
    }

    /// Insert a request directly, bypassing intake
    pub async fn insert_request(&self, request: NewServiceRequest) -> ServiceRequest {
        let row = request.into_request();
        self.requests.rows.lock().await.push(row.clone());
        row
    }

    /// Build ServerDeps backed by these stores and mocks
    pub fn server_deps(&self) -> ServerDeps {
        let settings = MatchingSettings::builder()
            .default_radius_km(self.default_radius_km)
            .public_base_url("http://localhost:8080")
            .build();

        ServerDeps::new(
            self.requests.clone(),
            self.matches.clone(),
            self.directory.clone(),
            self.geocoder.clone(),
            self.email.clone(),
            self.push.clone(),
            settings,
        )
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_directory_orders_by_distance_and_respects_radius() {
        let deps = TestDependencies::new().with_shibuya_professionals().await;

        let nearby = deps
            .directory
            .find_nearby(SHIBUYA.0, SHIBUYA.1, 50.0)
            .await
            .unwrap();

        let names: Vec<_> = nearby.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Kenji Sato", "Mei Suzuki"]);
        assert!((nearby[0].distance_km - 2.0).abs() < 0.1);
        assert!((nearby[1].distance_km - 10.0).abs() < 0.2);
    }

    #[tokio::test]
    async fn test_ledger_guards_match_postgres() {
        let ledger = InMemoryMatchLedger::new();
        let request_id = RequestId::new();
        let pro = ProfessionalId::new();
        let now = Utc::now();

        let OfferInsert::Created(first) = ledger
            .create_offer(request_id, pro, now + chrono::Duration::minutes(7))
            .await
            .unwrap()
        else {
            panic!("first insert must succeed");
        };
        assert!(matches!(
            ledger
                .create_offer(request_id, pro, now + chrono::Duration::minutes(7))
                .await
                .unwrap(),
            OfferInsert::AlreadyOffered
        ));

        let OfferInsert::Created(second) = ledger
            .create_offer(request_id, ProfessionalId::new(), now + chrono::Duration::minutes(7))
            .await
            .unwrap()
        else {
            panic!("second professional must be offered");
        };

        assert!(matches!(
            ledger.accept(first.id, now).await.unwrap(),
            GuardedWrite::Applied(_)
        ));
        assert!(matches!(
            ledger.accept(second.id, now).await.unwrap(),
            GuardedWrite::AcceptedElsewhere
        ));
        assert!(matches!(
            ledger.reject(first.id, now).await.unwrap(),
            GuardedWrite::Stale
        ));
    }
}
