use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::common::RequestId;

/// Prefix of the note line that carries the plan title, e.g. `Plan: Family portraits`
const PLAN_PREFIX: &str = "plan:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "request_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    #[default]
    Pending,
    /// Terminal: a professional accepted
    Matched,
}

impl RequestStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, RequestStatus::Pending)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestStatus::Pending => write!(f, "pending"),
            RequestStatus::Matched => write!(f, "matched"),
        }
    }
}

/// A customer's service order
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ServiceRequest {
    pub id: RequestId,
    pub created_at: DateTime<Utc>,
    pub client_name: String,
    pub client_email: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub note: Option<String>,
    pub status: RequestStatus,
}

impl ServiceRequest {
    pub fn is_pending(&self) -> bool {
        self.status.is_pending()
    }

    pub fn plan_label(&self) -> Option<String> {
        extract_plan_label(self.note.as_deref())
    }
}

/// Validated, geocoded request ready to be persisted
#[derive(Debug, Clone, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct NewServiceRequest {
    pub client_name: String,
    pub client_email: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    #[builder(default)]
    pub note: Option<String>,
}

impl NewServiceRequest {
    /// Materialize the row as it will be stored (status `pending`).
    pub fn into_request(self) -> ServiceRequest {
        ServiceRequest {
            id: RequestId::new(),
            created_at: Utc::now(),
            client_name: self.client_name,
            client_email: self.client_email,
            address: self.address,
            latitude: self.latitude,
            longitude: self.longitude,
            note: self.note,
            status: RequestStatus::Pending,
        }
    }
}

/// Customer dashboard row
#[derive(Debug, Clone, Serialize)]
pub struct RequestSummary {
    pub id: RequestId,
    pub created_at: DateTime<Utc>,
    pub status: RequestStatus,
    pub plan: Option<String>,
}

impl From<ServiceRequest> for RequestSummary {
    fn from(request: ServiceRequest) -> Self {
        let plan = request.plan_label();
        Self {
            id: request.id,
            created_at: request.created_at,
            status: request.status,
            plan,
        }
    }
}

/// Admin dashboard row
#[derive(Debug, Clone, Serialize)]
pub struct AdminRequestRow {
    pub id: RequestId,
    pub created_at: DateTime<Utc>,
    pub client_name: String,
    pub client_email: String,
    pub address: String,
    pub status: RequestStatus,
    pub plan: Option<String>,
}

impl From<ServiceRequest> for AdminRequestRow {
    fn from(request: ServiceRequest) -> Self {
        let plan = request.plan_label();
        Self {
            id: request.id,
            created_at: request.created_at,
            client_name: request.client_name,
            client_email: request.client_email,
            address: request.address,
            status: request.status,
            plan,
        }
    }
}

/// Find the `Plan: <title>` line in a note, if any.
pub fn extract_plan_label(note: Option<&str>) -> Option<String> {
    note?.lines().find_map(|line| {
        let line = line.trim();
        let head = line.get(..PLAN_PREFIX.len())?;
        if !head.eq_ignore_ascii_case(PLAN_PREFIX) {
            return None;
        }
        let title = line[PLAN_PREFIX.len()..].trim();
        (!title.is_empty()).then(|| title.to_string())
    })
}

/// Fold an optional plan title into the note as its first line.
pub fn compose_note(plan: Option<&str>, note: Option<&str>) -> Option<String> {
    let plan = plan.map(str::trim).filter(|p| !p.is_empty());
    let note = note.map(str::trim).filter(|n| !n.is_empty());

    match (plan, note) {
        (Some(plan), Some(note)) => Some(format!("Plan: {}\n{}", plan, note)),
        (Some(plan), None) => Some(format!("Plan: {}", plan)),
        (None, Some(note)) => Some(note.to_string()),
        (None, None) => None,
    }
}
