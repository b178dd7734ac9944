use serde::Serialize;

use crate::common::ProfessionalId;

/// Professional eligible for an offer, as returned by the directory's
/// radius query
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Candidate {
    pub professional_id: ProfessionalId,
    pub name: String,
    /// Distance from the request location in kilometres
    pub distance_km: f64,
    pub email: Option<String>,
    pub push_token: Option<String>,
}

impl Candidate {
    /// Email address, if the professional has a usable one
    pub fn email_address(&self) -> Option<&str> {
        self.email.as_deref().map(str::trim).filter(|e| !e.is_empty())
    }

    /// Push token, if the professional registered a device
    pub fn push_identity(&self) -> Option<&str> {
        self.push_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}
