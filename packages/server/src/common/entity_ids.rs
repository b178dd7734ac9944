//! Typed ID definitions for the matching domain entities.

pub use super::id::Id;

// ============================================================================
// Entity marker types
// ============================================================================

/// Marker type for customer service requests.
pub struct ServiceRequest;

/// Marker type for offers (matches) extended to a professional.
pub struct Offer;

/// Marker type for professionals in the directory.
pub struct Professional;

// ============================================================================
// Type aliases - the primary API
// ============================================================================

pub type RequestId = Id<ServiceRequest>;

pub type MatchId = Id<Offer>;

pub type ProfessionalId = Id<Professional>;
