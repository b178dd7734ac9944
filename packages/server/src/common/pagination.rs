//! Cursor-based pagination for list endpoints.
//!
//! Lists are ordered newest first by their UUID v7 id, so a cursor is just
//! the id of the last item seen, base64-encoded so clients treat it as opaque.
//!
//! ```rust,ignore
//! let page = PageArgs { first: Some(10), after: None }.validate()?;
//! let rows = deps.requests.find_page(&page).await?;   // fetches limit + 1
//! let (rows, has_more) = trim_results(rows, page.limit);
//! let connection = Connection::build(rows, has_more, |r| r.id.into_uuid());
//! ```

use anyhow::{Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: i64 = 25;
pub const MAX_PAGE_SIZE: i64 = 100;

// ============================================================================
// Cursor
// ============================================================================

/// Opaque cursor (base64-encoded UUID).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor(Uuid);

impl Cursor {
    pub fn new(id: Uuid) -> Self {
        Cursor(id)
    }

    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0.as_bytes())
    }

    pub fn decode(s: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(s)
            .context("Invalid cursor: not valid base64")?;
        let uuid = Uuid::from_slice(&bytes).context("Invalid cursor: not a valid UUID")?;
        Ok(Cursor(uuid))
    }

    pub fn into_uuid(self) -> Uuid {
        self.0
    }
}

// ============================================================================
// Arguments
// ============================================================================

/// Page request as it arrives on the query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageArgs {
    /// Number of items to return (default 25, clamped to 1-100).
    pub first: Option<i64>,
    /// Return items older than this cursor.
    pub after: Option<String>,
}

impl PageArgs {
    pub fn validate(&self) -> Result<ValidatedPage, &'static str> {
        let limit = self.first.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);

        let cursor = self
            .after
            .as_deref()
            .map(Cursor::decode)
            .transpose()
            .map_err(|_| "Invalid cursor")?
            .map(Cursor::into_uuid);

        Ok(ValidatedPage { limit, cursor })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedPage {
    pub limit: i64,
    pub cursor: Option<Uuid>,
}

impl ValidatedPage {
    /// SQL LIMIT value (limit + 1 to detect a following page).
    pub fn fetch_limit(&self) -> i64 {
        self.limit + 1
    }
}

// ============================================================================
// Connection
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Connection<T> {
    pub nodes: Vec<T>,
    pub page_info: PageInfo,
}

impl<T> Connection<T> {
    /// Build a connection from an already-trimmed page.
    pub fn build(nodes: Vec<T>, has_more: bool, id_of: impl Fn(&T) -> Uuid) -> Self {
        let end_cursor = nodes.last().map(|n| Cursor::new(id_of(n)).encode());
        Connection {
            nodes,
            page_info: PageInfo {
                has_next_page: has_more,
                end_cursor,
            },
        }
    }
}

/// Trim results fetched with `fetch_limit()` and report whether more exist.
pub fn trim_results<T>(mut results: Vec<T>, limit: i64) -> (Vec<T>, bool) {
    let limit = usize::try_from(limit).unwrap_or(0);
    let has_more = results.len() > limit;
    results.truncate(limit);
    (results, has_more)
}
