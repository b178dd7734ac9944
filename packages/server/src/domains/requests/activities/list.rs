use anyhow::Result;

use crate::common::pagination::{trim_results, Connection, ValidatedPage};
use crate::domains::requests::models::{AdminRequestRow, RequestSummary};
use crate::kernel::ServerDeps;

/// Customer dashboard: the client's requests, newest first.
pub async fn list_for_client(client_email: &str, deps: &ServerDeps) -> Result<Vec<RequestSummary>> {
    let rows = deps.requests.find_by_client_email(client_email).await?;
    Ok(rows.into_iter().map(RequestSummary::from).collect())
}

/// Admin dashboard: every request, newest first, one cursor page at a time.
pub async fn list_all(page: &ValidatedPage, deps: &ServerDeps) -> Result<Connection<AdminRequestRow>> {
    let rows = deps.requests.find_page(page).await?;
    let (rows, has_more) = trim_results(rows, page.limit);

    let nodes = rows.into_iter().map(AdminRequestRow::from).collect();
    Ok(Connection::build(nodes, has_more, |row: &AdminRequestRow| {
        row.id.into_uuid()
    }))
}
