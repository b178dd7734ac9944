use anyhow::Result;

use crate::common::RequestId;
use crate::domains::matching::models::Match;
use crate::kernel::ServerDeps;

/// Every offer made for a request, oldest first. `None` if the request does not exist.
pub async fn offer_history(request_id: RequestId, deps: &ServerDeps) -> Result<Option<Vec<Match>>> {
    if deps.requests.find_by_id(request_id).await?.is_none() {
        return Ok(None);
    }

    let offers = deps.matches.find_by_request(request_id).await?;
    Ok(Some(offers))
}
