use async_trait::async_trait;

use crate::error::Result;
use crate::types::PageRequest;
use crate::types::PageResponse;

/// Source of row windows for a [`PaginationStore`](crate::PaginationStore).
///
/// Implementations return [`PaginationError::Disabled`](crate::PaginationError::Disabled)
/// when the request cannot be served yet (for example before a run is
/// chosen); the store turns that into an empty, exhausted page.
#[async_trait]
pub trait RowWindowFetcher: Send + Sync {
    async fn fetch_page(&self, request: PageRequest) -> Result<PageResponse>;
}
