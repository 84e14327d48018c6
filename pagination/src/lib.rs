//! Windowed pagination for evaluation-scenario tables.
//!
//! Each `(store key, scope id)` pair walks `Empty -> Loading -> Partial ->
//! Complete`. Pages are rendered as skeleton rows before the fetch resolves
//! and filled in place afterwards, so row keys stay stable across the merge.

#![deny(clippy::print_stdout, clippy::print_stderr)]

mod error;
mod fetcher;
mod store;
mod types;

pub use error::PaginationError;
pub use error::Result;
pub use fetcher::RowWindowFetcher;
pub use store::DEFAULT_PAGE_SIZE;
pub use store::LoadOutcome;
pub use store::PagePhase;
pub use store::PaginationRegistry;
pub use store::PaginationStore;
pub use store::ScopeSnapshot;
pub use store::StoreOptions;
pub use types::PageMeta;
pub use types::PageRequest;
pub use types::PageResponse;
pub use types::PreviewTableRow;
pub use types::ScenarioRecord;
pub use types::Windowing;
pub use types::skeleton_key;
