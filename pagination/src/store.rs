use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use tokio::sync::watch;
use tracing::debug;
use tracing::warn;

use crate::error::PaginationError;
use crate::error::Result;
use crate::fetcher::RowWindowFetcher;
use crate::types::PageMeta;
use crate::types::PageRequest;
use crate::types::PageResponse;
use crate::types::PreviewTableRow;
use crate::types::Windowing;

pub const DEFAULT_PAGE_SIZE: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagePhase {
    /// Nothing loaded yet.
    Empty,
    /// First page in flight.
    Loading,
    /// Some pages loaded and the server reported more.
    Partial,
    /// The server reported no more rows.
    Complete,
}

/// What a [`PaginationStore::load_next_page`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { total_rows: usize, has_more: bool },
    /// A request is already in flight or the scope is exhausted.
    Skipped,
    /// Scope id or project id missing; nothing was requested.
    Disabled,
    /// The scope was reset while the page was in flight.
    Superseded,
}

/// Read-only view of one scope.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeSnapshot {
    pub phase: PagePhase,
    pub rows: Vec<PreviewTableRow>,
    pub total_count: Option<usize>,
    pub has_more: bool,
    pub is_fetching: bool,
    pub last_error: Option<PaginationError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    pub page_size: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug)]
struct Page {
    offset: usize,
    rows: Vec<PreviewTableRow>,
}

#[derive(Debug)]
struct ScopeState {
    generation: u64,
    phase: PagePhase,
    pages: Vec<Page>,
    in_flight: bool,
    next_cursor: Option<String>,
    next_offset: usize,
    next_windowing: Option<Windowing>,
    total_count: Option<usize>,
    has_more: bool,
    last_error: Option<PaginationError>,
}

impl ScopeState {
    fn new(generation: u64) -> Self {
        Self {
            generation,
            phase: PagePhase::Empty,
            pages: Vec::new(),
            in_flight: false,
            next_cursor: None,
            next_offset: 0,
            next_windowing: None,
            total_count: None,
            has_more: true,
            last_error: None,
        }
    }

    fn can_load(&self) -> bool {
        !self.in_flight && matches!(self.phase, PagePhase::Empty | PagePhase::Partial)
    }

    fn combined_rows(&self) -> Vec<PreviewTableRow> {
        self.pages
            .iter()
            .flat_map(|page| page.rows.iter().cloned())
            .collect()
    }

    fn row_count(&self) -> usize {
        self.pages.iter().map(|page| page.rows.len()).sum()
    }

    fn snapshot(&self) -> ScopeSnapshot {
        ScopeSnapshot {
            phase: self.phase,
            rows: self.combined_rows(),
            total_count: self.total_count,
            has_more: self.has_more,
            is_fetching: self.in_flight,
            last_error: self.last_error.clone(),
        }
    }

    /// Merge a resolved page into the skeleton page at `offset`.
    fn apply_page(&mut self, offset: usize, response: PageResponse) -> LoadOutcome {
        let returned = response.rows.len();
        let now_empty = match self.pages.last_mut() {
            Some(page) if page.offset == offset => {
                let filled = returned.min(page.rows.len());
                for (slot, record) in page.rows.iter_mut().zip(response.rows) {
                    slot.merge(record);
                }
                page.rows.truncate(filled);
                page.rows.is_empty()
            }
            _ => false,
        };
        if now_empty {
            self.pages.pop();
        }

        self.next_offset = response.next_offset.unwrap_or(offset + returned);
        self.next_cursor = response.next_cursor;
        self.next_windowing = response.next_windowing;
        if response.total_count.is_some() {
            self.total_count = response.total_count;
        }
        // An empty page that claims more would be requested forever.
        self.has_more = response.has_more && returned > 0;
        self.phase = if self.has_more {
            PagePhase::Partial
        } else {
            PagePhase::Complete
        };
        self.in_flight = false;
        self.last_error = None;

        LoadOutcome::Loaded {
            total_rows: self.row_count(),
            has_more: self.has_more,
        }
    }

    /// Drop the skeleton page at `offset` and go back to `phase`.
    fn abandon_page(&mut self, offset: usize, phase: PagePhase, error: PaginationError) {
        if self.pages.last().is_some_and(|page| page.offset == offset) {
            self.pages.pop();
        }
        self.phase = phase;
        self.in_flight = false;
        self.last_error = Some(error);
    }
}

/// Pages of table rows for every scope under one store key.
///
/// `load_next_page` puts a full page of skeleton rows in place before the
/// request goes out, then fills those same slots when it resolves. Rows never
/// change position once they have a slot.
pub struct PaginationStore {
    store_key: String,
    fetcher: Arc<dyn RowWindowFetcher>,
    page_size: usize,
    scopes: Mutex<HashMap<String, ScopeState>>,
    revision: watch::Sender<u64>,
}

impl PaginationStore {
    pub fn new(
        store_key: impl Into<String>,
        fetcher: Arc<dyn RowWindowFetcher>,
        options: StoreOptions,
    ) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            store_key: store_key.into(),
            fetcher,
            page_size: options.page_size.max(1),
            scopes: Mutex::new(HashMap::new()),
            revision,
        }
    }

    pub fn store_key(&self) -> &str {
        &self.store_key
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    fn scopes(&self) -> MutexGuard<'_, HashMap<String, ScopeState>> {
        self.scopes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }

    /// Revision counter that ticks on every visible change to any scope.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Request the next page for `scope_id`.
    ///
    /// A missing scope id or project id is not an error: the call returns
    /// [`LoadOutcome::Disabled`] and the scope stays empty. A failed fetch
    /// removes the skeleton page, keeps the scope's previous phase, and is
    /// recorded as the scope's `last_error`.
    pub async fn load_next_page(
        &self,
        scope_id: Option<&str>,
        meta: &PageMeta,
    ) -> Result<LoadOutcome> {
        let Some(scope_id) = scope_id.filter(|id| !id.is_empty()) else {
            debug!(store_key = %self.store_key, "no scope id, pagination disabled");
            return Ok(LoadOutcome::Disabled);
        };
        if meta.project_id.as_deref().is_none_or(str::is_empty) {
            debug!(store_key = %self.store_key, scope_id, "no project id, pagination disabled");
            return Ok(LoadOutcome::Disabled);
        }

        let (request, generation, previous_phase) = {
            let mut scopes = self.scopes();
            let state = scopes
                .entry(scope_id.to_string())
                .or_insert_with(|| ScopeState::new(0));
            if !state.can_load() {
                return Ok(LoadOutcome::Skipped);
            }

            let offset = state.next_offset;
            state.pages.push(Page {
                offset,
                rows: (0..self.page_size)
                    .map(|index| PreviewTableRow::skeleton(scope_id, offset, index))
                    .collect(),
            });
            state.in_flight = true;
            let previous_phase = state.phase;
            if previous_phase == PagePhase::Empty {
                state.phase = PagePhase::Loading;
            }

            let request = PageRequest {
                scope_id: scope_id.to_string(),
                cursor: state.next_cursor.clone(),
                limit: self.page_size,
                offset,
                windowing: state.next_windowing.clone(),
                meta: meta.clone(),
            };
            (request, state.generation, previous_phase)
        };
        self.bump();

        let offset = request.offset;
        debug!(store_key = %self.store_key, scope_id, offset, "requesting page");
        let result = match self.fetcher.fetch_page(request).await {
            Err(err) if err.is_disabled() => {
                debug!(
                    store_key = %self.store_key,
                    scope_id,
                    error = %err,
                    "fetcher disabled, treating as empty page"
                );
                Ok(PageResponse::empty())
            }
            other => other,
        };

        let outcome = {
            let mut scopes = self.scopes();
            let Some(state) = scopes
                .get_mut(scope_id)
                .filter(|state| state.generation == generation)
            else {
                debug!(
                    store_key = %self.store_key,
                    scope_id,
                    offset,
                    "scope reset while page was in flight"
                );
                return Ok(LoadOutcome::Superseded);
            };
            match result {
                Ok(response) => Ok(state.apply_page(offset, response)),
                Err(err) => {
                    warn!(
                        store_key = %self.store_key,
                        scope_id,
                        offset,
                        error = %err,
                        "page fetch failed"
                    );
                    state.abandon_page(offset, previous_phase, err.clone());
                    Err(err)
                }
            }
        };
        self.bump();
        outcome
    }

    /// All rows of the scope in slot order, skeletons included.
    pub fn combined_rows(&self, scope_id: &str) -> Vec<PreviewTableRow> {
        self.scopes()
            .get(scope_id)
            .map(ScopeState::combined_rows)
            .unwrap_or_default()
    }

    pub fn snapshot(&self, scope_id: &str) -> Option<ScopeSnapshot> {
        self.scopes().get(scope_id).map(ScopeState::snapshot)
    }

    pub fn phase(&self, scope_id: &str) -> PagePhase {
        self.scopes()
            .get(scope_id)
            .map_or(PagePhase::Empty, |state| state.phase)
    }

    /// Forget every page of `scope_id`. A page still in flight for the old
    /// generation is discarded when it resolves.
    pub fn reset(&self, scope_id: &str) {
        {
            let mut scopes = self.scopes();
            let Some(state) = scopes.get_mut(scope_id) else {
                return;
            };
            *state = ScopeState::new(state.generation + 1);
        }
        debug!(store_key = %self.store_key, scope_id, "scope reset");
        self.bump();
    }
}

/// One [`PaginationStore`] per store key, sharing a fetcher.
pub struct PaginationRegistry {
    fetcher: Arc<dyn RowWindowFetcher>,
    options: StoreOptions,
    stores: Mutex<HashMap<String, Arc<PaginationStore>>>,
}

impl PaginationRegistry {
    pub fn new(fetcher: Arc<dyn RowWindowFetcher>, options: StoreOptions) -> Self {
        Self {
            fetcher,
            options,
            stores: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self, store_key: &str) -> Arc<PaginationStore> {
        let mut stores = self.stores.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(stores.entry(store_key.to_string()).or_insert_with(|| {
            Arc::new(PaginationStore::new(
                store_key,
                Arc::clone(&self.fetcher),
                self.options,
            ))
        }))
    }
}
