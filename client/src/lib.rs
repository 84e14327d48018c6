//! `reqwest` clients for the playground backend.
//!
//! [`HttpPlaygroundApi`] backs the variant cache in `playground-state` and
//! [`HttpScenarioRowsFetcher`] feeds the scenario table in
//! `playground-pagination`. Both read their endpoint, project and timeout
//! from [`PlaygroundConfig`].

#![deny(clippy::print_stdout, clippy::print_stderr)]

mod error;
mod http;
mod scenarios;
mod variants;

use std::sync::Arc;

use playground_pagination::PaginationRegistry;
use playground_pagination::StoreOptions;
use playground_state::Playground;
use playground_state::PlaygroundConfig;

pub use error::ClientError;
pub use scenarios::HttpScenarioRowsFetcher;
pub use variants::HttpPlaygroundApi;

/// A [`Playground`] talking to the configured backend.
pub fn connect_playground(config: &PlaygroundConfig) -> Result<Playground, ClientError> {
    let api = HttpPlaygroundApi::new(&config.api)?;
    Ok(Playground::new(Arc::new(api), config.clone()))
}

/// Scenario pagination stores sized by `pagination.page_size`.
pub fn scenario_registry(config: &PlaygroundConfig) -> Result<PaginationRegistry, ClientError> {
    let fetcher = HttpScenarioRowsFetcher::new(&config.api)?;
    Ok(PaginationRegistry::new(
        Arc::new(fetcher),
        StoreOptions {
            page_size: config.pagination.page_size,
        },
    ))
}
