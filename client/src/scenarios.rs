use async_trait::async_trait;
use playground_pagination::PageRequest;
use playground_pagination::PageResponse;
use playground_pagination::PaginationError;
use playground_pagination::RowWindowFetcher;
use playground_pagination::ScenarioRecord;
use playground_pagination::Windowing;
use playground_state::config::ApiConfig;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::error::ClientError;
use crate::http::Backend;
use crate::http::json;
use crate::http::send;

const SCENARIO_QUERY_PATH: &str = "/api/preview/evaluations/scenarios/query";

#[derive(Debug, Serialize)]
struct ScenarioFilter<'a> {
    run_ids: [&'a str; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct ScenarioQuery<'a> {
    scenario: ScenarioFilter<'a>,
    windowing: Windowing,
}

#[derive(Debug, Deserialize)]
struct ScenarioQueryResponse {
    #[serde(default)]
    scenarios: Vec<ScenarioRecord>,
    #[serde(default)]
    windowing: Option<Windowing>,
}

/// Builds the windowing sent with a page request: the previous page's
/// windowing, advanced to `cursor` and capped at `limit`.
fn request_windowing(request: &PageRequest) -> Windowing {
    let mut windowing = request.windowing.clone().unwrap_or_default();
    windowing.next = request.cursor.clone();
    windowing.limit = Some(request.limit);
    windowing
}

fn into_page(request: &PageRequest, response: ScenarioQueryResponse) -> PageResponse {
    let returned = response.scenarios.len();
    let next_cursor = response
        .windowing
        .as_ref()
        .and_then(|windowing| windowing.next.clone());
    let has_more = next_cursor.is_some() && returned > 0;
    PageResponse {
        rows: response.scenarios,
        total_count: (!has_more).then_some(request.offset + returned),
        has_more,
        next_cursor,
        next_offset: Some(request.offset + returned),
        next_windowing: response.windowing,
    }
}

/// [`RowWindowFetcher`] for evaluation scenarios of one run. The scope id is
/// the run id.
#[derive(Debug, Clone)]
pub struct HttpScenarioRowsFetcher {
    backend: Backend,
}

impl HttpScenarioRowsFetcher {
    pub fn new(config: &ApiConfig) -> Result<Self, ClientError> {
        Ok(Self {
            backend: Backend::new(config)?,
        })
    }
}

#[async_trait]
impl RowWindowFetcher for HttpScenarioRowsFetcher {
    async fn fetch_page(&self, request: PageRequest) -> Result<PageResponse, PaginationError> {
        let Some(project_id) = request.project_id().or(self.backend.project_id()) else {
            return Err(PaginationError::disabled("no project id"));
        };
        if request.scope_id.is_empty() {
            return Err(PaginationError::disabled("no run id"));
        }

        let body = ScenarioQuery {
            scenario: ScenarioFilter {
                run_ids: [request.scope_id.as_str()],
                status: request.meta.status.as_deref(),
            },
            windowing: request_windowing(&request),
        };
        debug!(
            scope_id = %request.scope_id,
            offset = request.offset,
            limit = request.limit,
            "querying scenarios"
        );
        let http = self
            .backend
            .client()
            .post(self.backend.url(SCENARIO_QUERY_PATH))
            .query(&[("project_id", project_id)])
            .json(&body);
        let response: ScenarioQueryResponse = json(send(http).await?).await?;
        Ok(into_page(&request, response))
    }
}
