use playground_state::config::ApiConfig;
use reqwest::Client;
use reqwest::RequestBuilder;
use reqwest::Response;
use reqwest::Url;
use serde::de::DeserializeOwned;

use crate::error::ClientError;
use crate::error::RequestError;

/// Shared HTTP plumbing: one `reqwest` client, the backend base URL and the
/// project every request is scoped to.
#[derive(Debug, Clone)]
pub(crate) struct Backend {
    client: Client,
    base_url: String,
    project_id: Option<String>,
}

impl Backend {
    pub(crate) fn new(config: &ApiConfig) -> Result<Self, ClientError> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        if Url::parse(&base_url).is_err() {
            return Err(ClientError::BaseUrl { url: base_url });
        }
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            base_url,
            project_id: config.project_id.clone().filter(|id| !id.is_empty()),
        })
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    pub(crate) fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Attach `project_id` when the backend is scoped to one.
    pub(crate) fn scoped(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.project_id {
            Some(project_id) => request.query(&[("project_id", project_id)]),
            None => request,
        }
    }
}

/// Send `request`, treating any non-2xx status as a failure.
pub(crate) async fn send(request: RequestBuilder) -> Result<Response, RequestError> {
    let response = request.send().await.map_err(RequestError::Transport)?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(RequestError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

pub(crate) async fn json<T: DeserializeOwned>(response: Response) -> Result<T, RequestError> {
    let bytes = response.bytes().await.map_err(RequestError::Transport)?;
    serde_json::from_slice(&bytes).map_err(|e| RequestError::Decode(e.to_string()))
}
