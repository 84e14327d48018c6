use async_trait::async_trait;
use playground_state::ApiError;
use playground_state::PlaygroundApi;
use playground_state::RawVariant;
use playground_state::ResourceKey;
use playground_state::VariantId;
use playground_state::config::ApiConfig;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::ClientError;
use crate::http::Backend;
use crate::http::json;
use crate::http::send;

#[derive(Debug, Serialize)]
struct CreateFromBaseRequest<'a> {
    base_id: &'a str,
    new_variant_name: &'a str,
    new_config_name: &'a str,
    parameters: Value,
}

#[derive(Debug, Serialize)]
struct SaveParametersRequest<'a> {
    parameters: &'a Value,
}

/// [`PlaygroundApi`] over the backend's REST endpoints.
#[derive(Debug, Clone)]
pub struct HttpPlaygroundApi {
    backend: Backend,
}

impl HttpPlaygroundApi {
    pub fn new(config: &ApiConfig) -> Result<Self, ClientError> {
        Ok(Self {
            backend: Backend::new(config)?,
        })
    }
}

#[async_trait]
impl PlaygroundApi for HttpPlaygroundApi {
    async fn fetch_variants(&self, key: &ResourceKey) -> Result<Vec<RawVariant>, ApiError> {
        let url = self.backend.url(key.as_str());
        debug!(%key, "fetching variants");
        let response = send(self.backend.client().get(&url)).await?;
        json(response).await.map_err(ApiError::from)
    }

    async fn fetch_schema(&self, service_uri: &str) -> Result<Value, ApiError> {
        let url = format!("{}/openapi.json", service_uri.trim_end_matches('/'));
        debug!(%url, "fetching app schema");
        let response = send(self.backend.client().get(&url)).await?;
        json(response).await.map_err(ApiError::from)
    }

    async fn create_variant_from_base(
        &self,
        base_id: &str,
        new_variant_name: &str,
        new_config_name: &str,
    ) -> Result<RawVariant, ApiError> {
        let url = self.backend.url("/api/variants/from-base");
        let body = CreateFromBaseRequest {
            base_id,
            new_variant_name,
            new_config_name,
            parameters: Value::Object(Default::default()),
        };
        let request = self.backend.scoped(self.backend.client().post(&url)).json(&body);
        let response = send(request).await?;
        json(response).await.map_err(ApiError::from)
    }

    async fn delete_variant(&self, id: &VariantId) -> Result<(), ApiError> {
        let url = self.backend.url(&format!("/api/variants/{id}"));
        let request = self.backend.scoped(self.backend.client().delete(&url));
        send(request).await?;
        Ok(())
    }

    async fn save_variant_parameters(
        &self,
        id: &VariantId,
        parameters: &Value,
    ) -> Result<(), ApiError> {
        let url = self.backend.url(&format!("/api/variants/{id}/parameters"));
        let request = self
            .backend
            .scoped(self.backend.client().put(&url))
            .json(&SaveParametersRequest { parameters });
        send(request).await?;
        Ok(())
    }
}
