use async_trait::async_trait;
use serde_json::Value;

use crate::errors::ApiError;
use crate::ids::ResourceKey;
use crate::ids::VariantId;
use crate::variant::RawVariant;

/// Remote operations the playground needs from the backend.
#[async_trait]
pub trait PlaygroundApi: Send + Sync {
    async fn fetch_variants(&self, key: &ResourceKey) -> Result<Vec<RawVariant>, ApiError>;

    /// OpenAPI document of the service at `service_uri`.
    async fn fetch_schema(&self, service_uri: &str) -> Result<Value, ApiError>;

    async fn create_variant_from_base(
        &self,
        base_id: &str,
        new_variant_name: &str,
        new_config_name: &str,
    ) -> Result<RawVariant, ApiError>;

    async fn delete_variant(&self, id: &VariantId) -> Result<(), ApiError>;

    async fn save_variant_parameters(
        &self,
        id: &VariantId,
        parameters: &Value,
    ) -> Result<(), ApiError>;
}
