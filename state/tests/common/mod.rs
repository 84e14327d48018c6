#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use playground_state::ApiError;
use playground_state::Playground;
use playground_state::PlaygroundApi;
use playground_state::PlaygroundConfig;
use playground_state::RawVariant;
use playground_state::ResourceKey;
use playground_state::VariantId;
use serde_json::Value;
use serde_json::json;

// ─────────────────────────────────────────────────────────────────────────────
// In-memory backend
// ─────────────────────────────────────────────────────────────────────────────

/// Backend double: serves a fixed variant list and records every write.
#[derive(Default)]
pub struct MockApi {
    variants: Mutex<Vec<RawVariant>>,
    pub fetch_count: AtomicUsize,
    pub fail_fetch: AtomicBool,
    pub fail_create: AtomicBool,
    pub fail_delete: AtomicBool,
    pub fail_save: AtomicBool,
    pub saved: Mutex<Vec<(VariantId, Value)>>,
    pub deleted: Mutex<Vec<VariantId>>,
}

impl MockApi {
    pub fn with_variants(variants: Vec<RawVariant>) -> Arc<Self> {
        Arc::new(Self {
            variants: Mutex::new(variants),
            ..Self::default()
        })
    }

    /// Change what the server lists from now on.
    pub fn replace_variants(&self, variants: Vec<RawVariant>) {
        *self.variants.lock().unwrap() = variants;
    }

    pub fn fetches(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    fn failure(flag: &AtomicBool) -> Result<(), ApiError> {
        if flag.load(Ordering::SeqCst) {
            return Err(ApiError::Status {
                status: 500,
                message: "internal server error".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PlaygroundApi for MockApi {
    async fn fetch_variants(&self, _key: &ResourceKey) -> Result<Vec<RawVariant>, ApiError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        Self::failure(&self.fail_fetch)?;
        Ok(self.variants.lock().unwrap().clone())
    }

    async fn fetch_schema(&self, _service_uri: &str) -> Result<Value, ApiError> {
        Ok(openapi_document())
    }

    async fn create_variant_from_base(
        &self,
        base_id: &str,
        new_variant_name: &str,
        new_config_name: &str,
    ) -> Result<RawVariant, ApiError> {
        Self::failure(&self.fail_create)?;
        let mut variants = self.variants.lock().unwrap();
        let base = variants
            .iter()
            .find(|v| v.base_id.as_deref() == Some(base_id))
            .cloned()
            .ok_or_else(|| ApiError::Status {
                status: 404,
                message: format!("base {base_id} not found"),
            })?;
        let created = RawVariant {
            id: format!("{}-copy", base.id),
            variant_name: new_variant_name.to_string(),
            config_name: Some(new_config_name.to_string()),
            revision: 1,
            ..base
        };
        variants.push(created.clone());
        Ok(created)
    }

    async fn delete_variant(&self, id: &VariantId) -> Result<(), ApiError> {
        Self::failure(&self.fail_delete)?;
        self.variants.lock().unwrap().retain(|v| v.id != id.as_str());
        self.deleted.lock().unwrap().push(id.clone());
        Ok(())
    }

    async fn save_variant_parameters(
        &self,
        id: &VariantId,
        parameters: &Value,
    ) -> Result<(), ApiError> {
        Self::failure(&self.fail_save)?;
        self.saved.lock().unwrap().push((id.clone(), parameters.clone()));
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Fixtures
// ─────────────────────────────────────────────────────────────────────────────

pub fn key() -> ResourceKey {
    ResourceKey::variants("app-1", "proj-1")
}

pub fn raw_variant(id: &str, name: &str, user_template: &str) -> RawVariant {
    RawVariant {
        id: id.to_string(),
        variant_name: name.to_string(),
        revision: 1,
        base_id: Some(format!("base-{id}")),
        base_name: Some("capitals".to_string()),
        config_name: Some(name.to_string()),
        uri: Some("http://service.local/app-1".to_string()),
        parameters: json!({
            "prompt": {
                "messages": [
                    {"role": "system", "content": "You are an expert in geography."},
                    {"role": "user", "content": user_template}
                ],
                "llm_config": {"model": "gpt-4o-mini", "temperature": 0.2},
                "template_format": "fstring"
            }
        }),
    }
}

/// Variants `A` ("v1") and `B` ("v2").
pub fn two_variants() -> Vec<RawVariant> {
    vec![
        raw_variant("A", "v1", "What is the capital of {country}?"),
        raw_variant("B", "v2", "Name the largest city in {country}."),
    ]
}

pub fn playground(api: Arc<MockApi>) -> Playground {
    Playground::new(api, PlaygroundConfig::default())
}

pub fn openapi_document() -> Value {
    json!({
        "openapi": "3.1.0",
        "paths": {
            "/test": {
                "post": {
                    "requestBody": {
                        "content": {
                            "application/json": {
                                "schema": {
                                    "type": "object",
                                    "properties": {"ag_config": {"$ref": "#/components/schemas/Config"}}
                                }
                            }
                        }
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "Config": {
                    "type": "object",
                    "properties": {
                        "prompt": {
                            "type": "object",
                            "properties": {
                                "llm_config": {
                                    "type": "object",
                                    "properties": {
                                        "temperature": {"type": "number", "minimum": 0, "maximum": 2},
                                        "model": {"type": "string"}
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    })
}
