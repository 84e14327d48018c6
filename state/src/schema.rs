//! App schema handling: `$ref` dereferencing and raw → Enhanced transformation.

use std::collections::HashSet;

use serde_json::Map;
use serde_json::Value;

use crate::errors::Result;
use crate::errors::StateError;
use crate::variant::RawVariant;
use crate::variant::Variant;

/// Request paths searched, in order, for the `ag_config` parameters schema.
const CONFIG_PATHS: &[&str] = &["/test", "/run", "/generate", "/generate_deployed"];

/// Dereferenced OpenAPI document of the service that serves an app.
#[derive(Debug, Clone, PartialEq)]
pub struct AppSchema {
    document: Value,
    config_schema: Value,
}

impl AppSchema {
    /// Dereference `document` and locate the variant parameters schema.
    pub fn from_openapi(document: &Value) -> Result<Self> {
        if !document.is_object() {
            return Err(StateError::schema("openapi document is not an object"));
        }
        let document = dereference(document);
        let config_schema = find_config_schema(&document)
            .cloned()
            .ok_or_else(|| StateError::schema("no ag_config schema in openapi document"))?;
        Ok(Self {
            document,
            config_schema,
        })
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Schema of a variant's `parameters` object.
    pub fn config_schema(&self) -> &Value {
        &self.config_schema
    }
}

fn find_config_schema(document: &Value) -> Option<&Value> {
    fn from_path(path: &Value) -> Option<&Value> {
        path.pointer("/post/requestBody/content/application~1json/schema/properties/ag_config")
    }

    let paths = document.get("paths")?.as_object()?;
    CONFIG_PATHS
        .iter()
        .find_map(|p| paths.get(*p).and_then(from_path))
        .or_else(|| paths.values().find_map(from_path))
}

/// Inline every local `$ref` (`#/...`). Cyclic references are left in place.
pub fn dereference(document: &Value) -> Value {
    let mut visiting = HashSet::new();
    resolve(document, document, &mut visiting)
}

fn resolve(root: &Value, node: &Value, visiting: &mut HashSet<String>) -> Value {
    match node {
        Value::Object(map) => {
            if let Some(target) = map.get("$ref").and_then(Value::as_str)
                && let Some(pointer) = target.strip_prefix('#')
                && let Some(referenced) = root.pointer(pointer)
            {
                if !visiting.insert(target.to_string()) {
                    return node.clone();
                }
                let resolved = resolve(root, referenced, visiting);
                visiting.remove(target);
                return resolved;
            }
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), resolve(root, v, visiting));
            }
            Value::Object(out)
        }
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| resolve(root, v, visiting)).collect())
        }
        other => other.clone(),
    }
}

/// Turns a raw server variant into its Enhanced representation.
pub trait VariantTransformer: Send + Sync {
    fn transform(&self, raw: &RawVariant, schema: Option<&AppSchema>) -> Result<Variant>;
}

/// Treats every parameter object with a `messages` array as a prompt.
#[derive(Debug, Default, Clone, Copy)]
pub struct PromptTransformer;

impl VariantTransformer for PromptTransformer {
    fn transform(&self, raw: &RawVariant, schema: Option<&AppSchema>) -> Result<Variant> {
        if !(raw.parameters.is_object() || raw.parameters.is_null()) {
            return Err(StateError::schema(format!(
                "variant {} has non-object parameters",
                raw.id
            )));
        }
        Ok(Variant::from_raw(raw, schema.map(AppSchema::config_schema)))
    }
}
