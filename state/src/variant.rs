//! Prompt variants: the raw server shape and the Enhanced in-memory shape.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex_lite::Regex;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

use crate::enhanced::EnhancedNode;
use crate::enhanced::PropertyArena;
use crate::errors::Result;
use crate::errors::StateError;
use crate::ids::NodeId;
use crate::ids::VariantId;

/// Variant as returned by the variants endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawVariant {
    #[serde(alias = "variant_id")]
    pub id: String,
    pub variant_name: String,
    #[serde(default)]
    pub revision: u64,
    #[serde(default)]
    pub base_id: Option<String>,
    #[serde(default)]
    pub base_name: Option<String>,
    #[serde(default)]
    pub config_name: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub parameters: Value,
}

/// One prompt configuration inside a variant.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub id: NodeId,
    pub name: String,
    /// Array node; each element is an object node with `role` and `content`.
    pub messages: NodeId,
    /// Object node holding model parameters.
    pub llm_config: NodeId,
    pub template_format: Option<String>,
    input_keys: Vec<String>,
}

impl Prompt {
    /// `{name}` tokens found across all message contents, first-seen order.
    pub fn input_keys(&self) -> &[String] {
        &self.input_keys
    }
}

/// A prompt variant in its Enhanced representation.
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    pub id: VariantId,
    pub variant_name: String,
    pub revision: u64,
    pub base_id: Option<String>,
    pub base_name: Option<String>,
    pub config_name: Option<String>,
    pub uri: Option<String>,
    pub prompts: Vec<Prompt>,
    /// Non-prompt parameters, by name.
    pub custom_properties: BTreeMap<String, NodeId>,
    pub properties: PropertyArena,
}

impl Variant {
    /// Build the Enhanced representation of `raw`. `config_schema` is the
    /// JSON-schema of the variant's parameters object, when known.
    pub fn from_raw(raw: &RawVariant, config_schema: Option<&Value>) -> Self {
        let mut properties = PropertyArena::new();
        let mut prompts = Vec::new();
        let mut custom_properties = BTreeMap::new();
        let schema_props = config_schema.and_then(|s| s.get("properties"));

        if let Some(params) = raw.parameters.as_object() {
            for (name, value) in params {
                let field_schema = schema_props.and_then(|p| p.get(name));
                match value.get("messages").and_then(Value::as_array) {
                    Some(messages) => {
                        let prompt_props = field_schema.and_then(|s| s.get("properties"));
                        let messages = properties.build(
                            &Value::Array(messages.clone()),
                            prompt_props.and_then(|p| p.get("messages")),
                        );
                        let llm_config = properties.build(
                            value.get("llm_config").unwrap_or(&Value::Object(Map::new())),
                            prompt_props.and_then(|p| p.get("llm_config")),
                        );
                        prompts.push(Prompt {
                            id: NodeId::new(),
                            name: name.clone(),
                            messages,
                            llm_config,
                            template_format: value
                                .get("template_format")
                                .and_then(Value::as_str)
                                .map(str::to_string),
                            input_keys: Vec::new(),
                        });
                    }
                    None => {
                        custom_properties.insert(
                            name.clone(),
                            properties.build(value, field_schema),
                        );
                    }
                }
            }
        }

        let mut variant = Self {
            id: VariantId::new(raw.id.clone()),
            variant_name: raw.variant_name.clone(),
            revision: raw.revision,
            base_id: raw.base_id.clone(),
            base_name: raw.base_name.clone(),
            config_name: raw.config_name.clone(),
            uri: raw.uri.clone(),
            prompts,
            custom_properties,
            properties,
        };
        variant.refresh_input_keys();
        variant
    }

    pub fn property(&self, id: NodeId) -> Option<&EnhancedNode> {
        self.properties.get(id)
    }

    /// Plain value of any property in this variant.
    pub fn property_value(&self, id: NodeId) -> Option<Value> {
        self.properties.to_value(id)
    }

    /// Set a leaf property, checking the value against its metadata.
    pub fn set_property(&mut self, id: NodeId, value: Value) -> Result<()> {
        let node = self
            .properties
            .get(id)
            .ok_or_else(|| StateError::usage(format!("property {id} not found in {}", self.id)))?;
        if !node.metadata.accepts(&value) {
            return Err(StateError::usage(format!(
                "value {value} rejected by property {id} ({:?})",
                node.metadata.kind
            )));
        }
        self.properties.set_scalar(id, value)
    }

    pub fn prompt(&self, id: NodeId) -> Option<&Prompt> {
        self.prompts.iter().find(|p| p.id == id)
    }

    fn prompt_messages(&self, prompt: NodeId) -> Result<NodeId> {
        self.prompt(prompt)
            .map(|p| p.messages)
            .ok_or_else(|| StateError::usage(format!("prompt {prompt} not found in {}", self.id)))
    }

    pub fn message_ids(&self, prompt: NodeId) -> Vec<NodeId> {
        self.prompt(prompt)
            .and_then(|p| self.properties.items(p.messages))
            .map(<[NodeId]>::to_vec)
            .unwrap_or_default()
    }

    pub fn message_content(&self, message: NodeId) -> Option<String> {
        let content = self.properties.field(message, "content")?;
        self.properties.to_value(content).map(|v| content_text(&v))
    }

    pub fn set_message_content(
        &mut self,
        message: NodeId,
        content: impl Into<String>,
    ) -> Result<()> {
        let leaf = self
            .properties
            .field(message, "content")
            .ok_or_else(|| StateError::usage(format!("message {message} has no content")))?;
        self.properties.set_scalar(leaf, Value::String(content.into()))
    }

    pub fn add_message(&mut self, prompt: NodeId, role: &str, content: &str) -> Result<NodeId> {
        let messages = self.prompt_messages(prompt)?;
        self.properties
            .push_item(messages, &json!({"role": role, "content": content}))
    }

    pub fn remove_message(&mut self, prompt: NodeId, message: NodeId) -> Result<()> {
        let messages = self.prompt_messages(prompt)?;
        self.properties.remove_item(messages, message)
    }

    pub fn move_message(&mut self, prompt: NodeId, from: usize, to: usize) -> Result<()> {
        let messages = self.prompt_messages(prompt)?;
        self.properties.move_item(messages, from, to)
    }

    fn derive_input_keys(&self, prompt: &Prompt) -> Vec<String> {
        let mut keys = Vec::new();
        for message in self.properties.items(prompt.messages).unwrap_or_default() {
            if let Some(content) = self.message_content(*message) {
                for key in extract_input_keys(&content) {
                    if !keys.contains(&key) {
                        keys.push(key);
                    }
                }
            }
        }
        keys
    }

    /// Whether any prompt's stored input keys disagree with its messages.
    pub(crate) fn input_keys_stale(&self) -> bool {
        self.prompts
            .iter()
            .any(|p| p.input_keys != self.derive_input_keys(p))
    }

    /// Recompute every prompt's derived input keys. Returns whether any changed.
    pub(crate) fn refresh_input_keys(&mut self) -> bool {
        let mut changed = false;
        for index in 0..self.prompts.len() {
            let keys = self.derive_input_keys(&self.prompts[index]);
            if self.prompts[index].input_keys != keys {
                self.prompts[index].input_keys = keys;
                changed = true;
            }
        }
        changed
    }

    /// Union of input keys across prompts, first-seen order.
    pub fn input_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for key in self.prompts.iter().flat_map(|p| p.input_keys.iter()) {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }
        keys
    }

    /// Serialize back into the parameters object the save endpoint expects.
    pub fn to_parameters(&self) -> Value {
        let mut params = Map::new();
        for prompt in &self.prompts {
            let mut body = Map::new();
            body.insert(
                "messages".to_string(),
                self.properties.to_value(prompt.messages).unwrap_or(Value::Null),
            );
            body.insert(
                "llm_config".to_string(),
                self.properties.to_value(prompt.llm_config).unwrap_or(Value::Null),
            );
            body.insert("input_keys".to_string(), json!(prompt.input_keys));
            if let Some(format) = &prompt.template_format {
                body.insert("template_format".to_string(), json!(format));
            }
            params.insert(prompt.name.clone(), Value::Object(body));
        }
        for (name, id) in &self.custom_properties {
            if let Some(value) = self.properties.to_value(*id) {
                params.insert(name.clone(), value);
            }
        }
        Value::Object(params)
    }
}

fn content_text(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

static INPUT_KEY_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_\-]*)\}").ok());

/// Extract f-string `{name}` tokens; `{{` and `}}` are escapes.
pub fn extract_input_keys(text: &str) -> Vec<String> {
    let Some(re) = INPUT_KEY_RE.as_ref() else {
        return Vec::new();
    };
    let mut keys: Vec<String> = Vec::new();
    for caps in re.captures_iter(text) {
        if let Some(name) = caps.get(1) {
            let name = name.as_str().to_string();
            if !keys.contains(&name) {
                keys.push(name);
            }
        }
    }
    keys
}
