//! Enhanced value tree stored as a flat, id-indexed arena.
//!
//! Every configuration value of a variant is wrapped in an [`EnhancedNode`]
//! carrying a stable [`NodeId`] and schema-derived [`PropertyMetadata`].
//! Objects and arrays reference their children by id, so lookup by id is a
//! single map access and reordering an array only permutes ids.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::errors::Result;
use crate::errors::StateError;
use crate::ids::NodeId;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    String,
    Number,
    Integer,
    Boolean,
    Enum,
    Array,
    Object,
    #[default]
    Null,
}

/// Schema-derived description of one property.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PropertyMetadata {
    pub kind: PropertyKind,
    pub title: Option<String>,
    pub description: Option<String>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub options: Vec<Value>,
    pub nullable: bool,
}

impl PropertyMetadata {
    /// Build metadata from an optional JSON-schema fragment, falling back to
    /// the shape of `value` when the schema says nothing.
    pub fn from_schema(schema: Option<&Value>, value: &Value) -> Self {
        let mut meta = Self {
            kind: kind_of_value(value),
            ..Self::default()
        };
        let Some(schema) = schema else {
            return meta;
        };

        let mut schema = schema;
        if let Some(variants) = schema.get("anyOf").and_then(Value::as_array) {
            meta.nullable = variants
                .iter()
                .any(|v| v.get("type").and_then(Value::as_str) == Some("null"));
            if let Some(non_null) = variants
                .iter()
                .find(|v| v.get("type").and_then(Value::as_str) != Some("null"))
            {
                schema = non_null;
            }
        }

        if let Some(options) = schema.get("enum").and_then(Value::as_array) {
            meta.kind = PropertyKind::Enum;
            meta.options = options.clone();
        } else if let Some(kind) = schema.get("type").and_then(Value::as_str).and_then(parse_kind)
        {
            meta.kind = kind;
        }

        meta.title = schema.get("title").and_then(Value::as_str).map(str::to_string);
        meta.description = schema
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);
        meta.minimum = schema.get("minimum").and_then(Value::as_f64);
        meta.maximum = schema.get("maximum").and_then(Value::as_f64);
        meta
    }

    /// Whether `value` is acceptable for a property with this metadata.
    pub fn accepts(&self, value: &Value) -> bool {
        if value.is_null() {
            return self.nullable || self.kind == PropertyKind::Null;
        }
        match self.kind {
            PropertyKind::String => value.is_string(),
            PropertyKind::Boolean => value.is_boolean(),
            PropertyKind::Integer => value.is_i64() || value.is_u64(),
            PropertyKind::Number => value.as_f64().is_some_and(|n| self.in_range(n)),
            PropertyKind::Enum => self.options.contains(value),
            PropertyKind::Array => value.is_array(),
            PropertyKind::Object => value.is_object(),
            PropertyKind::Null => true,
        }
    }

    fn in_range(&self, n: f64) -> bool {
        self.minimum.is_none_or(|min| n >= min) && self.maximum.is_none_or(|max| n <= max)
    }
}

fn parse_kind(name: &str) -> Option<PropertyKind> {
    match name {
        "string" => Some(PropertyKind::String),
        "number" => Some(PropertyKind::Number),
        "integer" => Some(PropertyKind::Integer),
        "boolean" => Some(PropertyKind::Boolean),
        "array" => Some(PropertyKind::Array),
        "object" => Some(PropertyKind::Object),
        "null" => Some(PropertyKind::Null),
        _ => None,
    }
}

fn kind_of_value(value: &Value) -> PropertyKind {
    match value {
        Value::Null => PropertyKind::Null,
        Value::Bool(_) => PropertyKind::Boolean,
        Value::Number(n) if n.is_f64() => PropertyKind::Number,
        Value::Number(_) => PropertyKind::Integer,
        Value::String(_) => PropertyKind::String,
        Value::Array(_) => PropertyKind::Array,
        Value::Object(_) => PropertyKind::Object,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnhancedValue {
    Scalar(Value),
    Object(BTreeMap<String, NodeId>),
    Array(Vec<NodeId>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnhancedNode {
    pub id: NodeId,
    pub metadata: Arc<PropertyMetadata>,
    pub value: EnhancedValue,
}

/// Flat `NodeId -> EnhancedNode` index owning one variant's value tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyArena {
    nodes: HashMap<NodeId, EnhancedNode>,
}

impl PropertyArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&EnhancedNode> {
        self.nodes.get(&id)
    }

    /// Register `value` (recursively) and return the id of its root node.
    pub fn build(&mut self, value: &Value, schema: Option<&Value>) -> NodeId {
        let id = NodeId::new();
        let metadata = Arc::new(PropertyMetadata::from_schema(schema, value));
        let enhanced = match value {
            Value::Object(map) => {
                let properties = schema.and_then(|s| s.get("properties"));
                let fields = map
                    .iter()
                    .map(|(name, child)| {
                        let child_schema = properties.and_then(|p| p.get(name));
                        (name.clone(), self.build(child, child_schema))
                    })
                    .collect();
                EnhancedValue::Object(fields)
            }
            Value::Array(items) => {
                let item_schema = schema.and_then(|s| s.get("items"));
                EnhancedValue::Array(
                    items
                        .iter()
                        .map(|item| self.build(item, item_schema))
                        .collect(),
                )
            }
            scalar => EnhancedValue::Scalar(scalar.clone()),
        };
        self.nodes.insert(
            id,
            EnhancedNode {
                id,
                metadata,
                value: enhanced,
            },
        );
        id
    }

    /// Materialize the plain JSON value under `id` (ids and metadata stripped).
    pub fn to_value(&self, id: NodeId) -> Option<Value> {
        let node = self.nodes.get(&id)?;
        Some(match &node.value {
            EnhancedValue::Scalar(value) => value.clone(),
            EnhancedValue::Object(fields) => Value::Object(
                fields
                    .iter()
                    .filter_map(|(name, child)| Some((name.clone(), self.to_value(*child)?)))
                    .collect(),
            ),
            EnhancedValue::Array(items) => Value::Array(
                items
                    .iter()
                    .filter_map(|child| self.to_value(*child))
                    .collect(),
            ),
        })
    }

    pub fn field(&self, object: NodeId, name: &str) -> Option<NodeId> {
        match &self.nodes.get(&object)?.value {
            EnhancedValue::Object(fields) => fields.get(name).copied(),
            _ => None,
        }
    }

    pub fn items(&self, array: NodeId) -> Option<&[NodeId]> {
        match &self.nodes.get(&array)?.value {
            EnhancedValue::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Scalar value of a leaf node.
    pub fn scalar(&self, id: NodeId) -> Option<&Value> {
        match &self.nodes.get(&id)?.value {
            EnhancedValue::Scalar(value) => Some(value),
            _ => None,
        }
    }

    /// Replace the value of a leaf node, keeping its id and metadata.
    pub fn set_scalar(&mut self, id: NodeId, value: Value) -> Result<()> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or_else(|| StateError::usage(format!("property {id} not found")))?;
        match &mut node.value {
            EnhancedValue::Scalar(slot) => {
                *slot = value;
                Ok(())
            }
            _ => Err(StateError::usage(format!(
                "property {id} is not a leaf value"
            ))),
        }
    }

    /// Append `value` to an array node and return the new element's id.
    pub fn push_item(&mut self, array: NodeId, value: &Value) -> Result<NodeId> {
        self.array_items(array)?;
        let child = self.build(value, None);
        self.array_items_mut(array)?.push(child);
        Ok(child)
    }

    /// Remove one element (and its subtree) from an array node.
    pub fn remove_item(&mut self, array: NodeId, item: NodeId) -> Result<()> {
        let items = self.array_items_mut(array)?;
        let position = items
            .iter()
            .position(|id| *id == item)
            .ok_or_else(|| StateError::usage(format!("{item} is not an element of {array}")))?;
        items.remove(position);
        self.remove_subtree(item);
        Ok(())
    }

    /// Move an element within an array node; element ids are untouched.
    pub fn move_item(&mut self, array: NodeId, from: usize, to: usize) -> Result<()> {
        let items = self.array_items_mut(array)?;
        if from >= items.len() || to >= items.len() {
            return Err(StateError::usage(format!(
                "move {from} -> {to} out of bounds for array of {}",
                items.len()
            )));
        }
        let item = items.remove(from);
        items.insert(to, item);
        Ok(())
    }

    fn array_items(&self, array: NodeId) -> Result<&Vec<NodeId>> {
        match self.nodes.get(&array).map(|n| &n.value) {
            Some(EnhancedValue::Array(items)) => Ok(items),
            Some(_) => Err(StateError::usage(format!("property {array} is not an array"))),
            None => Err(StateError::usage(format!("property {array} not found"))),
        }
    }

    fn array_items_mut(&mut self, array: NodeId) -> Result<&mut Vec<NodeId>> {
        match self.nodes.get_mut(&array).map(|n| &mut n.value) {
            Some(EnhancedValue::Array(items)) => Ok(items),
            Some(_) => Err(StateError::usage(format!("property {array} is not an array"))),
            None => Err(StateError::usage(format!("property {array} not found"))),
        }
    }

    fn remove_subtree(&mut self, id: NodeId) {
        let Some(node) = self.nodes.remove(&id) else {
            return;
        };
        match node.value {
            EnhancedValue::Object(fields) => {
                for child in fields.into_values() {
                    self.remove_subtree(child);
                }
            }
            EnhancedValue::Array(items) => {
                for child in items {
                    self.remove_subtree(child);
                }
            }
            EnhancedValue::Scalar(_) => {}
        }
    }
}
