//! Test-input rows shown under the playground's prompts.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::ids::NodeId;

/// One editable cell of an input row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputValue {
    pub id: NodeId,
    pub value: Value,
}

impl InputValue {
    fn empty() -> Self {
        Self {
            id: NodeId::new(),
            value: Value::String(String::new()),
        }
    }
}

/// Output of running one row against a variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResult {
    pub output: Option<Value>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputRow {
    pub id: NodeId,
    pub values: BTreeMap<String, InputValue>,
    pub result: Option<RunResult>,
    pub is_loading: bool,
}

impl InputRow {
    pub fn new<'a>(keys: impl IntoIterator<Item = &'a String>) -> Self {
        Self {
            id: NodeId::new(),
            values: keys
                .into_iter()
                .map(|k| (k.clone(), InputValue::empty()))
                .collect(),
            result: None,
            is_loading: false,
        }
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key).map(|v| &v.value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerationData {
    pub inputs: Vec<InputRow>,
}

impl GenerationData {
    pub fn row(&self, id: NodeId) -> Option<&InputRow> {
        self.inputs.iter().find(|r| r.id == id)
    }

    pub fn row_mut(&mut self, id: NodeId) -> Option<&mut InputRow> {
        self.inputs.iter_mut().find(|r| r.id == id)
    }
}

/// Make every row carry exactly `keys`.
///
/// Values for keys that remain are kept untouched; new keys get an empty
/// value; vanished keys are dropped. With `seed` set and no rows present, a
/// single empty row is created. Returns whether anything changed.
pub fn sync_input_rows(generation: &mut GenerationData, keys: &[String], seed: bool) -> bool {
    if generation.inputs.is_empty() {
        if !seed {
            return false;
        }
        generation.inputs.push(InputRow::new(keys));
        return true;
    }

    let mut changed = false;
    for row in &mut generation.inputs {
        let before = row.values.len();
        row.values.retain(|k, _| keys.contains(k));
        changed |= row.values.len() != before;
        for key in keys {
            if !row.values.contains_key(key) {
                row.values.insert(key.clone(), InputValue::empty());
                changed = true;
            }
        }
    }
    changed
}
