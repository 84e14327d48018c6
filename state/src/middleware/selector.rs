use std::sync::Arc;

use serde_json::Value;

use super::HookScope;
use super::Middleware;
use crate::compare::base_compare;
use crate::errors::Result;
use crate::errors::StateError;
use crate::hook::PlaygroundHandle;
use crate::references::ValueReference;
use crate::selector::SelectedData;
use crate::snapshot::PlaygroundSnapshot;

/// Narrows change detection to the hook's selector output.
pub struct SelectorMiddleware;

impl Middleware for SelectorMiddleware {
    fn name(&self) -> &'static str {
        "selector"
    }

    fn compare(
        &self,
        prev: Option<&Arc<PlaygroundSnapshot>>,
        next: Option<&Arc<PlaygroundSnapshot>>,
        scope: &HookScope,
    ) -> Option<bool> {
        let selector = scope.selector.as_ref()?;
        let whole = scope.tracker.contains(&ValueReference::SelectedData);
        let keys = scope.tracker.selected_keys();
        if !whole && keys.is_empty() {
            return None;
        }
        let (Some(prev), Some(next)) = (prev, next) else {
            return Some(base_compare(prev.map(Arc::as_ref), next.map(Arc::as_ref)));
        };

        let select = |s: &Arc<PlaygroundSnapshot>| {
            scope
                .memo
                .select(s, selector, scope.variant_id())
                .ok()
                .flatten()
        };
        let (a, b) = (select(prev), select(next));
        if whole {
            return Some(a == b);
        }
        let field = |data: &Option<SelectedData>, key: &str| {
            data.as_ref().and_then(|d| d.get(key)).cloned()
        };
        Some(keys.iter().all(|k| field(&a, k) == field(&b, k)))
    }
}

impl PlaygroundHandle {
    /// Whole selector output. Any change to it re-renders the hook.
    pub fn selected_data(&self) -> Result<Option<SelectedData>> {
        self.scope.track(ValueReference::SelectedData)?;
        self.select()
    }

    /// One key of the selector output; only changes to read keys re-render.
    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        self.scope
            .track(ValueReference::SelectedKey(key.to_string()))?;
        Ok(self.select()?.and_then(|mut data| data.remove(key)))
    }

    fn select(&self) -> Result<Option<SelectedData>> {
        let selector = self
            .scope
            .selector
            .as_ref()
            .ok_or_else(|| StateError::usage("hook was created without a selector"))?;
        match &self.snapshot {
            Some(snapshot) => self
                .scope
                .memo
                .select(snapshot, selector, self.scope.variant_id()),
            None => Ok(None),
        }
    }
}
