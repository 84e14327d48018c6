//! Consumer-supplied projections of a snapshot.

use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use serde_json::Map;
use serde_json::Value;

use crate::errors::Result;
use crate::errors::StateError;
use crate::ids::VariantId;
use crate::snapshot::PlaygroundSnapshot;
use crate::variant::Variant;

/// Keyed selector output; each key can be read and tracked on its own.
pub type SelectedData = Map<String, Value>;

type StateFn = dyn Fn(&PlaygroundSnapshot) -> SelectedData + Send + Sync;
type VariantFn = dyn Fn(&Variant) -> SelectedData + Send + Sync;

#[derive(Clone)]
pub enum Selector {
    /// Projects the whole snapshot.
    State(Arc<StateFn>),
    /// Projects the hook's configured variant.
    Variant(Arc<VariantFn>),
}

impl Selector {
    pub fn state(f: impl Fn(&PlaygroundSnapshot) -> SelectedData + Send + Sync + 'static) -> Self {
        Self::State(Arc::new(f))
    }

    pub fn variant(f: impl Fn(&Variant) -> SelectedData + Send + Sync + 'static) -> Self {
        Self::Variant(Arc::new(f))
    }

    pub fn requires_variant(&self) -> bool {
        matches!(self, Self::Variant(_))
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::State(_) => f.write_str("Selector::State"),
            Self::Variant(_) => f.write_str("Selector::Variant"),
        }
    }
}

/// Apply `selector`. `Ok(None)` when a variant selector's variant is absent.
pub fn select(
    snapshot: &PlaygroundSnapshot,
    selector: &Selector,
    variant_id: Option<&VariantId>,
) -> Result<Option<SelectedData>> {
    match selector {
        Selector::State(f) => Ok(Some(f(snapshot))),
        Selector::Variant(f) => {
            let id = variant_id
                .ok_or_else(|| StateError::usage("variant selector requires a variant id"))?;
            Ok(snapshot.variant(id).map(|v| f(v.as_ref())))
        }
    }
}

const MEMO_SLOTS: usize = 2;

/// Remembers selector output for the last few snapshots, keyed by identity.
#[derive(Debug, Default)]
pub struct SelectorMemo {
    slots: Mutex<Vec<(Arc<PlaygroundSnapshot>, Option<SelectedData>)>>,
}

impl SelectorMemo {
    pub fn select(
        &self,
        snapshot: &Arc<PlaygroundSnapshot>,
        selector: &Selector,
        variant_id: Option<&VariantId>,
    ) -> Result<Option<SelectedData>> {
        if let Some(hit) = self.lookup(snapshot) {
            return Ok(hit);
        }
        let data = select(snapshot, selector, variant_id)?;
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if slots.len() == MEMO_SLOTS {
            slots.remove(0);
        }
        slots.push((Arc::clone(snapshot), data.clone()));
        Ok(data)
    }

    fn lookup(&self, snapshot: &Arc<PlaygroundSnapshot>) -> Option<Option<SelectedData>> {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(s, _)| Arc::ptr_eq(s, snapshot))
            .map(|(_, data)| data.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::test_support::two_variant_snapshot;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    #[test]
    fn variant_selector_needs_variant_id() {
        let snapshot = two_variant_snapshot();
        let selector = Selector::variant(|v| {
            let mut out = SelectedData::new();
            out.insert("name".into(), json!(v.variant_name));
            out
        });

        assert!(select(&snapshot, &selector, None).is_err());
        let data = select(&snapshot, &selector, Some(&"b".into())).unwrap().unwrap();
        assert_eq!(data["name"], json!("v-b"));
        assert_eq!(select(&snapshot, &selector, Some(&"zzz".into())).unwrap(), None);
    }

    #[test]
    fn memo_reuses_output_for_same_snapshot() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let selector = Selector::state(move |s| {
            counter.fetch_add(1, Ordering::SeqCst);
            let mut out = SelectedData::new();
            out.insert("count".into(), json!(s.variants.len()));
            out
        });
        let memo = SelectorMemo::default();
        let snapshot = Arc::new(two_variant_snapshot());

        memo.select(&snapshot, &selector, None).unwrap();
        memo.select(&snapshot, &selector, None).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let other = Arc::new(two_variant_snapshot());
        memo.select(&other, &selector, None).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
