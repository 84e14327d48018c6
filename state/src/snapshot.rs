use std::collections::BTreeMap;
use std::sync::Arc;

use crate::generation::GenerationData;
use crate::ids::VariantId;
use crate::schema::AppSchema;
use crate::variant::Variant;

/// The cached value of one playground resource key.
///
/// Variants are shared behind `Arc`; cloning a snapshot copies pointers, and
/// [`PlaygroundSnapshot::variant_mut`] clones only the variant being changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaygroundSnapshot {
    pub variants: Vec<Arc<Variant>>,
    /// Displayed variant ids, in display order.
    pub selected: Vec<VariantId>,
    pub dirty_states: BTreeMap<VariantId, bool>,
    /// Baseline of each variant at its last sync with the server.
    pub data_ref: BTreeMap<VariantId, Arc<Variant>>,
    pub generation: GenerationData,
    pub schema: Option<Arc<AppSchema>>,
}

impl PlaygroundSnapshot {
    pub fn variant(&self, id: &VariantId) -> Option<&Arc<Variant>> {
        self.variants.iter().find(|v| &v.id == id)
    }

    pub fn variant_ids(&self) -> Vec<VariantId> {
        self.variants.iter().map(|v| v.id.clone()).collect()
    }

    pub fn variant_mut(&mut self, id: &VariantId) -> Option<&mut Variant> {
        self.variants
            .iter_mut()
            .find(|v| &v.id == id)
            .map(Arc::make_mut)
    }

    pub fn displayed_variants(&self) -> Vec<Arc<Variant>> {
        self.selected
            .iter()
            .filter_map(|id| self.variant(id).cloned())
            .collect()
    }

    /// Union of input keys over displayed variants, first-seen order.
    pub fn displayed_input_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for variant in self.displayed_variants() {
            for key in variant.input_keys() {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        keys
    }

    pub fn remove_variant(&mut self, id: &VariantId) -> Option<Arc<Variant>> {
        let index = self.variants.iter().position(|v| &v.id == id)?;
        let removed = self.variants.remove(index);
        self.prune_stale();
        Some(removed)
    }

    /// Drop selection, dirty and baseline entries for variants that no
    /// longer exist. A selection left empty falls back to the first variant.
    pub fn prune_stale(&mut self) {
        let Self {
            variants,
            selected,
            dirty_states,
            data_ref,
            ..
        } = self;
        let exists = |id: &VariantId| variants.iter().any(|v| &v.id == id);
        selected.retain(|id| exists(id));
        dirty_states.retain(|id, _| exists(id));
        data_ref.retain(|id, _| exists(id));
        if selected.is_empty()
            && let Some(first) = variants.first()
        {
            selected.push(first.id.clone());
        }
    }

    pub fn is_dirty(&self, id: &VariantId) -> bool {
        self.dirty_states.get(id).copied().unwrap_or(false)
    }
}

/// Partial snapshot update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct SnapshotPatch {
    pub variants: Option<Vec<Arc<Variant>>>,
    pub selected: Option<Vec<VariantId>>,
    pub dirty_states: Option<BTreeMap<VariantId, bool>>,
    pub generation: Option<GenerationData>,
}

impl SnapshotPatch {
    pub fn apply(self, mut snapshot: PlaygroundSnapshot) -> PlaygroundSnapshot {
        if let Some(variants) = self.variants {
            snapshot.variants = variants;
        }
        if let Some(selected) = self.selected {
            snapshot.selected = selected;
        }
        if let Some(dirty_states) = self.dirty_states {
            snapshot.dirty_states = dirty_states;
        }
        if let Some(generation) = self.generation {
            snapshot.generation = generation;
        }
        snapshot
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::variant::test_support::raw_variant;

    /// Two variants, both displayed, each its own clean baseline.
    pub fn two_variant_snapshot() -> PlaygroundSnapshot {
        let a = Arc::new(Variant::from_raw(
            &raw_variant("a", "v-a", "Capital of {country}?"),
            None,
        ));
        let b = Arc::new(Variant::from_raw(
            &raw_variant("b", "v-b", "Population of {country}?"),
            None,
        ));
        let mut snapshot = PlaygroundSnapshot {
            selected: vec![a.id.clone(), b.id.clone()],
            dirty_states: [(a.id.clone(), false), (b.id.clone(), false)].into(),
            data_ref: [(a.id.clone(), a.clone()), (b.id.clone(), b.clone())].into(),
            variants: vec![a, b],
            ..PlaygroundSnapshot::default()
        };
        let keys = snapshot.displayed_input_keys();
        crate::generation::sync_input_rows(&mut snapshot.generation, &keys, true);
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::test_support::two_variant_snapshot;
    use pretty_assertions::assert_eq;

    #[test]
    fn variant_mut_copies_only_the_touched_variant() {
        let before = two_variant_snapshot();
        let mut after = before.clone();
        after.variant_mut(&"a".into()).unwrap().variant_name = "renamed".into();

        assert!(!Arc::ptr_eq(&before.variants[0], &after.variants[0]));
        assert!(Arc::ptr_eq(&before.variants[1], &after.variants[1]));
        assert_eq!(before.variants[0].variant_name, "v-a");
    }

    #[test]
    fn remove_variant_prunes_every_index() {
        let mut snapshot = two_variant_snapshot();
        snapshot.remove_variant(&"a".into());

        assert_eq!(snapshot.variant_ids(), vec![VariantId::from("b")]);
        assert_eq!(snapshot.selected, vec![VariantId::from("b")]);
        assert!(!snapshot.dirty_states.contains_key(&VariantId::from("a")));
        assert!(!snapshot.data_ref.contains_key(&VariantId::from("a")));
    }

    #[test]
    fn empty_selection_falls_back_to_first_variant() {
        let mut snapshot = two_variant_snapshot();
        snapshot.selected = vec!["gone".into()];
        snapshot.prune_stale();
        assert_eq!(snapshot.selected, vec![VariantId::from("a")]);
    }
}
