//! Single-variant access and edits, scoped by the hook's variant id.

use std::sync::Arc;

use serde_json::Value;

use super::HookScope;
use super::Middleware;
use crate::compare::variant_compare;
use crate::enhanced::PropertyMetadata;
use crate::errors::Result;
use crate::errors::StateError;
use crate::generation::sync_input_rows;
use crate::hook::PlaygroundHandle;
use crate::ids::NodeId;
use crate::ids::VariantId;
use crate::mutation::Draft;
use crate::mutation::MutateOptions;
use crate::mutation::MutationOutcome;
use crate::mutation::rollback;
use crate::references::ValueReference;
use crate::snapshot::PlaygroundSnapshot;
use crate::variant::Variant;

pub struct VariantMiddleware;

impl Middleware for VariantMiddleware {
    fn name(&self) -> &'static str {
        "variant"
    }

    fn compare(
        &self,
        prev: Option<&Arc<PlaygroundSnapshot>>,
        next: Option<&Arc<PlaygroundSnapshot>>,
        scope: &HookScope,
    ) -> Option<bool> {
        let id = scope.variant_id()?;
        let tracker = &scope.tracker;
        let (a, b) = (prev.map(Arc::as_ref), next.map(Arc::as_ref));
        if tracker.contains(&ValueReference::Variant)
            || tracker.contains(&ValueReference::VariantConfig)
        {
            Some(variant_compare(a, b, id, None))
        } else if tracker.contains(&ValueReference::VariantConfigProperty) {
            Some(variant_compare(a, b, id, tracker.property_id()))
        } else {
            None
        }
    }

    /// Derive input keys for every changed variant, then fit the input rows
    /// to the displayed variants' keys. A first row is seeded only on the
    /// initial load or when the keys change, so deleting the last row sticks.
    fn after_mutate(&self, prev: Option<&PlaygroundSnapshot>, next: &mut PlaygroundSnapshot) {
        for variant in next.variants.iter_mut() {
            let changed = prev
                .and_then(|p| p.variant(&variant.id))
                .is_none_or(|old| !Arc::ptr_eq(old, variant));
            if changed && variant.input_keys_stale() {
                Arc::make_mut(variant).refresh_input_keys();
            }
        }
        let keys = next.displayed_input_keys();
        let seed = prev.is_none_or(|p| p.displayed_input_keys() != keys);
        sync_input_rows(&mut next.generation, &keys, seed);
    }
}

/// One property of the hook's variant, as read by `variant_config_property`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigProperty {
    pub id: NodeId,
    pub metadata: Arc<PropertyMetadata>,
    pub value: Value,
}

impl PlaygroundHandle {
    fn scoped_variant_id(&self) -> Result<VariantId> {
        self.scope
            .tracker
            .check_invalid_selector(&ValueReference::Variant)?;
        self.scope
            .variant_id()
            .cloned()
            .ok_or_else(|| StateError::usage("variant requires a variant id"))
    }

    fn current_variant(&self, id: &VariantId) -> Option<Arc<Variant>> {
        self.snapshot.as_ref().and_then(|s| s.variant(id).cloned())
    }

    pub fn variant(&self) -> Result<Option<Arc<Variant>>> {
        self.scope.track(ValueReference::Variant)?;
        let id = self.scoped_variant_id()?;
        Ok(self.current_variant(&id))
    }

    /// The variant's parameters in their saved shape.
    pub fn variant_config(&self) -> Result<Option<Value>> {
        self.scope.track(ValueReference::VariantConfig)?;
        let id = self.scoped_variant_id()?;
        Ok(self.current_variant(&id).map(|v| v.to_parameters()))
    }

    pub fn variant_config_property(&self) -> Result<Option<ConfigProperty>> {
        self.scope.track(ValueReference::VariantConfigProperty)?;
        let id = self.scoped_variant_id()?;
        let Some(property_id) = self.scope.tracker.property_id() else {
            return Err(StateError::usage("variantConfigProperty requires a property id"));
        };
        Ok(self.current_variant(&id).and_then(|v| {
            let node = v.property(property_id)?;
            Some(ConfigProperty {
                id: property_id,
                metadata: Arc::clone(&node.metadata),
                value: v.property_value(property_id)?,
            })
        }))
    }

    /// Edit the hook's variant in a draft. Ids of untouched nodes survive.
    pub async fn mutate_variant<F>(&self, edit: F) -> Result<MutationOutcome>
    where
        F: FnOnce(&mut Variant) -> Result<()> + Send,
    {
        let id = self.scoped_variant_id()?;
        self.engine
            .commit(
                move |mut draft| async move {
                    let variant = draft
                        .variant_mut(&id)
                        .ok_or_else(|| StateError::usage(format!("variant {id} is not loaded")))?;
                    edit(variant)?;
                    Ok(Draft::Apply(draft))
                },
                MutateOptions::default(),
            )
            .await
    }

    /// Set one leaf property of the hook's variant.
    pub async fn update_property(
        &self,
        property_id: NodeId,
        value: Value,
    ) -> Result<MutationOutcome> {
        self.mutate_variant(move |variant| variant.set_property(property_id, value))
            .await
    }

    /// Delete the hook's variant on the server, then drop it locally.
    pub async fn delete_variant(&self) -> Result<MutationOutcome> {
        let id = self.scoped_variant_id()?;
        let services = Arc::clone(&self.services);
        self.engine
            .commit(
                move |mut draft| async move {
                    if draft.variant(&id).is_none() {
                        return Err(StateError::usage(format!("variant {id} is not loaded")));
                    }
                    if let Err(e) = services.api.delete_variant(&id).await {
                        return Ok(rollback(
                            &services.notifier,
                            StateError::remote("delete variant", e),
                        ));
                    }
                    draft.remove_variant(&id);
                    tracing::info!(variant_id = %id, "variant deleted");
                    services.notifier.success("Variant deleted");
                    Ok(Draft::Apply(draft))
                },
                MutateOptions::default(),
            )
            .await
    }

    /// Persist the hook's variant and make it the new clean baseline.
    pub async fn save_variant(&self) -> Result<MutationOutcome> {
        let id = self.scoped_variant_id()?;
        let services = Arc::clone(&self.services);
        self.engine
            .commit(
                move |mut draft| async move {
                    let parameters = draft
                        .variant(&id)
                        .map(|v| v.to_parameters())
                        .ok_or_else(|| StateError::usage(format!("variant {id} is not loaded")))?;
                    if let Err(e) = services.api.save_variant_parameters(&id, &parameters).await {
                        return Ok(rollback(
                            &services.notifier,
                            StateError::remote("save variant", e),
                        ));
                    }
                    if let Some(variant) = draft.variant_mut(&id) {
                        variant.revision += 1;
                    }
                    if let Some(saved) = draft.variant(&id).cloned() {
                        draft.data_ref.insert(id.clone(), saved);
                    }
                    tracing::info!(variant_id = %id, "variant saved");
                    services.notifier.success("Changes saved successfully");
                    Ok(Draft::Apply(draft))
                },
                MutateOptions::default(),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::test_support::two_variant_snapshot;

    #[test]
    fn after_mutate_refreshes_keys_and_rows() {
        let prev = two_variant_snapshot();
        let mut next = prev.clone();
        let prompt = next.variants[0].prompts[0].id;
        let user = next.variants[0].message_ids(prompt)[1];
        next.variant_mut(&"a".into())
            .unwrap()
            .set_message_content(user, "Capital of {country} in {year}?")
            .unwrap();

        VariantMiddleware.after_mutate(Some(&prev), &mut next);

        assert_eq!(
            next.variants[0].input_keys(),
            vec!["country".to_string(), "year".to_string()]
        );
        assert!(next.generation.inputs[0].values.contains_key("year"));
        assert!(Arc::ptr_eq(&prev.variants[1], &next.variants[1]));
    }
}
