//! Variant list, display selection and test-input rows.

use std::sync::Arc;

use serde_json::Value;

use super::HookScope;
use super::Middleware;
use crate::compare::base_compare;
use crate::compare::selected_compare;
use crate::compare::variants_compare;
use crate::errors::Result;
use crate::errors::StateError;
use crate::generation::InputRow;
use crate::generation::RunResult;
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

pub struct VariantsMiddleware;

impl Middleware for VariantsMiddleware {
    fn name(&self) -> &'static str {
        "variants"
    }

    fn compare(
        &self,
        prev: Option<&Arc<PlaygroundSnapshot>>,
        next: Option<&Arc<PlaygroundSnapshot>>,
        scope: &HookScope,
    ) -> Option<bool> {
        let tracker = &scope.tracker;
        let (a, b) = (prev.map(Arc::as_ref), next.map(Arc::as_ref));
        let mut verdicts = Vec::new();
        if tracker.contains(&ValueReference::Variants) {
            verdicts.push(match (a, b) {
                (Some(a), Some(b)) => a.variants == b.variants,
                _ => base_compare(a, b),
            });
        }
        if tracker.contains(&ValueReference::VariantIds) {
            verdicts.push(variants_compare(a, b));
        }
        if tracker.contains(&ValueReference::DisplayedVariants) {
            verdicts.push(selected_compare(a, b));
        }
        if tracker.contains(&ValueReference::Inputs) {
            verdicts.push(match (a, b) {
                (Some(a), Some(b)) => a.generation == b.generation,
                _ => base_compare(a, b),
            });
        }
        if verdicts.is_empty() {
            None
        } else {
            Some(verdicts.into_iter().all(|unchanged| unchanged))
        }
    }

    fn revalidate_on_mount(&self, scope: &HookScope) -> Option<bool> {
        Some(
            scope.tracker.contains(&ValueReference::Variants)
                || scope.tracker.contains(&ValueReference::VariantIds),
        )
    }
}

impl PlaygroundHandle {
    pub fn variants(&self) -> Vec<Arc<Variant>> {
        self.scope.tracker.add_to_value_references(ValueReference::Variants);
        self.snapshot
            .as_ref()
            .map(|s| s.variants.clone())
            .unwrap_or_default()
    }

    pub fn variant_ids(&self) -> Vec<VariantId> {
        self.scope.tracker.add_to_value_references(ValueReference::VariantIds);
        self.snapshot
            .as_ref()
            .map(|s| s.variant_ids())
            .unwrap_or_default()
    }

    /// Ids of the variants currently shown, in display order.
    pub fn displayed_variants(&self) -> Vec<VariantId> {
        self.scope
            .tracker
            .add_to_value_references(ValueReference::DisplayedVariants);
        self.snapshot
            .as_ref()
            .map(|s| s.selected.clone())
            .unwrap_or_default()
    }

    pub fn inputs(&self) -> Vec<InputRow> {
        self.scope.tracker.add_to_value_references(ValueReference::Inputs);
        self.snapshot
            .as_ref()
            .map(|s| s.generation.inputs.clone())
            .unwrap_or_default()
    }

    /// Create a variant on the server from the variant named
    /// `base_variant_name`, then append and display it locally.
    pub async fn add_variant(
        &self,
        base_variant_name: &str,
        new_variant_name: &str,
    ) -> Result<MutationOutcome> {
        let services = Arc::clone(&self.services);
        let base_name = base_variant_name.to_string();
        let new_name = new_variant_name.to_string();
        self.engine
            .commit(
                move |mut draft| async move {
                    let base = draft
                        .variants
                        .iter()
                        .find(|v| v.variant_name == base_name)
                        .cloned()
                        .ok_or_else(|| {
                            StateError::usage(format!("no variant named {base_name}"))
                        })?;
                    if draft.variants.iter().any(|v| v.variant_name == new_name) {
                        services
                            .notifier
                            .error(format!("a variant named {new_name} already exists"));
                        return Ok(Draft::Rollback);
                    }

                    let base_id = base.base_id.clone().unwrap_or_else(|| base.id.to_string());
                    let raw = match services
                        .api
                        .create_variant_from_base(&base_id, &new_name, &new_name)
                        .await
                    {
                        Ok(raw) => raw,
                        Err(e) => {
                            return Ok(rollback(
                                &services.notifier,
                                StateError::remote("create variant", e),
                            ));
                        }
                    };
                    let variant = match services
                        .transformer
                        .transform(&raw, draft.schema.as_deref())
                    {
                        Ok(variant) => Arc::new(variant),
                        Err(e) => return Ok(rollback(&services.notifier, e)),
                    };

                    tracing::info!(variant_id = %variant.id, name = %new_name, "variant created");
                    draft.selected.push(variant.id.clone());
                    draft.variants.push(variant);
                    Ok(Draft::Apply(draft))
                },
                MutateOptions::default(),
            )
            .await
    }

    pub async fn set_displayed_variants(&self, ids: Vec<VariantId>) -> Result<MutationOutcome> {
        self.engine
            .commit(
                move |mut draft| async move {
                    if let Some(missing) = ids.iter().find(|id| draft.variant(id).is_none()) {
                        return Err(StateError::usage(format!("unknown variant {missing}")));
                    }
                    let mut selected: Vec<VariantId> = Vec::with_capacity(ids.len());
                    for id in ids {
                        if !selected.contains(&id) {
                            selected.push(id);
                        }
                    }
                    draft.selected = selected;
                    Ok(Draft::Apply(draft))
                },
                MutateOptions::default(),
            )
            .await
    }

    pub async fn toggle_variant_display(
        &self,
        id: &VariantId,
        display: bool,
    ) -> Result<MutationOutcome> {
        let id = id.clone();
        self.engine
            .commit(
                move |mut draft| async move {
                    if draft.variant(&id).is_none() {
                        return Err(StateError::usage(format!("unknown variant {id}")));
                    }
                    if display {
                        if !draft.selected.contains(&id) {
                            draft.selected.push(id);
                        }
                    } else {
                        draft.selected.retain(|s| s != &id);
                    }
                    Ok(Draft::Apply(draft))
                },
                MutateOptions::default(),
            )
            .await
    }

    pub async fn add_input_row(&self) -> Result<MutationOutcome> {
        self.engine
            .mutate(
                |mut draft| {
                    let keys = draft.displayed_input_keys();
                    draft.generation.inputs.push(InputRow::new(&keys));
                    draft
                },
                MutateOptions::default(),
            )
            .await
    }

    pub async fn delete_input_row(&self, row: NodeId) -> Result<MutationOutcome> {
        self.update_row(row, |draft| {
            draft.generation.inputs.retain(|r| r.id != row);
            Ok(())
        })
        .await
    }

    pub async fn update_input_value(
        &self,
        row: NodeId,
        key: &str,
        value: Value,
    ) -> Result<MutationOutcome> {
        let key = key.to_string();
        self.update_row(row, move |draft| {
            let cell = draft
                .generation
                .row_mut(row)
                .and_then(|r| r.values.get_mut(&key))
                .ok_or_else(|| StateError::usage(format!("row {row} has no input {key}")))?;
            cell.value = value;
            Ok(())
        })
        .await
    }

    pub async fn set_row_loading(&self, row: NodeId, is_loading: bool) -> Result<MutationOutcome> {
        self.update_row(row, move |draft| {
            if let Some(r) = draft.generation.row_mut(row) {
                r.is_loading = is_loading;
            }
            Ok(())
        })
        .await
    }

    pub async fn set_row_result(&self, row: NodeId, result: RunResult) -> Result<MutationOutcome> {
        self.update_row(row, move |draft| {
            if let Some(r) = draft.generation.row_mut(row) {
                r.result = Some(result);
                r.is_loading = false;
            }
            Ok(())
        })
        .await
    }

    async fn update_row<F>(&self, row: NodeId, edit: F) -> Result<MutationOutcome>
    where
        F: FnOnce(&mut PlaygroundSnapshot) -> Result<()> + Send,
    {
        self.engine
            .commit(
                move |mut draft| async move {
                    if draft.generation.row(row).is_none() {
                        return Err(StateError::usage(format!("unknown input row {row}")));
                    }
                    edit(&mut draft)?;
                    Ok(Draft::Apply(draft))
                },
                MutateOptions::default(),
            )
            .await
    }
}
