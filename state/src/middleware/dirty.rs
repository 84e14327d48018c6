//! Tracks whether each variant differs from its last-synced baseline.

use std::sync::Arc;

use async_trait::async_trait;

use super::FetchRequest;
use super::HookScope;
use super::Middleware;
use super::SharedFetcher;
use super::SnapshotFetcher;
use crate::compare::base_compare;
use crate::errors::Result;
use crate::errors::StateError;
use crate::hook::PlaygroundHandle;
use crate::mutation::Draft;
use crate::mutation::MutateOptions;
use crate::mutation::MutationOutcome;
use crate::references::ValueReference;
use crate::snapshot::PlaygroundSnapshot;

pub struct DirtyMiddleware;

impl Middleware for DirtyMiddleware {
    fn name(&self) -> &'static str {
        "dirty"
    }

    fn wrap_fetcher(&self, inner: SharedFetcher) -> SharedFetcher {
        Arc::new(BaselineFetcher { inner })
    }

    fn compare(
        &self,
        prev: Option<&Arc<PlaygroundSnapshot>>,
        next: Option<&Arc<PlaygroundSnapshot>>,
        scope: &HookScope,
    ) -> Option<bool> {
        if !scope.tracker.contains(&ValueReference::IsDirty) {
            return None;
        }
        let id = scope.variant_id()?;
        Some(match (prev, next) {
            (Some(a), Some(b)) => a.is_dirty(id) == b.is_dirty(id),
            _ => base_compare(prev.map(Arc::as_ref), next.map(Arc::as_ref)),
        })
    }

    /// Recompute dirtiness of every variant the draft replaced. A variant
    /// without a baseline becomes its own clean baseline.
    fn after_mutate(&self, prev: Option<&PlaygroundSnapshot>, next: &mut PlaygroundSnapshot) {
        let PlaygroundSnapshot {
            variants,
            dirty_states,
            data_ref,
            ..
        } = next;
        for variant in variants.iter() {
            let changed = prev
                .and_then(|p| p.variant(&variant.id))
                .is_none_or(|old| !Arc::ptr_eq(old, variant));
            if !changed {
                continue;
            }
            match data_ref.get(&variant.id) {
                Some(baseline) => {
                    let dirty = !Arc::ptr_eq(baseline, variant) && **baseline != **variant;
                    dirty_states.insert(variant.id.clone(), dirty);
                }
                None => {
                    data_ref.insert(variant.id.clone(), Arc::clone(variant));
                    dirty_states.insert(variant.id.clone(), false);
                }
            }
        }
    }
}

/// Resets baselines for variants that came fresh from the server.
struct BaselineFetcher {
    inner: SharedFetcher,
}

#[async_trait]
impl SnapshotFetcher for BaselineFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<PlaygroundSnapshot> {
        let current = request.current.clone();
        let mut next = self.inner.fetch(request).await?;
        let PlaygroundSnapshot {
            variants,
            dirty_states,
            data_ref,
            ..
        } = &mut next;
        for variant in variants.iter() {
            let kept = current
                .as_deref()
                .and_then(|c| c.variant(&variant.id))
                .is_some_and(|old| Arc::ptr_eq(old, variant));
            if kept && data_ref.contains_key(&variant.id) {
                continue;
            }
            data_ref.insert(variant.id.clone(), Arc::clone(variant));
            dirty_states.insert(variant.id.clone(), false);
        }
        Ok(next)
    }
}

impl PlaygroundHandle {
    pub fn is_dirty(&self) -> Result<bool> {
        self.scope.track(ValueReference::IsDirty)?;
        let id = self
            .scope
            .variant_id()
            .ok_or_else(|| StateError::usage("isDirty requires a variant id"))?;
        Ok(self.snapshot.as_ref().is_some_and(|s| s.is_dirty(id)))
    }

    /// Force the flag. Clearing it also makes the current variant the baseline.
    pub async fn set_is_dirty(&self, dirty: bool) -> Result<MutationOutcome> {
        self.scope
            .tracker
            .check_invalid_selector(&ValueReference::IsDirty)?;
        let id = self
            .scope
            .variant_id()
            .cloned()
            .ok_or_else(|| StateError::usage("isDirty requires a variant id"))?;
        self.engine
            .commit(
                move |mut draft| async move {
                    let variant = draft
                        .variant(&id)
                        .cloned()
                        .ok_or_else(|| StateError::usage(format!("variant {id} is not loaded")))?;
                    if !dirty {
                        draft.data_ref.insert(id.clone(), variant);
                    }
                    draft.dirty_states.insert(id, dirty);
                    Ok(Draft::Apply(draft))
                },
                MutateOptions::default(),
            )
            .await
    }
}
