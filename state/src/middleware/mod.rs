//! Composable layers around the playground cache.
//!
//! Each layer can wrap the fetcher, claim a slice of the snapshot for change
//! detection, veto revalidation on mount, and post-process every mutation.
//! [`Pipeline::build`] stacks them in a fixed order, innermost first:
//! variants, variant, app schema, dirty tracking, selector.

pub mod app_schema;
pub mod dirty;
pub mod selector;
pub mod variant;
pub mod variants;

use std::sync::Arc;

use async_trait::async_trait;

use crate::api::PlaygroundApi;
use crate::compare::base_compare;
use crate::errors::Result;
use crate::ids::ResourceKey;
use crate::ids::VariantId;
use crate::references::ReferenceTracker;
use crate::references::ValueReference;
use crate::schema::VariantTransformer;
use crate::selector::Selector;
use crate::selector::SelectorMemo;
use crate::snapshot::PlaygroundSnapshot;

/// Input of one pass through the fetcher chain.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub key: ResourceKey,
    /// Snapshot cached for `key` when the fetch started.
    pub current: Option<Arc<PlaygroundSnapshot>>,
    /// Bypass the cache-hit short circuit.
    pub force: bool,
}

#[async_trait]
pub trait SnapshotFetcher: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<PlaygroundSnapshot>;
}

pub type SharedFetcher = Arc<dyn SnapshotFetcher>;

/// Innermost fetcher: the cached snapshot, or an empty one.
struct SeedFetcher;

#[async_trait]
impl SnapshotFetcher for SeedFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<PlaygroundSnapshot> {
        Ok(request.current.as_deref().cloned().unwrap_or_default())
    }
}

/// Per-hook state the layers consult when comparing.
#[derive(Debug, Default)]
pub struct HookScope {
    pub tracker: ReferenceTracker,
    pub selector: Option<Selector>,
    pub memo: SelectorMemo,
}

impl HookScope {
    pub fn new(tracker: ReferenceTracker, selector: Option<Selector>) -> Self {
        Self {
            tracker,
            selector,
            memo: SelectorMemo::default(),
        }
    }

    pub fn variant_id(&self) -> Option<&VariantId> {
        self.tracker.variant_id()
    }

    /// Record `reference` after checking the hook is configured for it.
    pub fn track(&self, reference: ValueReference) -> Result<()> {
        self.tracker.check_invalid_selector(&reference)?;
        self.tracker.add_to_value_references(reference);
        Ok(())
    }
}

/// Services available to layers when the pipeline is built.
#[derive(Clone)]
pub struct MiddlewareContext {
    pub api: Arc<dyn PlaygroundApi>,
    pub transformer: Arc<dyn VariantTransformer>,
}

pub trait Middleware: Send + Sync {
    fn name(&self) -> &'static str;

    fn wrap_fetcher(&self, inner: SharedFetcher) -> SharedFetcher {
        inner
    }

    /// `None` when the hook read nothing this layer owns.
    fn compare(
        &self,
        _prev: Option<&Arc<PlaygroundSnapshot>>,
        _next: Option<&Arc<PlaygroundSnapshot>>,
        _scope: &HookScope,
    ) -> Option<bool> {
        None
    }

    fn revalidate_on_mount(&self, _scope: &HookScope) -> Option<bool> {
        None
    }

    /// Runs on every draft before it is published, and on every fetch result.
    fn after_mutate(&self, _prev: Option<&PlaygroundSnapshot>, _next: &mut PlaygroundSnapshot) {}
}

pub struct Pipeline {
    layers: Vec<Arc<dyn Middleware>>,
    fetcher: SharedFetcher,
}

impl Pipeline {
    pub fn build(ctx: MiddlewareContext) -> Self {
        let layers: Vec<Arc<dyn Middleware>> = vec![
            Arc::new(variants::VariantsMiddleware),
            Arc::new(variant::VariantMiddleware),
            Arc::new(app_schema::AppSchemaMiddleware::new(ctx)),
            Arc::new(dirty::DirtyMiddleware),
            Arc::new(selector::SelectorMiddleware),
        ];
        Self::from_layers(layers)
    }

    pub fn from_layers(layers: Vec<Arc<dyn Middleware>>) -> Self {
        let fetcher = layers
            .iter()
            .fold(Arc::new(SeedFetcher) as SharedFetcher, |inner, layer| {
                layer.wrap_fetcher(inner)
            });
        Self { layers, fetcher }
    }

    pub fn layer_names(&self) -> Vec<&'static str> {
        self.layers.iter().map(|l| l.name()).collect()
    }

    /// Run the fetcher chain and normalize the result like a mutation.
    pub async fn fetch(&self, request: FetchRequest) -> Result<PlaygroundSnapshot> {
        let current = request.current.clone();
        let mut next = self.fetcher.fetch(request).await?;
        self.after_mutate(current.as_deref(), &mut next);
        Ok(next)
    }

    pub fn after_mutate(&self, prev: Option<&PlaygroundSnapshot>, next: &mut PlaygroundSnapshot) {
        next.prune_stale();
        for layer in &self.layers {
            layer.after_mutate(prev, next);
        }
    }

    /// `true` when nothing this hook read has changed.
    pub fn compare(
        &self,
        prev: Option<&Arc<PlaygroundSnapshot>>,
        next: Option<&Arc<PlaygroundSnapshot>>,
        scope: &HookScope,
    ) -> bool {
        let verdicts: Vec<bool> = self
            .layers
            .iter()
            .filter_map(|l| l.compare(prev, next, scope))
            .collect();
        if verdicts.is_empty() {
            return base_compare(prev.map(Arc::as_ref), next.map(Arc::as_ref));
        }
        verdicts.into_iter().all(|unchanged| unchanged)
    }

    pub fn revalidate_on_mount(&self, scope: &HookScope) -> bool {
        self.layers
            .iter()
            .filter_map(|l| l.revalidate_on_mount(scope))
            .all(|revalidate| revalidate)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use super::test_support::offline_pipeline;
    use crate::snapshot::test_support::two_variant_snapshot;
    use pretty_assertions::assert_eq;

    #[test]
    fn layers_stack_in_fixed_order() {
        assert_eq!(
            offline_pipeline().layer_names(),
            vec!["variants", "variant", "app_schema", "dirty", "selector"]
        );
    }

    #[test]
    fn unclaimed_compare_falls_back_to_deep_equality() {
        let pipeline = offline_pipeline();
        let scope = HookScope::default();
        let a = Arc::new(two_variant_snapshot());
        let b = Arc::new((*a).clone());
        assert!(pipeline.compare(Some(&a), Some(&b), &scope));

        let mut c = (*a).clone();
        c.selected.pop();
        assert!(!pipeline.compare(Some(&a), Some(&Arc::new(c)), &scope));
    }

    #[test]
    fn claimed_slice_ignores_unrelated_changes() {
        let pipeline = offline_pipeline();
        let scope = HookScope::default();
        scope.track(ValueReference::VariantIds).unwrap();

        let a = Arc::new(two_variant_snapshot());
        let mut b = (*a).clone();
        b.variant_mut(&"a".into()).unwrap().variant_name = "renamed".into();
        assert!(pipeline.compare(Some(&a), Some(&Arc::new(b)), &scope));
    }

    #[test]
    fn revalidate_on_mount_needs_variant_list_reference() {
        let pipeline = offline_pipeline();
        let scope = HookScope::default();
        assert!(!pipeline.revalidate_on_mount(&scope));

        scope.track(ValueReference::VariantIds).unwrap();
        assert!(pipeline.revalidate_on_mount(&scope));
    }

    #[tokio::test]
    async fn cache_hit_fetch_returns_current_snapshot() {
        let pipeline = offline_pipeline();
        let current = Arc::new(two_variant_snapshot());
        let fetched = pipeline
            .fetch(FetchRequest {
                key: ResourceKey::variants("app", "proj"),
                current: Some(Arc::clone(&current)),
                force: false,
            })
            .await
            .unwrap();
        assert_eq!(fetched, *current);
    }
}
