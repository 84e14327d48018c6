//! Consumer entry points.
//!
//! A [`PlaygroundHook`] is one consumer's long-lived attachment to a cache
//! key: it owns the consumer's reference tracker and cache subscription.
//! [`PlaygroundHook::render`] produces a [`PlaygroundHandle`], whose
//! accessors record which slices were read. [`PlaygroundHook::has_changed`]
//! then reports only changes to those slices.

use std::sync::Arc;

use tokio::sync::watch;

use crate::api::PlaygroundApi;
use crate::cache::CacheSubscription;
use crate::cache::SnapshotCache;
use crate::config::PlaygroundConfig;
use crate::errors::Result;
use crate::errors::StateError;
use crate::ids::NodeId;
use crate::ids::ResourceKey;
use crate::ids::VariantId;
use crate::middleware::HookScope;
use crate::middleware::MiddlewareContext;
use crate::middleware::Pipeline;
use crate::mutation::MutateOptions;
use crate::mutation::MutationEngine;
use crate::mutation::MutationOutcome;
use crate::notify::Notifier;
use crate::references::ReferenceTracker;
use crate::references::ValueReference;
use crate::schema::PromptTransformer;
use crate::schema::VariantTransformer;
use crate::selector::SelectedData;
use crate::selector::Selector;
use crate::snapshot::PlaygroundSnapshot;
use crate::snapshot::SnapshotPatch;

/// Per-hook configuration.
#[derive(Debug, Clone, Default)]
pub struct PlaygroundOptions {
    pub variant_id: Option<VariantId>,
    pub property_id: Option<NodeId>,
    pub selector: Option<Selector>,
}

impl PlaygroundOptions {
    pub fn for_variant(variant_id: impl Into<VariantId>) -> Self {
        Self {
            variant_id: Some(variant_id.into()),
            ..Self::default()
        }
    }

    pub fn with_property(mut self, property_id: NodeId) -> Self {
        self.property_id = Some(property_id);
        self
    }

    pub fn with_selector(mut self, selector: Selector) -> Self {
        self.selector = Some(selector);
        self
    }
}

pub(crate) struct Services {
    pub(crate) api: Arc<dyn PlaygroundApi>,
    pub(crate) transformer: Arc<dyn VariantTransformer>,
    pub(crate) notifier: Notifier,
    pub(crate) config: PlaygroundConfig,
}

/// Shared state of the playground: the cache, the middleware pipeline, and
/// the services both use.
#[derive(Clone)]
pub struct Playground {
    cache: Arc<SnapshotCache>,
    pipeline: Arc<Pipeline>,
    services: Arc<Services>,
}

impl Playground {
    pub fn new(api: Arc<dyn PlaygroundApi>, config: PlaygroundConfig) -> Self {
        Self::with_parts(api, Arc::new(PromptTransformer), SnapshotCache::new(), config)
    }

    pub fn with_parts(
        api: Arc<dyn PlaygroundApi>,
        transformer: Arc<dyn VariantTransformer>,
        cache: Arc<SnapshotCache>,
        config: PlaygroundConfig,
    ) -> Self {
        let pipeline = Pipeline::build(MiddlewareContext {
            api: Arc::clone(&api),
            transformer: Arc::clone(&transformer),
        });
        let notifier = Notifier::with_capacity(config.notifications.capacity);
        Self {
            cache,
            pipeline: Arc::new(pipeline),
            services: Arc::new(Services {
                api,
                transformer,
                notifier,
                config,
            }),
        }
    }

    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.cache
    }

    pub fn notifier(&self) -> &Notifier {
        &self.services.notifier
    }

    pub fn config(&self) -> &PlaygroundConfig {
        &self.services.config
    }

    /// Attach a consumer to `key`.
    pub fn use_playground(
        &self,
        key: &ResourceKey,
        options: PlaygroundOptions,
    ) -> Result<PlaygroundHook> {
        if options.selector.as_ref().is_some_and(Selector::requires_variant)
            && options.variant_id.is_none()
        {
            return Err(StateError::usage("variant selector requires a variant id"));
        }
        let subscription = self.cache.subscribe(key);
        let entry = Arc::clone(subscription.entry());
        let changes = entry.changes();
        let engine = MutationEngine::new(
            entry,
            Arc::clone(&self.pipeline),
            self.services.notifier.clone(),
        );
        let scope = HookScope::new(
            ReferenceTracker::new(options.variant_id, options.property_id),
            options.selector,
        );
        tracing::debug!(key = %key, "playground hook attached");
        Ok(PlaygroundHook {
            key: key.clone(),
            engine: Arc::new(engine),
            scope: Arc::new(scope),
            services: Arc::clone(&self.services),
            changes,
            rendered: None,
            mounted: false,
            pending: false,
            load_error: None,
            _subscription: subscription,
        })
    }

    /// Hook whose selector yields `variantIds`.
    pub fn use_playground_variants(&self, key: &ResourceKey) -> Result<PlaygroundHook> {
        self.use_playground(
            key,
            PlaygroundOptions::default().with_selector(Selector::state(|s| {
                let mut out = SelectedData::new();
                out.insert(
                    "variantIds".to_string(),
                    serde_json::json!(s.variant_ids()),
                );
                out
            })),
        )
    }

    /// Hook over an arbitrary state selector.
    pub fn use_playground_state(
        &self,
        key: &ResourceKey,
        selector: impl Fn(&PlaygroundSnapshot) -> SelectedData + Send + Sync + 'static,
    ) -> Result<PlaygroundHook> {
        self.use_playground(
            key,
            PlaygroundOptions::default().with_selector(Selector::state(selector)),
        )
    }
}

pub struct PlaygroundHook {
    key: ResourceKey,
    engine: Arc<MutationEngine>,
    scope: Arc<HookScope>,
    services: Arc<Services>,
    changes: watch::Receiver<Option<Arc<PlaygroundSnapshot>>>,
    rendered: Option<Arc<PlaygroundSnapshot>>,
    mounted: bool,
    pending: bool,
    load_error: Option<StateError>,
    _subscription: CacheSubscription,
}

impl PlaygroundHook {
    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    /// Produce the current handle, loading the key on first render when the
    /// cache is empty. Fetch failures are notified and exposed through
    /// [`PlaygroundHandle::load_error`].
    pub async fn render(&mut self) -> PlaygroundHandle {
        if !self.mounted {
            self.mounted = true;
            let cached = self.engine.entry().current().is_some();
            if !cached || self.engine.pipeline().revalidate_on_mount(&self.scope) {
                self.load(cached).await;
            }
        }
        self.rendered = self.changes.borrow_and_update().clone();
        self.pending = false;
        PlaygroundHandle {
            snapshot: self.rendered.clone(),
            scope: Arc::clone(&self.scope),
            engine: Arc::clone(&self.engine),
            services: Arc::clone(&self.services),
            load_error: self.load_error.clone(),
        }
    }

    async fn load(&mut self, force: bool) -> bool {
        match self.engine.load(force).await {
            Ok(_) => {
                self.load_error = None;
                true
            }
            Err(err) => {
                self.load_error = Some(err);
                false
            }
        }
    }

    /// Refetch from the server. Returns whether the fetch succeeded.
    pub async fn refresh(&mut self) -> bool {
        self.load(true).await
    }

    fn observe(&mut self) {
        let latest = self.changes.borrow_and_update().clone();
        if !self
            .engine
            .pipeline()
            .compare(self.rendered.as_ref(), latest.as_ref(), &self.scope)
        {
            self.pending = true;
        }
    }

    /// Whether a slice read during the last render has changed since.
    pub fn has_changed(&mut self) -> bool {
        if self.changes.has_changed().unwrap_or(false) {
            self.observe();
        }
        self.pending
    }

    /// Wait until [`has_changed`](Self::has_changed) would return `true`.
    pub async fn wait_for_change(&mut self) -> bool {
        loop {
            if self.has_changed() {
                return true;
            }
            if self.changes.changed().await.is_err() {
                return false;
            }
            self.observe();
        }
    }

    pub fn references(&self) -> Vec<ValueReference> {
        self.scope.tracker.references()
    }
}

/// What one render of a hook returns. Cheap to clone.
#[derive(Clone)]
pub struct PlaygroundHandle {
    pub(crate) snapshot: Option<Arc<PlaygroundSnapshot>>,
    pub(crate) scope: Arc<HookScope>,
    pub(crate) engine: Arc<MutationEngine>,
    pub(crate) services: Arc<Services>,
    load_error: Option<StateError>,
}

impl PlaygroundHandle {
    /// Snapshot this handle was rendered from. Reading it records nothing.
    pub fn snapshot(&self) -> Option<&Arc<PlaygroundSnapshot>> {
        self.snapshot.as_ref()
    }

    pub fn load_error(&self) -> Option<&StateError> {
        self.load_error.as_ref()
    }

    pub fn notifier(&self) -> &Notifier {
        &self.services.notifier
    }

    pub fn config(&self) -> &PlaygroundConfig {
        &self.services.config
    }

    pub async fn mutate<F>(&self, updater: F, options: MutateOptions) -> Result<MutationOutcome>
    where
        F: FnOnce(PlaygroundSnapshot) -> PlaygroundSnapshot + Send,
    {
        self.engine.mutate(updater, options).await
    }

    pub async fn mutate_async<F, Fut>(
        &self,
        updater: F,
        options: MutateOptions,
    ) -> Result<MutationOutcome>
    where
        F: FnOnce(PlaygroundSnapshot) -> Fut + Send,
        Fut: std::future::Future<Output = Result<PlaygroundSnapshot>> + Send,
    {
        self.engine.mutate_async(updater, options).await
    }

    pub async fn mutate_patch(
        &self,
        patch: SnapshotPatch,
        options: MutateOptions,
    ) -> Result<MutationOutcome> {
        self.engine.mutate_patch(patch, options).await
    }
}
