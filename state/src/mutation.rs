//! Optimistic local mutation and (re)fetch of one cache entry.
//!
//! Updaters receive an owned copy of the current snapshot. Because variants
//! are `Arc`-shared, the copy is shallow and only variants touched through
//! [`PlaygroundSnapshot::variant_mut`] are cloned; the published snapshot is
//! never modified in place.

use std::future::Future;
use std::sync::Arc;

use crate::cache::CacheEntry;
use crate::errors::Result;
use crate::errors::StateError;
use crate::middleware::FetchRequest;
use crate::middleware::Pipeline;
use crate::notify::Notifier;
use crate::snapshot::PlaygroundSnapshot;
use crate::snapshot::SnapshotPatch;

/// What an updater decided to do with its draft.
#[derive(Debug)]
pub enum Draft {
    Apply(PlaygroundSnapshot),
    /// Keep the pre-mutation snapshot.
    Rollback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// A new snapshot was published.
    Applied,
    /// The draft equalled the current snapshot; nothing was published.
    Unchanged,
    /// A remote call failed; the cache keeps its previous value.
    RolledBack,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutateOptions {
    /// Re-run the fetcher chain after publishing.
    pub revalidate: bool,
}

/// Log and notify a caught remote/schema failure, and discard the draft.
pub(crate) fn rollback(notifier: &Notifier, err: StateError) -> Draft {
    tracing::warn!(category = err.category().as_str(), error = %err, "mutation rolled back");
    notifier.error(err.to_string());
    Draft::Rollback
}

pub struct MutationEngine {
    entry: Arc<CacheEntry>,
    pipeline: Arc<Pipeline>,
    notifier: Notifier,
}

impl MutationEngine {
    pub fn new(entry: Arc<CacheEntry>, pipeline: Arc<Pipeline>, notifier: Notifier) -> Self {
        Self {
            entry,
            pipeline,
            notifier,
        }
    }

    pub fn entry(&self) -> &Arc<CacheEntry> {
        &self.entry
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    /// Populate the entry. Without `force`, a loader that finds the entry
    /// already filled (for instance by a concurrent loader it waited on)
    /// returns the cached snapshot without fetching.
    pub async fn load(&self, force: bool) -> Result<Option<Arc<PlaygroundSnapshot>>> {
        let _guard = self.entry.write_lock().await;
        if !force && let Some(current) = self.entry.current() {
            return Ok(Some(current));
        }
        self.fetch_and_publish(force).await?;
        Ok(self.entry.current())
    }

    async fn fetch_and_publish(&self, force: bool) -> Result<()> {
        let key = self.entry.key().clone();
        let request = FetchRequest {
            key: key.clone(),
            current: self.entry.current(),
            force,
        };
        match self.pipeline.fetch(request).await {
            Ok(snapshot) => {
                self.entry.publish(Arc::new(snapshot));
                Ok(())
            }
            Err(err) => {
                tracing::warn!(
                    key = %key,
                    category = err.category().as_str(),
                    error = %err,
                    "playground fetch failed"
                );
                if err.category().caught_at_boundary() {
                    self.notifier.error(err.to_string());
                }
                Err(err)
            }
        }
    }

    /// Run `updater` against the current snapshot and publish its draft.
    ///
    /// Calls for one key are serialized. An `Err` from the updater leaves the
    /// cache untouched and is returned to the caller.
    pub async fn commit<F, Fut>(
        &self,
        updater: F,
        options: MutateOptions,
    ) -> Result<MutationOutcome>
    where
        F: FnOnce(PlaygroundSnapshot) -> Fut + Send,
        Fut: Future<Output = Result<Draft>> + Send,
    {
        let _guard = self.entry.write_lock().await;
        let current = self.entry.current();
        let draft = current.as_deref().cloned().unwrap_or_default();

        let mut next = match updater(draft).await? {
            Draft::Apply(next) => next,
            Draft::Rollback => return Ok(MutationOutcome::RolledBack),
        };
        self.pipeline.after_mutate(current.as_deref(), &mut next);

        let outcome = if self.entry.publish(Arc::new(next)) {
            MutationOutcome::Applied
        } else {
            MutationOutcome::Unchanged
        };
        tracing::debug!(key = %self.entry.key(), ?outcome, "mutation committed");

        if options.revalidate {
            // Failures are already logged and notified; the optimistic value stays.
            let _ = self.fetch_and_publish(true).await;
        }
        Ok(outcome)
    }

    pub async fn mutate<F>(&self, updater: F, options: MutateOptions) -> Result<MutationOutcome>
    where
        F: FnOnce(PlaygroundSnapshot) -> PlaygroundSnapshot + Send,
    {
        self.commit(
            |draft| async move { Ok(Draft::Apply(updater(draft))) },
            options,
        )
        .await
    }

    pub async fn mutate_async<F, Fut>(
        &self,
        updater: F,
        options: MutateOptions,
    ) -> Result<MutationOutcome>
    where
        F: FnOnce(PlaygroundSnapshot) -> Fut + Send,
        Fut: Future<Output = Result<PlaygroundSnapshot>> + Send,
    {
        self.commit(
            |draft| async move { updater(draft).await.map(Draft::Apply) },
            options,
        )
        .await
    }

    pub async fn mutate_patch(
        &self,
        patch: SnapshotPatch,
        options: MutateOptions,
    ) -> Result<MutationOutcome> {
        self.mutate(|draft| patch.apply(draft), options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SnapshotCache;
    use crate::ids::ResourceKey;
    use crate::middleware::test_support::offline_pipeline;
    use crate::snapshot::test_support::two_variant_snapshot;
    use pretty_assertions::assert_eq;

    fn engine_with(
        snapshot: PlaygroundSnapshot,
    ) -> (crate::cache::CacheSubscription, MutationEngine) {
        let cache = SnapshotCache::new();
        let sub = cache.subscribe(&ResourceKey::variants("app", "proj"));
        sub.entry().publish(Arc::new(snapshot));
        let engine = MutationEngine::new(
            Arc::clone(sub.entry()),
            Arc::new(offline_pipeline()),
            Notifier::with_capacity(8),
        );
        (sub, engine)
    }

    #[tokio::test]
    async fn published_snapshot_is_never_touched() {
        let (_sub, engine) = engine_with(two_variant_snapshot());
        let before = engine.entry().current().unwrap();

        let outcome = engine
            .mutate(
                |mut s| {
                    s.variant_mut(&"a".into()).unwrap().variant_name = "edited".into();
                    s
                },
                MutateOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(outcome, MutationOutcome::Applied);
        assert_eq!(before.variants[0].variant_name, "v-a");
        let after = engine.entry().current().unwrap();
        assert_eq!(after.variants[0].variant_name, "edited");
        assert!(Arc::ptr_eq(&before.variants[1], &after.variants[1]));
    }

    #[tokio::test]
    async fn failing_async_updater_keeps_prior_value() {
        let (_sub, engine) = engine_with(two_variant_snapshot());
        let before = engine.entry().current().unwrap();

        let err = engine
            .mutate_async(
                |_draft| async { Err(StateError::internal("draft failed")) },
                MutateOptions::default(),
            )
            .await
            .unwrap_err();

        assert_eq!(err, StateError::internal("draft failed"));
        assert!(Arc::ptr_eq(&before, &engine.entry().current().unwrap()));
    }

    #[tokio::test]
    async fn identical_draft_is_not_published() {
        let (_sub, engine) = engine_with(two_variant_snapshot());
        let mut rx = engine.entry().changes();

        let outcome = engine.mutate(|s| s, MutateOptions::default()).await.unwrap();
        assert_eq!(outcome, MutationOutcome::Unchanged);
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn patch_replaces_only_given_fields() {
        let (_sub, engine) = engine_with(two_variant_snapshot());
        engine
            .mutate_patch(
                SnapshotPatch {
                    selected: Some(vec!["b".into()]),
                    ..SnapshotPatch::default()
                },
                MutateOptions::default(),
            )
            .await
            .unwrap();

        let after = engine.entry().current().unwrap();
        assert_eq!(after.selected, vec![crate::ids::VariantId::from("b")]);
        assert_eq!(after.variants.len(), 2);
    }

    #[tokio::test]
    async fn rollback_draft_reports_rolled_back() {
        let (_sub, engine) = engine_with(two_variant_snapshot());
        let notifier = Notifier::with_capacity(4);
        let outcome = engine
            .commit(
                |_draft| async {
                    Ok(rollback(
                        &notifier,
                        StateError::remote(
                            "delete variant",
                            crate::errors::ApiError::Status {
                                status: 500,
                                message: "boom".into(),
                            },
                        ),
                    ))
                },
                MutateOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(outcome, MutationOutcome::RolledBack);
        assert_eq!(notifier.recent().len(), 1);
    }
}
