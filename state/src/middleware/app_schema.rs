//! Fetches variants and the owning service's schema on a cache miss.

use std::sync::Arc;

use async_trait::async_trait;

use super::FetchRequest;
use super::Middleware;
use super::MiddlewareContext;
use super::SharedFetcher;
use super::SnapshotFetcher;
use crate::errors::Result;
use crate::errors::StateError;
use crate::schema::AppSchema;
use crate::snapshot::PlaygroundSnapshot;
use crate::variant::Variant;

pub struct AppSchemaMiddleware {
    ctx: MiddlewareContext,
}

impl AppSchemaMiddleware {
    pub fn new(ctx: MiddlewareContext) -> Self {
        Self { ctx }
    }
}

impl Middleware for AppSchemaMiddleware {
    fn name(&self) -> &'static str {
        "app_schema"
    }

    fn wrap_fetcher(&self, inner: SharedFetcher) -> SharedFetcher {
        Arc::new(AppSchemaFetcher {
            inner,
            ctx: self.ctx.clone(),
        })
    }
}

struct AppSchemaFetcher {
    inner: SharedFetcher,
    ctx: MiddlewareContext,
}

#[async_trait]
impl SnapshotFetcher for AppSchemaFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<PlaygroundSnapshot> {
        if !request.force
            && let Some(current) = &request.current
        {
            tracing::debug!(key = %request.key, "cache hit, skipping fetch");
            return Ok((**current).clone());
        }

        let key = request.key.clone();
        let current = request.current.clone();
        let mut next = self.inner.fetch(request).await?;

        let raw = self
            .ctx
            .api
            .fetch_variants(&key)
            .await
            .map_err(|e| StateError::remote("fetch variants", e))?;

        let schema = if raw.is_empty() {
            None
        } else {
            let uri = raw
                .iter()
                .find_map(|r| r.uri.as_deref())
                .ok_or_else(|| StateError::schema(format!("no service uri for {key}")))?;
            let document = self
                .ctx
                .api
                .fetch_schema(uri)
                .await
                .map_err(|e| StateError::remote("fetch app schema", e))?;
            Some(Arc::new(AppSchema::from_openapi(&document)?))
        };

        let variants = raw
            .iter()
            .map(|r| {
                self.ctx
                    .transformer
                    .transform(r, schema.as_deref())
                    .map(|fetched| reconcile(current.as_deref(), Arc::new(fetched)))
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(key = %key, variants = variants.len(), "fetched playground variants");
        next.variants = variants;
        next.schema = schema;
        Ok(next)
    }
}

/// Pick between the cached and the freshly fetched copy of a variant.
///
/// The cached `Arc` wins when it holds unsaved edits or when the server copy
/// still matches the synced baseline, so node ids stay valid across a forced
/// refetch.
fn reconcile(current: Option<&PlaygroundSnapshot>, fetched: Arc<Variant>) -> Arc<Variant> {
    let Some(current) = current else {
        return fetched;
    };
    let Some(cached) = current.variant(&fetched.id) else {
        return fetched;
    };
    let baseline = current.data_ref.get(&fetched.id).unwrap_or(cached);
    if current.is_dirty(&fetched.id) || same_on_server(baseline, &fetched) {
        return Arc::clone(cached);
    }
    tracing::debug!(variant_id = %fetched.id, "variant changed on server");
    fetched
}

fn same_on_server(synced: &Variant, fetched: &Variant) -> bool {
    synced.variant_name == fetched.variant_name
        && synced.revision == fetched.revision
        && synced.to_parameters() == fetched.to_parameters()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PromptTransformer;
    use crate::schema::VariantTransformer;
    use crate::snapshot::test_support::two_variant_snapshot;
    use crate::variant::test_support::raw_variant;

    fn fresh(id: &str, name: &str, template: &str) -> Arc<Variant> {
        Arc::new(
            PromptTransformer
                .transform(&raw_variant(id, name, template), None)
                .unwrap(),
        )
    }

    #[test]
    fn unchanged_server_copy_keeps_cached_ids() {
        let current = two_variant_snapshot();
        let cached = Arc::clone(&current.variants[0]);
        let fetched = fresh("a", "v-a", "Capital of {country}?");

        let kept = reconcile(Some(&current), fetched);
        assert!(Arc::ptr_eq(&kept, &cached));
    }

    #[test]
    fn dirty_variant_survives_server_change() {
        let mut current = two_variant_snapshot();
        let id = current.variants[0].id.clone();
        current.variant_mut(&id).unwrap().variant_name = "local edit".into();
        current.dirty_states.insert(id.clone(), true);
        let fetched = fresh(id.as_str(), "renamed on server", "{q}");

        let kept = reconcile(Some(&current), fetched);
        assert_eq!(kept.variant_name, "local edit");
    }

    #[test]
    fn clean_variant_takes_server_change() {
        let current = two_variant_snapshot();
        let id = current.variants[0].id.clone();
        let fetched = fresh(id.as_str(), "renamed on server", "{q}");

        let taken = reconcile(Some(&current), Arc::clone(&fetched));
        assert!(Arc::ptr_eq(&taken, &fetched));
    }
}
