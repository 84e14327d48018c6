//! Debounced editing of one variant property.

use std::sync::Mutex;
use std::sync::PoisonError;

use playground_async_utils::Debouncer;
use serde_json::Value;

use crate::errors::Result;
use crate::errors::StateError;
use crate::hook::PlaygroundHandle;
use crate::ids::NodeId;

/// Keeps a local value that updates on every keystroke and forwards it to
/// [`PlaygroundHandle::update_property`] once per quiet window.
///
/// Dropping the editor flushes any pending edit.
pub struct PropertyEditor {
    property_id: NodeId,
    local: Mutex<Value>,
    debouncer: Debouncer<Value>,
}

impl PropertyEditor {
    pub fn new(handle: &PlaygroundHandle, property_id: NodeId) -> Result<Self> {
        let variant = handle
            .variant()?
            .ok_or_else(|| StateError::usage("property editor needs a loaded variant"))?;
        let initial = variant
            .property_value(property_id)
            .ok_or_else(|| StateError::usage(format!("property {property_id} not found")))?;

        let sink_handle = handle.clone();
        let debouncer = Debouncer::new(handle.config().editor.debounce_window(), move |value| {
            let handle = sink_handle.clone();
            async move {
                if let Err(err) = handle.update_property(property_id, value).await {
                    tracing::warn!(
                        property_id = %property_id,
                        error = %err,
                        "debounced property update failed"
                    );
                    handle.notifier().error(err.to_string());
                }
            }
        });

        Ok(Self {
            property_id,
            local: Mutex::new(initial),
            debouncer,
        })
    }

    pub fn property_id(&self) -> NodeId {
        self.property_id
    }

    /// The value as last typed, which may be ahead of the cache.
    pub fn value(&self) -> Value {
        self.local
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Must be called inside a tokio runtime.
    pub fn set(&self, value: Value) {
        *self.local.lock().unwrap_or_else(PoisonError::into_inner) = value.clone();
        self.debouncer.push(value);
    }

    pub fn has_pending(&self) -> bool {
        self.debouncer.has_pending()
    }

    /// Send the pending edit now. Returns whether one was pending.
    pub async fn flush(&self) -> bool {
        self.debouncer.flush().await
    }
}
