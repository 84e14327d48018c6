use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Server-assigned variant identifier (opaque).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantId(String);

impl VariantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VariantId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for VariantId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Stable identity of an Enhanced node. Survives edits and reorders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Cache identity of one app's variant list.
///
/// Two hooks built from the same app and project share a single snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    app_id: String,
    project_id: String,
    key: String,
}

impl ResourceKey {
    pub fn variants(app_id: impl Into<String>, project_id: impl Into<String>) -> Self {
        let app_id = app_id.into();
        let project_id = project_id.into();
        let key = format!("/api/apps/{app_id}/variants?project_id={project_id}&v=2");
        Self {
            app_id,
            project_id,
            key,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn resource_key_format() {
        let key = ResourceKey::variants("app-1", "proj-9");
        assert_eq!(key.as_str(), "/api/apps/app-1/variants?project_id=proj-9&v=2");
        assert_eq!(key, ResourceKey::variants("app-1", "proj-9"));
        assert_ne!(key, ResourceKey::variants("app-2", "proj-9"));
    }

    #[test]
    fn node_ids_are_unique() {
        assert_ne!(NodeId::new(), NodeId::new());
    }
}
