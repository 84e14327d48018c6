use std::sync::RwLock;

use crate::errors::Result;
use crate::errors::StateError;
use crate::ids::NodeId;
use crate::ids::VariantId;

/// A slice of the snapshot a consumer has read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueReference {
    Variants,
    VariantIds,
    DisplayedVariants,
    Inputs,
    Variant,
    VariantConfig,
    VariantConfigProperty,
    IsDirty,
    SelectedData,
    SelectedKey(String),
}

impl ValueReference {
    /// Whether accessing this slice needs a configured variant id.
    pub fn requires_variant(&self) -> bool {
        matches!(
            self,
            Self::Variant | Self::VariantConfig | Self::VariantConfigProperty | Self::IsDirty
        )
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Variants => "variants",
            Self::VariantIds => "variantIds",
            Self::DisplayedVariants => "displayedVariants",
            Self::Inputs => "inputs",
            Self::Variant => "variant",
            Self::VariantConfig => "variantConfig",
            Self::VariantConfigProperty => "variantConfigProperty",
            Self::IsDirty => "isDirty",
            Self::SelectedData => "selectedData",
            Self::SelectedKey(key) => key,
        }
    }
}

/// Records which slices one hook instance has read. Survives renders.
#[derive(Debug, Default)]
pub struct ReferenceTracker {
    references: RwLock<Vec<ValueReference>>,
    variant_id: Option<VariantId>,
    property_id: Option<NodeId>,
}

impl ReferenceTracker {
    pub fn new(variant_id: Option<VariantId>, property_id: Option<NodeId>) -> Self {
        Self {
            references: RwLock::new(Vec::new()),
            variant_id,
            property_id,
        }
    }

    pub fn variant_id(&self) -> Option<&VariantId> {
        self.variant_id.as_ref()
    }

    pub fn property_id(&self) -> Option<NodeId> {
        self.property_id
    }

    /// Record `reference`; repeated reads are no-ops.
    pub fn add_to_value_references(&self, reference: ValueReference) {
        let mut refs = self
            .references
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if !refs.contains(&reference) {
            refs.push(reference);
        }
    }

    pub fn contains(&self, reference: &ValueReference) -> bool {
        self.read().contains(reference)
    }

    pub fn references(&self) -> Vec<ValueReference> {
        self.read().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Keys read through `get(key)`.
    pub fn selected_keys(&self) -> Vec<String> {
        self.read()
            .iter()
            .filter_map(|r| match r {
                ValueReference::SelectedKey(key) => Some(key.clone()),
                _ => None,
            })
            .collect()
    }

    /// Fail when `reference` needs configuration this hook was not given.
    pub fn check_invalid_selector(&self, reference: &ValueReference) -> Result<()> {
        if reference.requires_variant() && self.variant_id.is_none() {
            return Err(StateError::usage(format!(
                "{} requires a variant id",
                reference.name()
            )));
        }
        if *reference == ValueReference::VariantConfigProperty && self.property_id.is_none() {
            return Err(StateError::usage(
                "variantConfigProperty requires a property id",
            ));
        }
        Ok(())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<ValueReference>> {
        self.references
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn references_are_deduplicated_in_order() {
        let tracker = ReferenceTracker::default();
        tracker.add_to_value_references(ValueReference::VariantIds);
        tracker.add_to_value_references(ValueReference::SelectedKey("name".into()));
        tracker.add_to_value_references(ValueReference::VariantIds);

        assert_eq!(
            tracker.references(),
            vec![
                ValueReference::VariantIds,
                ValueReference::SelectedKey("name".into())
            ]
        );
        assert_eq!(tracker.selected_keys(), vec!["name".to_string()]);
    }

    #[test]
    fn variant_scoped_reference_without_id_is_usage_error() {
        let tracker = ReferenceTracker::default();
        let err = tracker
            .check_invalid_selector(&ValueReference::Variant)
            .unwrap_err();
        assert_eq!(err.category(), crate::ErrorCategory::UsageError);
        assert!(tracker.check_invalid_selector(&ValueReference::Variants).is_ok());

        let scoped = ReferenceTracker::new(Some("a".into()), None);
        assert!(scoped.check_invalid_selector(&ValueReference::IsDirty).is_ok());
        assert!(
            scoped
                .check_invalid_selector(&ValueReference::VariantConfigProperty)
                .is_err()
        );
    }
}
