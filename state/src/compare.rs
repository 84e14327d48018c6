//! Snapshot comparators. `true` means "unchanged for this consumer".

use std::collections::BTreeSet;

use crate::ids::NodeId;
use crate::ids::VariantId;
use crate::snapshot::PlaygroundSnapshot;

/// Deep equality; absent on either side is never equal.
pub fn base_compare(a: Option<&PlaygroundSnapshot>, b: Option<&PlaygroundSnapshot>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Equal when both snapshots hold the same set of variant ids.
pub fn variants_compare(a: Option<&PlaygroundSnapshot>, b: Option<&PlaygroundSnapshot>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => {
            let ids = |s: &PlaygroundSnapshot| -> BTreeSet<VariantId> {
                s.variants.iter().map(|v| v.id.clone()).collect()
            };
            ids(a) == ids(b)
        }
        _ => base_compare(a, b),
    }
}

/// Compare one variant, or one property of it when `property_id` is given.
///
/// Falls back to [`base_compare`] when either side lacks the variant.
pub fn variant_compare(
    a: Option<&PlaygroundSnapshot>,
    b: Option<&PlaygroundSnapshot>,
    variant_id: &VariantId,
    property_id: Option<NodeId>,
) -> bool {
    let (Some(va), Some(vb)) = (
        a.and_then(|s| s.variant(variant_id)),
        b.and_then(|s| s.variant(variant_id)),
    ) else {
        return base_compare(a, b);
    };
    if std::sync::Arc::ptr_eq(va, vb) {
        return true;
    }
    match property_id {
        Some(id) => va.property_value(id) == vb.property_value(id),
        None => va == vb,
    }
}

/// Equal when the displayed-variant selection is the same.
pub fn selected_compare(a: Option<&PlaygroundSnapshot>, b: Option<&PlaygroundSnapshot>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.selected == b.selected,
        _ => base_compare(a, b),
    }
}
