use proptest::prelude::*;

/// (available, minimum) pairs around the threshold
pub fn quantity_pair_strategy() -> impl Strategy<Value = (u32, u32)> {
    prop_oneof![
        (0u32..50, 0u32..50),
        (0u32..1000).prop_map(|q| (q, q)),
        (0u32..1000).prop_map(|q| (q, q + 1)),
    ]
}

/// Catalog assembly specs: (available, minimum, has_marker)
pub fn assembly_specs_strategy() -> impl Strategy<Value = Vec<(u32, u32, bool)>> {
    prop::collection::vec((0u32..20, 0u32..20, prop::bool::weighted(0.2)), 0..40)
}
