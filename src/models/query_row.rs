use serde::{Deserialize, Serialize};

use super::ItemKind;

/// One grouped result row from the item availability query.
///
/// `buildable_quantity` is computed by the source: the minimum, across the
/// item's qualifying components, of the rounded ratio between component
/// availability and the quantity required per unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRow {
    pub entity_id: String,
    /// SKU; unique per item and used as the batch result key
    pub business_key: String,
    pub kind: ItemKind,
    pub display_name: String,
    pub available_quantity: u32,
    pub minimum_threshold: u32,
    pub buildable_quantity: u32,
}

impl QueryRow {
    pub fn is_below_minimum(&self) -> bool {
        self.available_quantity < self.minimum_threshold
    }
}
