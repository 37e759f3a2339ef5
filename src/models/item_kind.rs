use serde::{Deserialize, Serialize};
use std::fmt;

/// Item record types, serialized with the ERP's internal type codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ItemKind {
    #[serde(rename = "Assembly")]
    Assembly,
    #[serde(rename = "InvtPart")]
    InventoryPart,
    #[serde(rename = "Kit")]
    Kit,
    #[serde(rename = "NonInvtPart")]
    NonInventoryPart,
    #[serde(rename = "Service")]
    Service,
}

impl ItemKind {
    /// ERP type code used by the search filters and the item tables
    pub fn code(&self) -> &'static str {
        match self {
            Self::Assembly => "Assembly",
            Self::InventoryPart => "InvtPart",
            Self::Kit => "Kit",
            Self::NonInventoryPart => "NonInvtPart",
            Self::Service => "Service",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for ItemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Assembly" => Ok(Self::Assembly),
            "InvtPart" => Ok(Self::InventoryPart),
            "Kit" => Ok(Self::Kit),
            "NonInvtPart" => Ok(Self::NonInventoryPart),
            "Service" => Ok(Self::Service),
            _ => Err(format!("Invalid item kind: {s}")),
        }
    }
}
