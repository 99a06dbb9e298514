use std::fmt;

use serde::{Deserialize, Serialize};

/// Normalized (uppercase) order identifier of the form `ORD-YYYY-NNNNNN`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowseTrigger {
    NewArrivals,
    Trending,
    Sale,
}

impl BrowseTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewArrivals => "new_arrivals",
            Self::Trending => "trending",
            Self::Sale => "sale",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::NewArrivals => "New Arrivals",
            Self::Trending => "Trending",
            Self::Sale => "Sale",
        }
    }
}

impl fmt::Display for BrowseTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    OrderLookup(OrderId),
    CatalogBrowse(BrowseTrigger),
    EscalationRequest,
    GeneralQa,
}

impl Intent {
    /// Label written to the analytics log.
    pub fn label(&self) -> &'static str {
        match self {
            Self::OrderLookup(_) => "order_tracking",
            Self::CatalogBrowse(_) => "catalog_browse",
            Self::EscalationRequest => "escalation",
            Self::GeneralQa => "qa",
        }
    }
}
