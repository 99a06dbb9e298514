use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    Received,
    Classified,
    OrderLookup,
    CatalogBrowse,
    Escalating,
    Answering,
    /// Canned reply with no lookup or generation, e.g. the help button.
    FixedReply,
    VisualSearch,
    Logged,
    Replied,
    Fallback,
}

impl TurnState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Replied | Self::Fallback)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Classified => "classified",
            Self::OrderLookup => "order_lookup",
            Self::CatalogBrowse => "catalog_browse",
            Self::Escalating => "escalating",
            Self::Answering => "answering",
            Self::FixedReply => "fixed_reply",
            Self::VisualSearch => "visual_search",
            Self::Logged => "logged",
            Self::Replied => "replied",
            Self::Fallback => "fallback",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnEvent {
    Classify,
    RouteOrderLookup,
    RouteCatalogBrowse,
    RouteEscalation,
    RouteAnswer,
    RouteFixedReply,
    RouteVisualSearch,
    LowConfidence,
    RecordAnalytics,
    DeliverReply,
    Fail,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnAction {
    LookupOrder,
    BrowseCatalog,
    NotifyHuman,
    GenerateAnswer,
    AnalyzeImage,
    WriteAnalytics,
    SendReply,
    SendFallbackMenu,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: TurnState,
    pub to: TurnState,
    pub event: TurnEvent,
    pub actions: Vec<TurnAction>,
}
