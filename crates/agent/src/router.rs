use std::sync::OnceLock;

use regex::Regex;

use concierge_core::domain::intent::{BrowseTrigger, Intent, OrderId};

use crate::escalation::detect_escalation_request;

const BROWSE_VOCABULARY: &[(BrowseTrigger, &[&str])] = &[
    (BrowseTrigger::NewArrivals, &["new arrivals", "newest", "just in", "latest"]),
    (BrowseTrigger::Trending, &["trending", "popular", "best seller", "top rated"]),
    (BrowseTrigger::Sale, &["sale", "discount", "clearance", "deal"]),
];

fn order_id_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)ORD-\d{4}-\d{6}").ok()).as_ref()
}

/// Deterministic, first-match-wins classifier for inbound text.
#[derive(Clone, Debug, Default)]
pub struct IntentRouter;

impl IntentRouter {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, text: &str) -> Intent {
        if let Some(order_id) = extract_order_id(text) {
            return Intent::OrderLookup(order_id);
        }

        let normalized_text = normalize_text(text);
        if let Some(trigger) = extract_browse_trigger(&normalized_text) {
            return Intent::CatalogBrowse(trigger);
        }

        if detect_escalation_request(text) {
            return Intent::EscalationRequest;
        }

        Intent::GeneralQa
    }
}

pub fn extract_order_id(text: &str) -> Option<OrderId> {
    order_id_pattern()?.find(text).map(|found| OrderId(found.as_str().to_ascii_uppercase()))
}

fn extract_browse_trigger(normalized_text: &str) -> Option<BrowseTrigger> {
    BROWSE_VOCABULARY
        .iter()
        .find(|(_, phrases)| phrases.iter().any(|phrase| normalized_text.contains(phrase)))
        .map(|(trigger, _)| *trigger)
}

fn normalize_text(text: &str) -> String {
    text.to_lowercase()
}

#[cfg(test)]
mod tests {
    use concierge_core::domain::intent::{BrowseTrigger, Intent, OrderId};

    use super::{extract_order_id, IntentRouter};

    #[test]
    fn order_ids_are_found_anywhere_and_uppercased() {
        let router = IntentRouter::new();
        assert_eq!(
            router.classify("ORD-2024-001234"),
            Intent::OrderLookup(OrderId("ORD-2024-001234".to_owned()))
        );
        assert_eq!(
            router.classify("where is my package ord-2023-000042 please"),
            Intent::OrderLookup(OrderId("ORD-2023-000042".to_owned()))
        );
    }

    #[test]
    fn malformed_order_ids_are_not_lookups() {
        assert_eq!(extract_order_id("ORD-24-001234"), None);
        assert_eq!(extract_order_id("ORD-2024-1234"), None);
        assert_eq!(IntentRouter::new().classify("ORD 2024 001234"), Intent::GeneralQa);
    }

    #[test]
    fn order_id_takes_priority_over_handoff_phrases() {
        let intent = IntentRouter::new().classify("ORD-2024-001234 talk to a human now");
        assert_eq!(intent, Intent::OrderLookup(OrderId("ORD-2024-001234".to_owned())));
    }

    #[test]
    fn browse_categories_are_checked_in_order() {
        let router = IntentRouter::new();
        assert_eq!(router.classify("New Arrivals"), Intent::CatalogBrowse(BrowseTrigger::NewArrivals));
        assert_eq!(router.classify("what's popular?"), Intent::CatalogBrowse(BrowseTrigger::Trending));
        assert_eq!(router.classify("anything on clearance"), Intent::CatalogBrowse(BrowseTrigger::Sale));
        assert_eq!(
            router.classify("latest items on sale"),
            Intent::CatalogBrowse(BrowseTrigger::NewArrivals)
        );
    }

    #[test]
    fn browse_vocabulary_wins_over_handoff_vocabulary() {
        let intent = IntentRouter::new().classify("need help finding a deal");
        assert_eq!(intent, Intent::CatalogBrowse(BrowseTrigger::Sale));
    }

    #[test]
    fn handoff_and_general_questions() {
        let router = IntentRouter::new();
        assert_eq!(router.classify("I want to talk to a human"), Intent::EscalationRequest);
        assert_eq!(router.classify("What sizes do you carry?"), Intent::GeneralQa);
    }
}
