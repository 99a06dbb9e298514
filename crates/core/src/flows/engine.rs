use thiserror::Error;

use crate::flows::states::{TransitionOutcome, TurnAction, TurnEvent, TurnState};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TurnTransitionError {
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: TurnState, event: TurnEvent },
}

/// Pure transition table for a single conversation turn.
pub fn transition(
    current: TurnState,
    event: TurnEvent,
) -> Result<TransitionOutcome, TurnTransitionError> {
    use TurnAction::{
        AnalyzeImage, BrowseCatalog, GenerateAnswer, LookupOrder, NotifyHuman, SendFallbackMenu,
        SendReply, WriteAnalytics,
    };
    use TurnEvent::{
        Classify, DeliverReply, Fail, LowConfidence, RecordAnalytics, RouteAnswer,
        RouteCatalogBrowse, RouteEscalation, RouteFixedReply, RouteOrderLookup, RouteVisualSearch,
    };
    use TurnState::{
        Answering, CatalogBrowse, Classified, Escalating, Fallback, FixedReply, Logged,
        OrderLookup, Received, Replied, VisualSearch,
    };

    let (to, actions) = match (current, event) {
        (Received, Classify) => (Classified, Vec::new()),
        (Classified, RouteOrderLookup) => (OrderLookup, vec![LookupOrder]),
        (Classified, RouteCatalogBrowse) => (CatalogBrowse, vec![BrowseCatalog]),
        (Classified, RouteEscalation) => (Escalating, vec![NotifyHuman]),
        (Classified, RouteAnswer) => (Answering, vec![GenerateAnswer]),
        (Classified, RouteFixedReply) => (FixedReply, Vec::new()),
        (Classified, RouteVisualSearch) => (VisualSearch, vec![AnalyzeImage, BrowseCatalog]),
        (Answering, LowConfidence) => (Escalating, vec![NotifyHuman]),
        (
            OrderLookup | CatalogBrowse | Escalating | Answering | FixedReply | VisualSearch,
            RecordAnalytics,
        ) => (Logged, vec![WriteAnalytics]),
        (Logged, DeliverReply) => (Replied, vec![SendReply]),
        (state, Fail) if !state.is_terminal() => (Fallback, vec![SendFallbackMenu]),
        _ => {
            return Err(TurnTransitionError::InvalidTransition { state: current, event });
        }
    };

    Ok(TransitionOutcome { from: current, to, event, actions })
}

/// Tracks the states a turn has visited.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnTrace {
    visited: Vec<TurnState>,
}

impl Default for TurnTrace {
    fn default() -> Self {
        Self { visited: vec![TurnState::Received] }
    }
}

impl TurnTrace {
    pub fn state(&self) -> TurnState {
        self.visited.last().copied().unwrap_or(TurnState::Received)
    }

    pub fn visited(&self) -> &[TurnState] {
        &self.visited
    }

    pub fn apply(&mut self, event: TurnEvent) -> Result<TransitionOutcome, TurnTransitionError> {
        let outcome = transition(self.state(), event)?;
        self.visited.push(outcome.to);
        Ok(outcome)
    }

    /// Moves to `Fallback` unless the turn already ended.
    pub fn fail(&mut self) -> bool {
        self.apply(TurnEvent::Fail).is_ok()
    }

    pub fn into_visited(self) -> Vec<TurnState> {
        self.visited
    }
}

#[cfg(test)]
mod tests {
    use crate::flows::engine::{transition, TurnTrace, TurnTransitionError};
    use crate::flows::states::{TurnAction, TurnEvent, TurnState};

    #[test]
    fn answer_path_reaches_replied() {
        let mut trace = TurnTrace::default();
        for event in [
            TurnEvent::Classify,
            TurnEvent::RouteAnswer,
            TurnEvent::RecordAnalytics,
            TurnEvent::DeliverReply,
        ] {
            trace.apply(event).expect("valid answer path");
        }

        assert_eq!(
            trace.visited(),
            &[
                TurnState::Received,
                TurnState::Classified,
                TurnState::Answering,
                TurnState::Logged,
                TurnState::Replied,
            ]
        );
    }

    #[test]
    fn low_confidence_answer_escalates_before_logging() {
        let outcome = transition(TurnState::Answering, TurnEvent::LowConfidence)
            .expect("answering -> escalating");
        assert_eq!(outcome.to, TurnState::Escalating);
        assert_eq!(outcome.actions, vec![TurnAction::NotifyHuman]);

        let logged = transition(outcome.to, TurnEvent::RecordAnalytics).expect("escalating -> logged");
        assert_eq!(logged.to, TurnState::Logged);
    }

    #[test]
    fn fixed_replies_skip_generation() {
        let outcome = transition(TurnState::Classified, TurnEvent::RouteFixedReply)
            .expect("classified -> fixed reply");
        assert_eq!(outcome.to, TurnState::FixedReply);
        assert!(outcome.actions.is_empty());

        let logged =
            transition(outcome.to, TurnEvent::RecordAnalytics).expect("fixed reply -> logged");
        assert_eq!(logged.to, TurnState::Logged);
    }

    #[test]
    fn visual_search_analyzes_then_searches_the_catalog() {
        let outcome = transition(TurnState::Classified, TurnEvent::RouteVisualSearch)
            .expect("classified -> visual search");
        assert_eq!(outcome.to, TurnState::VisualSearch);
        assert_eq!(outcome.actions, vec![TurnAction::AnalyzeImage, TurnAction::BrowseCatalog]);
    }

    #[test]
    fn lookups_have_no_escalation_path() {
        for state in [
            TurnState::OrderLookup,
            TurnState::CatalogBrowse,
            TurnState::FixedReply,
            TurnState::VisualSearch,
        ] {
            let error = transition(state, TurnEvent::LowConfidence)
                .expect_err("lookups never escalate");
            assert_eq!(
                error,
                TurnTransitionError::InvalidTransition { state, event: TurnEvent::LowConfidence }
            );
        }
    }

    #[test]
    fn any_open_state_can_fall_back() {
        for state in [
            TurnState::Received,
            TurnState::Classified,
            TurnState::OrderLookup,
            TurnState::CatalogBrowse,
            TurnState::Escalating,
            TurnState::Answering,
            TurnState::FixedReply,
            TurnState::VisualSearch,
            TurnState::Logged,
        ] {
            let outcome = transition(state, TurnEvent::Fail).expect("fallback allowed");
            assert_eq!(outcome.to, TurnState::Fallback);
            assert_eq!(outcome.actions, vec![TurnAction::SendFallbackMenu]);
        }
    }

    #[test]
    fn terminal_states_reject_further_events() {
        assert!(transition(TurnState::Replied, TurnEvent::Fail).is_err());
        assert!(transition(TurnState::Fallback, TurnEvent::Fail).is_err());
        assert!(transition(TurnState::Replied, TurnEvent::Classify).is_err());

        let mut trace = TurnTrace::default();
        assert!(trace.fail());
        assert!(!trace.fail());
        assert_eq!(trace.visited(), &[TurnState::Received, TurnState::Fallback]);
    }

    #[test]
    fn skipping_classification_is_rejected() {
        let error = transition(TurnState::Received, TurnEvent::RouteAnswer)
            .expect_err("must classify first");
        assert!(matches!(
            error,
            TurnTransitionError::InvalidTransition {
                state: TurnState::Received,
                event: TurnEvent::RouteAnswer
            }
        ));
    }
}
