pub mod engine;
pub mod states;

pub use engine::{transition, TurnTrace, TurnTransitionError};
pub use states::{TransitionOutcome, TurnAction, TurnEvent, TurnState};
