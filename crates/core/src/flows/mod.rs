pub mod engine;
pub mod states;

pub use engine::{ConversationFlow, FlowTransitionError};
pub use states::{ConversationEvent, ConversationPhase, PhaseAction, PhaseTransition};
