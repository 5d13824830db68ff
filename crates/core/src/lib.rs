pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod menu;
pub mod reconcile;
pub mod text;

pub use domain::conversation::{ConversationTurn, InboundMessage, TurnRole};
pub use domain::intent::{
    AgentFeedback, ExtractedOrderData, ExtractedOrderItem, FeedbackSummary, ItemAction, MessageId,
    OrderIntent, OrderIntentId,
};
pub use domain::menu::{
    CanonicalMenuExport, MenuCandidate, MenuItemId, OptionId, SynonymTarget, TenantId,
};
pub use domain::order::{
    ConversationId, DraftOrder, DraftOrderItem, DraftOrderStatus, Extra, OptionSelection,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{ConversationEvent, ConversationFlow, ConversationPhase};
pub use menu::{retrieve, MenuIndex, MenuIndexError, MenuRegistry, DEFAULT_TOP_K};
pub use reconcile::{ReconcileOutcome, Reconciler, DEFAULT_CONFIDENCE_THRESHOLD};
