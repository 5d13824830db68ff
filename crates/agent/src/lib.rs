//! Order-intake runtime: language-model extraction and per-conversation orchestration.
//!
//! # Architecture
//!
//! Each inbound message runs one constrained loop:
//! 1. **Retrieval** (`chatorder_core::menu`) - rank menu candidates for the utterance
//! 2. **Extraction** (`extraction`) - ask the model for a structured order grounded in the candidates
//! 3. **Reconciliation** (`chatorder_core::reconcile`) - gate on confidence and merge into the draft
//! 4. **Hand-off** (`collaborators`) - draft to order management, or a question to the customer
//!
//! # Safety Principle
//!
//! The model is strictly a translator. It never decides prices or which menu items exist;
//! those come from the published menu index and the reconciler.

pub mod collaborators;
pub mod extraction;
pub mod feedback;
pub mod llm;
pub mod orchestrator;
pub mod providers;

pub use collaborators::{
    CustomerMessenger, LoggingCustomerMessenger, LoggingOrderManagement, OrderManagement,
};
pub use extraction::{ExtractionAttempt, ExtractionError, ExtractionInvoker, ExtractionSettings};
pub use feedback::{FeedbackError, FeedbackRecorder};
pub use llm::{LlmClient, LlmError, LlmRequest};
pub use orchestrator::{Orchestrator, OrchestratorParts, OutcomePhase, ProcessOutcome};
pub use providers::{create_client, OllamaClient, OpenAiClient};
