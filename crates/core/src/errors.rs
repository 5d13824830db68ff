use thiserror::Error;

use crate::{domain::order::DraftOrderStatus, flows::FlowTransitionError};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid draft order transition from {from:?} to {to:?}")]
    InvalidDraftTransition { from: DraftOrderStatus, to: DraftOrderStatus },
    #[error("draft order for conversation `{conversation_id}` is frozen ({status:?})")]
    DraftFrozen { conversation_id: String, status: DraftOrderStatus },
    #[error(transparent)]
    FlowTransition(#[from] FlowTransitionError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("feedback already recorded for intent `{0}`")]
    AlreadyRecorded(String),
    #[error("no published menu for tenant `{0}`")]
    MenuIndexStale(String),
    #[error("draft order for conversation `{0}` changed during extraction")]
    ReconciliationConflict(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::NotFound { .. } => "The requested record does not exist.",
            Self::Conflict { .. } => "The request conflicts with the current state of the record.",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest { .. } => 400,
            Self::NotFound { .. } => 404,
            Self::Conflict { .. } => 409,
            Self::ServiceUnavailable { .. } => 503,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(DomainError::DraftFrozen { .. }) => {
                Self::Conflict { message: value.to_string(), correlation_id }
            }
            ApplicationError::Domain(_) | ApplicationError::InvalidInput(_) => {
                Self::BadRequest { message: value.to_string(), correlation_id }
            }
            ApplicationError::NotFound(_) => {
                Self::NotFound { message: value.to_string(), correlation_id }
            }
            ApplicationError::AlreadyRecorded(_) | ApplicationError::ReconciliationConflict(_) => {
                Self::Conflict { message: value.to_string(), correlation_id }
            }
            ApplicationError::MenuIndexStale(_) => {
                Self::ServiceUnavailable { message: value.to_string(), correlation_id }
            }
            ApplicationError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::order::DraftOrderStatus;
    use crate::errors::{ApplicationError, DomainError, InterfaceError};
    use crate::flows::{ConversationEvent, ConversationFlow, ConversationPhase};

    #[test]
    fn domain_error_maps_to_bad_request_interface_error() {
        let rejected = ConversationFlow
            .apply(ConversationPhase::Closed, ConversationEvent::MessageReceived)
            .expect_err("closed conversations accept no messages");
        let interface = ApplicationError::from(DomainError::from(rejected)).into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ..
            } if correlation_id == "req-1"
        ));
        assert_eq!(interface.status_code(), 400);
    }

    #[test]
    fn feedback_errors_map_to_client_conditions() {
        let not_found = ApplicationError::NotFound("intent OI-1".to_owned()).into_interface("req-2");
        assert!(matches!(not_found, InterfaceError::NotFound { .. }));
        assert_eq!(not_found.status_code(), 404);

        let recorded = ApplicationError::AlreadyRecorded("OI-1".to_owned()).into_interface("req-3");
        assert!(matches!(recorded, InterfaceError::Conflict { .. }));
        assert_eq!(recorded.correlation_id(), "req-3");
        assert_eq!(
            recorded.user_message(),
            "The request conflicts with the current state of the record."
        );
    }

    #[test]
    fn frozen_draft_maps_to_conflict() {
        let interface = ApplicationError::from(DomainError::DraftFrozen {
            conversation_id: "conv-1".to_owned(),
            status: DraftOrderStatus::Confirmed,
        })
        .into_interface("req-4");

        assert_eq!(interface.status_code(), 409);
    }

    #[test]
    fn persistence_error_maps_to_service_unavailable() {
        let interface = ApplicationError::Persistence("database lock timeout".to_owned())
            .into_interface("req-5");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(
            interface.user_message(),
            "The service is temporarily unavailable. Please retry shortly."
        );
    }

    #[test]
    fn stale_menu_maps_to_service_unavailable() {
        let interface =
            ApplicationError::MenuIndexStale("ocakbasi".to_owned()).into_interface("req-6");

        assert_eq!(interface.status_code(), 503);
        assert_eq!(
            interface.to_string(),
            "service unavailable: no published menu for tenant `ocakbasi`"
        );
    }
}
