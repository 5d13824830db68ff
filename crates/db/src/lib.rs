pub mod connection;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use repositories::{
    DraftOrderRepository, FeedbackWrite, InMemoryDraftOrderRepository,
    InMemoryOrderIntentRepository, OrderIntentRepository, RepositoryError,
    SqlDraftOrderRepository, SqlOrderIntentRepository,
};
