pub mod conversation;
pub mod intent;
pub mod menu;
pub mod order;
