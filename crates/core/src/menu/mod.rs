pub mod index;
pub mod registry;
pub mod retrieval;

pub use index::{MenuIndex, MenuIndexError};
pub use registry::MenuRegistry;
pub use retrieval::{retrieve, DEFAULT_TOP_K};
