mod error;
pub mod qdrant;

pub use error::{Error, Result};
pub use qdrant::QdrantStore;
