pub mod backend;
pub mod config;
pub mod local;

pub use backend::{BackendKind, PersistenceBackend, StorageError};
pub use local::LocalBackend;
