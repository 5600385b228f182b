pub mod coordinator;
pub mod remote;
pub mod transport;

pub use coordinator::{SyncCoordinator, SyncStatus};
pub use remote::RemoteBackend;
pub use transport::{RealtimeTransport, RestTransport, Snapshot, TransportError};
