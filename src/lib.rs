pub mod calendar;
pub mod export;
pub mod storage;
pub mod sync;
pub mod ui;

pub use calendar::{EventForm, EventRecord, Category};
pub use sync::{SyncCoordinator, SyncStatus};
