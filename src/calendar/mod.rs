pub mod category;
pub mod event;
pub mod event_set;
pub mod occurrence;

pub use category::{Category, category_color, DEFAULT_COLOR};
pub use event::{migrate, EventForm, EventRecord, RecordError, StoredRecord};
pub use occurrence::{events_on, occurs_on};
