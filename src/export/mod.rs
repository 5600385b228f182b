pub mod ics;

pub use ics::{render, render_at, CalendarMeta};
