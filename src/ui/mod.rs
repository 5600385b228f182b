pub mod month_view;

pub use month_view::{render_month, DayCell, EventChip, MonthView, Week};
