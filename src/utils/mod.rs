pub mod date;
pub mod formatting;
pub mod time;

pub use formatting::{format_hms, mins2readable};
