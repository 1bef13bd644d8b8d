mod bars;

pub use bars::{hour_bar, progress_bar, truncate};
