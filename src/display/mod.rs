//! Terminal display utilities for CLI output.
//!
//! Provides styled tables, progress bars and a color theme.

pub mod progress;
pub mod tables;
pub mod theme;

pub use progress::{create_progress_bar, create_spinner, with_spinner};
pub use tables::{TableBuilder, create_build_table, create_info_table, create_results_table};
pub use theme::{THEME, Theme};
