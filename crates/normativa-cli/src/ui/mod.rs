//! # CLI UI Module
//!
//! Styling and formatting layer for `normativa` output.
//!
//! ## Design Principles
//!
//! 1. **Scannable**: confidence and failures stand out at a glance
//! 2. **Accessible**: work without colors (respect `NO_COLOR`)
//! 3. **Scriptable**: every command has a `--json` form
//!
//! ## Module Structure
//!
//! - `color`: Color mode detection and terminal capability checks
//! - `style`: Message types, prefixes, and styling functions
//! - `format`: Utility formatters (durations, truncation, pages)
//! - `table`: Table rendering with comfy-table

pub mod color;
pub mod format;
pub mod style;
pub mod table;

// Re-export main types for convenient access
pub use color::ColorMode;
pub use style::{MessageType, Style};
