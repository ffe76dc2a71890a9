//! # normativa CLI
//!
//! Command-line interface for hybrid retrieval and confidence-graded
//! answers over regulatory documents.
//!
//! This binary provides human-friendly access to `normativa-core`.
//! Run `normativa --help` for usage information.

mod cli;
pub mod ui;

use std::process::ExitCode;

fn main() -> ExitCode {
    cli::run()
}
