//! File settings layered with `AUTHGATE__SECTION__KEY` environment overrides.
//! See `bin/settings_demo.rs` for a binary printing what gets loaded.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;
