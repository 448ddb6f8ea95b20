//! Reloadable `tracing` subscriber. Needs a human to look at the output;
//! `bin/logger_demo.rs` exercises it.

mod logger;
pub use logger::*;

pub use tracing::{debug, error, info, trace, warn};
