//! Per-read classification and insert extraction.

mod stats;
pub use stats::*;

mod inline;
pub use inline::*;

mod insert;
pub use insert::*;

mod long_read;
pub use long_read::*;

mod observations;
pub use observations::*;
