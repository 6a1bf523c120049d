//! Stable naming of exact sequence variants and their per-sample counts.

mod order;
pub use order::*;

mod registry;
pub use registry::*;

mod counts;
pub use counts::*;
