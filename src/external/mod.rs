//! Boundaries to the external denoising and taxonomy tools.

mod denoise;
pub use denoise::*;

mod taxonomy;
pub use taxonomy::*;
