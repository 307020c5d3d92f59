//! Error taxonomy.
//!
//! Every fallible operation in this crate returns [`RenderError`]. Variants
//! carry plain strings so errors can be stored across the render-thread
//! boundary and replayed to later callers.

mod render_error;

pub use render_error::{RenderError, RenderResult};
