//! Typed GPU textures and host/device transfer strategies.
//!
//! A [`Texture`] is a 2-D array of typed pixels. Uploads are two-phase:
//! `upload` stages host data and marks the texture dirty; the render thread
//! performs the actual device copy in `prepare_for_sampling` immediately
//! before the texture is bound. The [`TransferStrategy`] decides how bytes
//! cross the host/device boundary.

mod format;
mod row_width;
mod texture;

pub use format::{ElementKind, PixelElement};
pub use row_width::{DefaultRowWidthPolicy, RowWidthPolicy};
pub use texture::{SharedGuard, StagedRows, Texture, TransferStrategy};
