//! Offscreen rendering subsystem.
//!
//! [`Renderer`] is the client-side handle; rendering itself happens on a
//! dedicated thread that owns every GPU resource. The two sides meet in a
//! synchronous rendezvous (`protocol`), one request at a time.

mod pipeline;
mod protocol;
mod renderer;
mod target;
mod worker;

pub use renderer::{Renderer, RendererInit};
