//! Offscreen GPU pixel processing: run a WGSL fragment shader over typed
//! input textures on a dedicated render thread and read the result back.
//!
//! # Structure
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`error`] | `RenderError`, `RenderResult` |
//! | [`logging`] | `init_logging` |
//! | [`context`] | `GpuContext`, `ContextInit`, `ApiVersion` |
//! | [`texture`] | `Texture`, `TransferStrategy`, `ElementKind` |
//! | [`shader`] | `ShaderSource`, `WatchConfig` |
//! | [`render`] | `Renderer`, `RendererInit` |
//! | [`time`] | `StageTimer` |
//!
//! # Quick start
//!
//! ```rust,no_run
//! use pixelpass::{ElementKind, Renderer, RendererInit, ShaderSource};
//!
//! let shader = ShaderSource::Text(
//!     "@fragment
//!      fn fs_main(@builtin(position) pos: vec4<f32>) -> @location(0) vec4<f32> {
//!          return vec4<f32>(pos.x / f32($width), pos.y / f32($height), 0.0, 1.0);
//!      }"
//!     .into(),
//! );
//!
//! let mut renderer = Renderer::new(RendererInit::new(640, 480, 4, ElementKind::F32, shader))?;
//! renderer.start()?;
//! renderer.render()?;
//!
//! let mut pixels = vec![0.0f32; renderer.element_count()];
//! renderer.read_into(&mut pixels)?;
//! # Ok::<(), pixelpass::RenderError>(())
//! ```
//!
//! Shaders address their inputs with `textureLoad` through plain
//! `@group(0) @binding(N)` texture declarations; the binding layout is
//! reflected from the source, so a shader and its registered inputs are
//! matched by name with no layout boilerplate.

pub mod context;
pub mod error;
pub mod logging;
pub mod render;
pub mod shader;
pub mod texture;
pub mod time;

pub use context::{ContextInit, GpuContext};
pub use error::{RenderError, RenderResult};
pub use logging::{init_logging, LoggingConfig};
pub use render::{Renderer, RendererInit};
pub use shader::{ShaderSource, WatchConfig};
pub use texture::{ElementKind, PixelElement, Texture, TransferStrategy};
