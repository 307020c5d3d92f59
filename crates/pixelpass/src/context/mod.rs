//! GPU execution-context management.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue for headless rendering
//! - detecting and parsing the driver API version
//! - scoped device-error capture ([`DeviceScope`])
//!
//! A [`GpuContext`] is bound to the thread that created it and cannot be
//! moved; all device work happens on that thread.

mod gpu;
mod scope;
mod version;

pub use gpu::{ContextInit, GpuContext};
pub use scope::DeviceScope;
pub use version::ApiVersion;
