use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{RenderError, RenderResult};

use super::scope::DeviceScope;
use super::version::ApiVersion;

/// Initialization parameters for the execution context.
///
/// Keep this structure stable and minimal. Add configuration flags only when a
/// concrete platform or backend requirement exists.
#[derive(Debug, Clone)]
pub struct ContextInit {
    /// Backends the instance may select from.
    pub backends: wgpu::Backends,

    /// Adapter power preference.
    pub power_preference: wgpu::PowerPreference,

    /// Prefer a software/fallback adapter.
    ///
    /// Useful for headless CI hosts without a hardware GPU.
    pub force_fallback_adapter: bool,

    /// Install the uncaptured-error diagnostic hook and verbose lifecycle
    /// logging.
    pub debug: bool,

    /// Limits requested from the adapter/device.
    pub required_limits: wgpu::Limits,
}

impl Default for ContextInit {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            debug: false,
            required_limits: wgpu::Limits::default(),
        }
    }
}

/// Owns the wgpu core objects for one render thread.
///
/// The context is a thread-bound capability: it is created on the thread that
/// will issue all device work and cannot be sent to another thread (enforced
/// by the type, not by locking). Dropping it releases the device; the
/// underlying adapter may be re-acquired by a later context.
pub struct GpuContext {
    /// wgpu instance used to create the adapter.
    instance: wgpu::Instance,

    /// Selected adapter.
    adapter: wgpu::Adapter,

    /// Logical device.
    device: wgpu::Device,

    /// Command queue.
    queue: wgpu::Queue,

    /// Parsed driver API version.
    version: ApiVersion,

    /// Features actually granted by the device (optional features are probed
    /// on the adapter and requested only when present).
    features: wgpu::Features,

    /// One-time lifecycle diagnostics, carried here instead of globals:
    /// whether the version banner was emitted and whether the debug hook is
    /// installed on the device.
    banner_logged: bool,
    debug_hook_installed: bool,

    /// Binds the context to its creation thread.
    _thread_bound: PhantomData<*const ()>,
}

impl GpuContext {
    /// Creates an execution context on the calling thread.
    ///
    /// Acquisition is asynchronous under wgpu; this blocks until the adapter
    /// and device are ready. Fails if no adapter/device can be acquired or
    /// the driver version string cannot be parsed.
    pub fn init_for_thread(init: &ContextInit) -> RenderResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: init.backends,
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: init.power_preference,
            compatible_surface: None,
            force_fallback_adapter: init.force_fallback_adapter,
        }))
        .map_err(|e| RenderError::resource(format!("no suitable GPU adapter: {e}")))?;

        // Optional features: request only what the adapter actually has.
        // wgpu 28 exposes no FLOAT32_BLENDABLE feature (the WebGPU
        // `float32-blendable` proposal, gpuweb#3556, is unimplemented), so
        // the probe for additive accumulation into 32-bit float targets
        // always comes up empty and no optional features are requested.
        let required_features = wgpu::Features::empty();

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("pixelpass device"),
            required_features,
            required_limits: init.required_limits.clone(),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| RenderError::resource(format!("failed to create device/queue: {e}")))?;

        let info = adapter.get_info();
        let version = ApiVersion::parse(&info.driver_info, info.backend == wgpu::Backend::Gl)?;

        log::info!(
            "device ready: {} [{:?}] driver {version}",
            info.name,
            info.backend
        );

        let debug_hook_installed = if init.debug {
            device.on_uncaptured_error(Arc::new(|error: wgpu::Error| match error {
                wgpu::Error::OutOfMemory { .. } => {
                    log::error!("uncaptured device error: OUT_OF_MEMORY: {error}")
                }
                wgpu::Error::Validation { .. } => {
                    log::error!("uncaptured device error: VALIDATION_ERROR: {error}")
                }
                wgpu::Error::Internal { .. } => {
                    log::error!("uncaptured device error: INTERNAL_ERROR: {error}")
                }
            }));
            log::debug!("debug diagnostics hook installed");
            true
        } else {
            false
        };

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            version,
            features: required_features,
            banner_logged: true,
            debug_hook_installed,
            _thread_bound: PhantomData,
        })
    }

    /// Returns a reference to the logical device.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Returns a reference to the command queue.
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Returns the parsed driver API version.
    pub fn version(&self) -> ApiVersion {
        self.version
    }

    /// True when the driver runs in a GL-style compatibility mode.
    pub fn is_compatibility(&self) -> bool {
        self.version.is_compatibility
    }

    /// True when additive blending on 32-bit float targets is available.
    pub fn supports_float32_blending(&self) -> bool {
        // Never true under wgpu 28: there is no FLOAT32_BLENDABLE feature
        // to request (gpuweb#3556 is unimplemented), so the feature set
        // granted at init cannot include it.
        !self.features.is_all() && false
    }

    /// Opens a validation scope tagged with `location`.
    pub fn scoped(&self, location: &'static str) -> DeviceScope<'_> {
        DeviceScope::push(&self.device, location)
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        // Detach is non-destructive; the adapter can serve a later context.
        log::debug!(
            "gpu context released (banner_logged={}, debug_hook={})",
            self.banner_logged,
            self.debug_hook_installed
        );
    }
}
