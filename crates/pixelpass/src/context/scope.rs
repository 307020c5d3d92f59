use crate::error::{RenderError, RenderResult};

/// RAII validation-error scope around a batch of device calls.
///
/// Push a scope before issuing state-changing calls, then consume it with
/// [`DeviceScope::finish`] (or [`DeviceScope::finish_with`] to name the
/// resource involved). A captured error becomes a [`RenderError::Device`]
/// carrying the symbolic error class and the call-site tag.
///
/// Dropping an unfinished scope logs a warning; the error state is then
/// reported through the uncaptured-error path instead.
pub struct DeviceScope<'a> {
    device: &'a wgpu::Device,
    location: &'static str,
    checked: bool,
}

impl<'a> DeviceScope<'a> {
    pub(crate) fn push(device: &'a wgpu::Device, location: &'static str) -> Self {
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        Self {
            device,
            location,
            checked: false,
        }
    }

    /// Pops the scope; a captured error is converted and logged.
    pub fn finish(self) -> RenderResult<()> {
        self.finish_inner(None)
    }

    /// Like [`DeviceScope::finish`], with a description of the implicated
    /// resource embedded in the error.
    pub fn finish_with(self, resource: &str) -> RenderResult<()> {
        self.finish_inner(Some(resource))
    }

    fn finish_inner(mut self, resource: Option<&str>) -> RenderResult<()> {
        self.checked = true;

        let Some(err) = pollster::block_on(self.device.pop_error_scope()) else {
            return Ok(());
        };

        let detail = match resource {
            Some(r) => format!("{} ({r}): {err}", self.location),
            None => format!("{}: {err}", self.location),
        };
        Err(RenderError::device(error_code_name(&err), detail))
    }
}

impl Drop for DeviceScope<'_> {
    fn drop(&mut self) {
        if !self.checked {
            log::warn!(
                "device scope {:?} dropped without being checked",
                self.location
            );
        }
    }
}

/// Symbolic name for a device error class.
fn error_code_name(err: &wgpu::Error) -> &'static str {
    match err {
        wgpu::Error::OutOfMemory { .. } => "OUT_OF_MEMORY",
        wgpu::Error::Validation { .. } => "VALIDATION_ERROR",
        wgpu::Error::Internal { .. } => "INTERNAL_ERROR",
    }
}
