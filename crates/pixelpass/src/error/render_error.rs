use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors produced by the renderer and its resources.
///
/// All variants are `Clone` so a fatal error raised on the render thread can
/// be kept and returned from every subsequent request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
    /// Allocation or configuration failure: adapter/device acquisition,
    /// unsupported element-kind/channel combination, transfer-strategy misuse.
    #[error("resource error: {0}")]
    Resource(String),

    /// Request-protocol violation: operation while not alive, starting twice,
    /// a poisoned renderer, or a response timeout.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Upload or read length does not match width x height x channels.
    #[error("size mismatch: expected {expected} elements, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// Shader parse, validation or binding-reflection failure.
    #[error("shader compile error: {0}")]
    ShaderCompile(String),

    /// Error captured from the device, tagged with the symbolic error class
    /// and the call site (plus the implicated resource where known).
    #[error("device error: {code} at {detail}")]
    Device { code: String, detail: String },
}

impl RenderError {
    /// Builds a [`RenderError::Resource`], logging it first.
    pub(crate) fn resource(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        log::error!("{msg}");
        RenderError::Resource(msg)
    }

    /// Builds a [`RenderError::Protocol`], logging it first.
    pub(crate) fn protocol(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        log::error!("{msg}");
        RenderError::Protocol(msg)
    }

    /// Builds a [`RenderError::SizeMismatch`], logging it first.
    pub(crate) fn size_mismatch(expected: usize, actual: usize) -> Self {
        log::error!("size mismatch: expected {expected} elements, got {actual}");
        RenderError::SizeMismatch { expected, actual }
    }

    /// Builds a [`RenderError::ShaderCompile`], logging it first.
    pub(crate) fn shader(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        log::error!("{msg}");
        RenderError::ShaderCompile(msg)
    }

    /// Builds a [`RenderError::Device`] from a symbolic error-class name and
    /// a call-site tag, logging it first.
    pub(crate) fn device(code: impl Into<String>, detail: impl Into<String>) -> Self {
        let code = code.into();
        let detail = detail.into();
        log::error!("device error: {code} at {detail}");
        RenderError::Device { code, detail }
    }
}
