use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bytemuck::Zeroable;

use crate::context::ContextInit;
use crate::error::{RenderError, RenderResult};
use crate::shader::{ShaderSource, WatchConfig};
use crate::texture::{ElementKind, PixelElement, Texture};

use super::pipeline::InputBinding;
use super::protocol::{Outcome, Protocol, Request, RENDEZVOUS_TIMEOUT};
use super::target::RenderTarget;
use super::worker::{self, WorkerSetup};

/// Initialization parameters for a [`Renderer`].
///
/// Keep this structure stable and minimal. Add configuration flags only when a
/// concrete requirement exists.
#[derive(Debug, Clone)]
pub struct RendererInit {
    /// Output width in pixels.
    pub width: u32,

    /// Output height in pixels.
    pub height: u32,

    /// Channels per output pixel (1, 2 or 4).
    pub channels: u32,

    /// Element kind of the output pixels.
    pub kind: ElementKind,

    /// The fragment stage. A [`ShaderSource::File`] is watched for changes
    /// and recompiled while the renderer runs.
    pub shader: ShaderSource,

    /// Execution context parameters for the render thread.
    pub context: ContextInit,

    /// Cadence of the shader file watch (poll, debounce, retry).
    pub watch: WatchConfig,

    /// Log per-stage pass timings at debug severity.
    pub time_stages: bool,
}

impl RendererInit {
    /// Parameters for an output image, defaulting the context, watch cadence
    /// and diagnostics.
    pub fn new(
        width: u32,
        height: u32,
        channels: u32,
        kind: ElementKind,
        shader: ShaderSource,
    ) -> Self {
        Self {
            width,
            height,
            channels,
            kind,
            shader,
            context: ContextInit::default(),
            watch: WatchConfig::default(),
            time_stages: false,
        }
    }
}

/// Offscreen renderer running a fragment shader over a full-screen quad on a
/// dedicated render thread.
///
/// Configuration (inputs, feedback, the update hook) happens before
/// [`Renderer::start`]; afterwards each [`Renderer::render`] /
/// [`Renderer::read_into`] call is a synchronous rendezvous with the render
/// thread. A request the render thread does not answer within four seconds
/// poisons the renderer: the call fails and so does every later one.
///
/// ```no_run
/// use pixelpass::{ElementKind, Renderer, RendererInit, ShaderSource};
///
/// let shader = ShaderSource::Text(
///     "@fragment
///      fn fs_main(@builtin(position) pos: vec4<f32>) -> @location(0) vec4<f32> {
///          return vec4<f32>(pos.x / f32($width), pos.y / f32($height), 0.0, 1.0);
///      }"
///     .into(),
/// );
/// let mut renderer = Renderer::new(RendererInit::new(640, 480, 4, ElementKind::F32, shader))?;
/// renderer.start()?;
/// renderer.render()?;
/// let mut pixels = vec![0.0f32; renderer.element_count()];
/// renderer.read_into(&mut pixels)?;
/// # Ok::<(), pixelpass::RenderError>(())
/// ```
pub struct Renderer {
    init: RendererInit,
    inputs: Vec<InputBinding>,
    feedback: Option<String>,
    hook: Option<Box<dyn FnMut() + Send>>,
    protocol: Arc<Protocol>,
    worker: Option<JoinHandle<()>>,
}

impl Renderer {
    /// Creates an idle renderer. The render thread starts on
    /// [`Renderer::start`].
    ///
    /// Fails for `(kind, channels)` combinations with no device format and
    /// for zero dimensions.
    pub fn new(init: RendererInit) -> RenderResult<Self> {
        // Probe the target configuration now so bad parameters fail here
        // instead of inside start().
        RenderTarget::new(init.width, init.height, init.channels, init.kind)?;
        Ok(Self {
            init,
            inputs: Vec::new(),
            feedback: None,
            hook: None,
            protocol: Arc::new(Protocol::new(RENDEZVOUS_TIMEOUT)),
            worker: None,
        })
    }

    /// Registers `texture` as the data behind the shader binding named
    /// `name`. Configuration only; fails once the renderer is started.
    pub fn add_input(&mut self, name: impl Into<String>, texture: Arc<Texture>) -> RenderResult<()> {
        self.ensure_not_started()?;
        let name = name.into();
        if self.inputs.iter().any(|input| input.name == name) {
            return Err(RenderError::resource(format!(
                "input texture {name} is already registered"
            )));
        }
        if self.feedback.as_deref() == Some(name.as_str()) {
            return Err(RenderError::resource(format!(
                "binding {name} is reserved for feedback"
            )));
        }
        self.inputs.push(InputBinding { name, texture });
        Ok(())
    }

    /// Turns on feedback: the shader binding named `name` samples the
    /// previous frame's output. Configuration only; fails once started.
    pub fn enable_feedback(&mut self, name: impl Into<String>) -> RenderResult<()> {
        self.ensure_not_started()?;
        let name = name.into();
        if self.inputs.iter().any(|input| input.name == name) {
            return Err(RenderError::resource(format!(
                "binding {name} is already an input texture"
            )));
        }
        self.feedback = Some(name);
        Ok(())
    }

    /// Registers a closure the render thread invokes at the head of every
    /// pass, before input textures are prepared. For sources that refresh
    /// their own contents (camera feeds, simulations).
    pub fn set_texture_update_hook(
        &mut self,
        hook: impl FnMut() + Send + 'static,
    ) -> RenderResult<()> {
        self.ensure_not_started()?;
        self.hook = Some(Box::new(hook));
        Ok(())
    }

    /// Switches frame accumulation on or off. May be called while running;
    /// either way the frame counter restarts, so the next pass clears the
    /// target and begins a fresh sum.
    pub fn set_accumulate(&mut self, enable: bool) {
        self.protocol.set_accumulate(enable);
    }

    /// Spawns the render thread and blocks until its one-shot initialization
    /// (context, targets, shader compile, initial clear) finishes.
    ///
    /// The wait is unbounded: first-time driver and shader compile cost is
    /// open-ended. An initialization failure is returned here and the thread
    /// is joined.
    pub fn start(&mut self) -> RenderResult<()> {
        if self.worker.is_some() {
            return Err(RenderError::protocol("renderer already started"));
        }
        self.protocol.begin_start()?;

        let setup = WorkerSetup {
            init: self.init.clone(),
            inputs: self.inputs.clone(),
            feedback: self.feedback.clone(),
            hook: self.hook.take(),
            protocol: self.protocol.clone(),
        };
        let spawned = thread::Builder::new()
            .name("pixelpass-render".into())
            .spawn(move || worker::run(setup));
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.protocol.begin_shutdown();
                return Err(RenderError::resource(format!(
                    "failed to spawn render thread: {e}"
                )));
            }
        };

        match self.protocol.wait_init() {
            Ok(()) => {
                self.worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                let _ = handle.join();
                Err(e)
            }
        }
    }

    /// Renders one frame into the current output target.
    pub fn render(&mut self) -> RenderResult<()> {
        self.protocol.submit(Request::Render).map(|_| ())
    }

    /// Reads the current output back into `out`, which must hold exactly
    /// width x height x channels elements of the output kind.
    pub fn read_into<P: PixelElement>(&mut self, out: &mut [P]) -> RenderResult<()> {
        self.check_kind::<P>()?;
        if out.len() != self.element_count() {
            return Err(RenderError::size_mismatch(self.element_count(), out.len()));
        }

        let bytes = match self.protocol.submit(Request::Read)? {
            Outcome::Bytes(bytes) => bytes,
            Outcome::Done => {
                return Err(RenderError::protocol(
                    "render thread answered a read request without data",
                ));
            }
        };
        bytemuck::cast_slice_mut::<P, u8>(out).copy_from_slice(&bytes);
        Ok(())
    }

    /// Reads the current output back and hands it to `reader` as a typed
    /// slice valid for the closure's duration.
    pub fn read_with<P: PixelElement, R>(
        &mut self,
        reader: impl FnOnce(&[P]) -> R,
    ) -> RenderResult<R> {
        let mut scratch = vec![P::zeroed(); self.element_count()];
        self.read_into(&mut scratch)?;
        Ok(reader(&scratch))
    }

    /// False before start() and after any fatal error (initialization
    /// failure, rendezvous timeout, render thread death).
    pub fn is_alive(&self) -> bool {
        self.protocol.is_alive()
    }

    pub fn width(&self) -> u32 {
        self.init.width
    }

    pub fn height(&self) -> u32 {
        self.init.height
    }

    pub fn channels(&self) -> u32 {
        self.init.channels
    }

    pub fn kind(&self) -> ElementKind {
        self.init.kind
    }

    /// Total output element count: width x height x channels.
    pub fn element_count(&self) -> usize {
        self.init.width as usize * self.init.height as usize * self.init.channels as usize
    }

    fn ensure_not_started(&self) -> RenderResult<()> {
        if self.worker.is_some() {
            return Err(RenderError::protocol(
                "renderer already started; configure it before start()",
            ));
        }
        Ok(())
    }

    fn check_kind<P: PixelElement>(&self) -> RenderResult<()> {
        if P::KIND != self.init.kind {
            return Err(RenderError::resource(format!(
                "element kind mismatch: output is {:?}, read requested {:?}",
                self.init.kind,
                P::KIND
            )));
        }
        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.protocol.begin_shutdown();
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init(kind: ElementKind) -> RendererInit {
        RendererInit::new(8, 8, 4, kind, ShaderSource::Text(String::new()))
    }

    fn texture() -> Arc<Texture> {
        Arc::new(
            Texture::new(4, 4, 4, ElementKind::U8, crate::texture::TransferStrategy::Direct)
                .unwrap(),
        )
    }

    // ── construction ────────────────────────────────────────────────────

    #[test]
    fn rejects_unsupported_target_configuration() {
        let mut bad = init(ElementKind::U8);
        bad.channels = 3;
        assert!(Renderer::new(bad).is_err());

        let mut zero = init(ElementKind::U8);
        zero.width = 0;
        assert!(Renderer::new(zero).is_err());
    }

    // ── configuration guards ────────────────────────────────────────────

    #[test]
    fn duplicate_input_names_are_rejected() {
        let mut renderer = Renderer::new(init(ElementKind::U8)).unwrap();
        renderer.add_input("source", texture()).unwrap();
        assert!(renderer.add_input("source", texture()).is_err());
    }

    #[test]
    fn feedback_name_cannot_collide_with_an_input() {
        let mut renderer = Renderer::new(init(ElementKind::F32)).unwrap();
        renderer.add_input("source", texture()).unwrap();
        assert!(renderer.enable_feedback("source").is_err());

        renderer.enable_feedback("previous").unwrap();
        assert!(renderer.add_input("previous", texture()).is_err());
    }

    // ── request guards ──────────────────────────────────────────────────

    #[test]
    fn requests_before_start_fail() {
        let mut renderer = Renderer::new(init(ElementKind::U8)).unwrap();
        assert!(!renderer.is_alive());
        assert!(matches!(
            renderer.render(),
            Err(RenderError::Protocol(_))
        ));
    }

    #[test]
    fn read_validates_destination_before_any_request() {
        let mut renderer = Renderer::new(init(ElementKind::U8)).unwrap();

        // Wrong element count: caught client-side as a size mismatch even
        // though the renderer never started.
        let mut short = vec![0u8; 7];
        assert!(matches!(
            renderer.read_into(&mut short),
            Err(RenderError::SizeMismatch { .. })
        ));

        // Wrong element kind.
        let mut wrong = vec![0.0f32; renderer.element_count()];
        assert!(matches!(
            renderer.read_into(&mut wrong),
            Err(RenderError::Resource(_))
        ));
    }
}
