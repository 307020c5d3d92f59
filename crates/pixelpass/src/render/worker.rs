use std::sync::Arc;
use std::time::Duration;

use crate::context::GpuContext;
use crate::error::{RenderError, RenderResult};
use crate::shader::{fallback_fragment, ShaderDefines, ShaderWatcher};
use crate::texture::ElementKind;
use crate::time::StageTimer;

use super::pipeline::{build_pass, InputBinding, PassConfig, PassPipeline};
use super::protocol::{Outcome, Protocol, Request, WorkerWake};
use super::renderer::RendererInit;
use super::target::RenderTarget;

/// How often the worker wakes with no traffic to run housekeeping (the
/// shader file poll). The watcher throttles itself on top of this.
const IDLE_TICK: Duration = Duration::from_secs(1);

/// Everything the render thread takes ownership of at spawn.
pub(crate) struct WorkerSetup {
    pub init: RendererInit,
    pub inputs: Vec<InputBinding>,
    pub feedback: Option<String>,
    pub hook: Option<Box<dyn FnMut() + Send>>,
    pub protocol: Arc<Protocol>,
}

/// Render thread entry point: one-shot init, handshake, request loop.
pub(crate) fn run(setup: WorkerSetup) {
    let protocol = setup.protocol.clone();
    match Worker::init(setup) {
        Ok(mut worker) => {
            protocol.post_init(Ok(()));
            worker.run();
        }
        Err(e) => protocol.post_init(Err(e)),
    }
    log::debug!("render thread ended");
}

struct Worker {
    gpu: GpuContext,
    protocol: Arc<Protocol>,
    /// The two alternating destinations; only the first is device-realized
    /// unless feedback is on.
    target: RenderTarget,
    target2: RenderTarget,
    inputs: Vec<InputBinding>,
    feedback: Option<String>,
    hook: Option<Box<dyn FnMut() + Send>>,
    pipeline: PassPipeline,
    watcher: Option<ShaderWatcher>,
    defines: ShaderDefines,
    timer: StageTimer,
    width: u32,
    height: u32,
    kind: ElementKind,
    format: wgpu::TextureFormat,
    blendable: bool,
    /// Wraps to 0 on the first pass.
    frame_index: u32,
    accumulate: bool,
}

impl Worker {
    fn init(setup: WorkerSetup) -> RenderResult<Worker> {
        let config = setup.init;
        let gpu = GpuContext::init_for_thread(&config.context)?;

        let target = RenderTarget::new(config.width, config.height, config.channels, config.kind)?;
        let target2 = RenderTarget::new(config.width, config.height, config.channels, config.kind)?;
        target.init(&gpu)?;
        if setup.feedback.is_some() {
            target2.init(&gpu)?;
        }

        let defines = ShaderDefines::for_dimensions(config.width, config.height);
        let blendable = config.kind == ElementKind::F32 && gpu.supports_float32_blending();
        let format = target.color().device_format();

        // The initial compile is fatal on failure, watched or not; the
        // fallback only stands in for failed reloads.
        let fragment = config.shader.load()?;
        let pipeline = build_pass(
            &gpu,
            &PassConfig {
                format,
                kind: config.kind,
                defines: &defines,
                inputs: &setup.inputs,
                feedback: setup.feedback.as_deref(),
                blendable,
            },
            &fragment,
            false,
        )?;
        if let Some(name) = &setup.feedback {
            if !pipeline.has_feedback() {
                return Err(RenderError::shader(format!(
                    "feedback uniform {name} optimized out"
                )));
            }
        }

        for input in &setup.inputs {
            input.texture.init(&gpu)?;
        }

        let watcher = config.shader.watched_path().map(|path| {
            log::info!("watching fragment shader file ({})", path.display());
            ShaderWatcher::new(path.to_path_buf(), config.watch.clone())
        });

        let worker = Worker {
            gpu,
            protocol: setup.protocol,
            target,
            target2,
            inputs: setup.inputs,
            feedback: setup.feedback,
            hook: setup.hook,
            pipeline,
            watcher,
            defines,
            timer: StageTimer::new(config.time_stages),
            width: config.width,
            height: config.height,
            kind: config.kind,
            format,
            blendable,
            frame_index: u32::MAX,
            accumulate: false,
        };
        worker.current_target().clear(&worker.gpu)?;
        Ok(worker)
    }

    fn run(&mut self) {
        loop {
            match self.protocol.wait_for_work(IDLE_TICK) {
                WorkerWake::Shutdown => break,
                WorkerWake::Idle => {
                    if let Err(e) = self.poll_shader_file() {
                        self.protocol.fail(e);
                        break;
                    }
                }
                WorkerWake::Request {
                    request,
                    accumulate,
                    reset_frames,
                } => {
                    if reset_frames {
                        self.frame_index = u32::MAX;
                    }
                    self.accumulate = accumulate;
                    if let Err(e) = self.poll_shader_file() {
                        self.protocol.fail(e);
                        break;
                    }
                    let outcome = self.serve(request);
                    self.protocol.complete(outcome);
                }
            }
        }
    }

    fn serve(&mut self, request: Request) -> RenderResult<Outcome> {
        match request {
            Request::Render => self.render_pass().map(|_| Outcome::Done),
            Request::Read => {
                self.timer.begin();
                let bytes = self.current_target().read_into_vec(&self.gpu)?;
                self.timer.measure("readback");
                if let Some(line) = self.timer.finish() {
                    log::debug!("{line}");
                }
                Ok(Outcome::Bytes(bytes))
            }
        }
    }

    /// Checks the watched shader file and swaps the pipeline when due.
    ///
    /// A failed reload substitutes the fallback pattern and schedules a
    /// retry; only a feedback binding that vanished from an otherwise valid
    /// shader is fatal.
    fn poll_shader_file(&mut self) -> RenderResult<()> {
        let Some(read) = self.watcher.as_mut().and_then(|w| w.poll()) else {
            return Ok(());
        };

        match read.and_then(|fragment| self.rebuild(&fragment, false)) {
            Ok(pipeline) => {
                if let Some(name) = &self.feedback {
                    if !pipeline.has_feedback() {
                        return Err(RenderError::shader(format!(
                            "feedback uniform {name} optimized out"
                        )));
                    }
                }
                self.pipeline = pipeline;
                if let Some(watcher) = self.watcher.as_mut() {
                    watcher.attempt_succeeded();
                    log::info!("shader program updated from {}", watcher.path().display());
                }
            }
            Err(e) => {
                log::warn!("failed to update shader program: {e}, falling back to error fragment");
                if !self.pipeline.fallback {
                    self.pipeline = self.rebuild(&fallback_fragment(self.kind), true)?;
                }
                if let Some(watcher) = self.watcher.as_mut() {
                    watcher.attempt_failed();
                }
            }
        }
        Ok(())
    }

    fn rebuild(&self, fragment: &str, fallback: bool) -> RenderResult<PassPipeline> {
        build_pass(
            &self.gpu,
            &PassConfig {
                format: self.format,
                kind: self.kind,
                defines: &self.defines,
                inputs: &self.inputs,
                feedback: self.feedback.as_deref(),
                blendable: self.blendable,
            },
            fragment,
            fallback,
        )
    }

    fn render_pass(&mut self) -> RenderResult<()> {
        self.timer.begin();
        self.frame_index = self.frame_index.wrapping_add(1);

        let feedback_view = if self.feedback.is_some() {
            let previous = self.previous_target();
            log::debug!(
                "frame {}: feedback input is {}",
                self.frame_index,
                previous.color().describe()
            );
            let view = previous.color().view()?;
            self.timer.measure("feedback");
            Some(view)
        } else {
            None
        };

        if let Some(hook) = self.hook.as_mut() {
            hook();
            self.timer.measure("hook");
        }

        let bind_group = self.pipeline.bind_inputs(
            &self.gpu,
            &self.inputs,
            feedback_view.as_ref(),
            &mut self.timer,
        )?;
        self.timer.measure("bind");

        let pipeline = self.pipeline.variant(self.accumulate)?;
        let clear_first = self.accumulate && self.frame_index == 0;
        let view = self.current_target().color().view()?;

        let scope = self.gpu.scoped("render pass");
        let mut encoder = self
            .gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("pass encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("pixel pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: if clear_first {
                            wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT)
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            pass.set_pipeline(pipeline);
            if let Some(group) = &bind_group {
                pass.set_bind_group(0, group, &[]);
            }
            pass.set_viewport(0.0, 0.0, self.width as f32, self.height as f32, 0.0, 1.0);
            pass.draw(0..6, 0..1);
        }
        self.timer.measure("draw");
        self.gpu.queue().submit(std::iter::once(encoder.finish()));
        self.timer.measure("submit");
        scope.finish_with(&self.current_target().color().describe())?;

        if let Some(line) = self.timer.finish() {
            log::debug!("{line}");
        }
        Ok(())
    }

    /// The target the next (or just-issued) pass writes to.
    fn current_target(&self) -> &RenderTarget {
        if self.feedback.is_some() && self.frame_index % 2 == 1 {
            &self.target2
        } else {
            &self.target
        }
    }

    /// The other target: the previous frame's output, fed back as input.
    fn previous_target(&self) -> &RenderTarget {
        if self.feedback.is_some() && self.frame_index % 2 == 0 {
            &self.target2
        } else {
            &self.target
        }
    }
}
