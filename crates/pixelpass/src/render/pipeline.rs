use std::sync::Arc;

use crate::context::GpuContext;
use crate::error::{RenderError, RenderResult};
use crate::shader::{compose_module, reflect, ShaderDefines, ShaderInterface};
use crate::texture::{ElementKind, Texture};
use crate::time::StageTimer;

/// A named texture input of the pass.
#[derive(Clone)]
pub(crate) struct InputBinding {
    pub name: String,
    pub texture: Arc<Texture>,
}

/// What a reflected binding slot resolved to.
enum Resolved {
    /// Index into the registered input list.
    Input(usize),
    /// The feedback slot; its view alternates between the two targets.
    Feedback,
}

struct ResolvedBinding {
    slot: u32,
    source: Resolved,
}

/// Everything a pipeline build needs besides the fragment source.
pub(crate) struct PassConfig<'a> {
    pub format: wgpu::TextureFormat,
    pub kind: ElementKind,
    pub defines: &'a ShaderDefines,
    pub inputs: &'a [InputBinding],
    pub feedback: Option<&'a str>,
    /// Whether the target format can blend; gates the additive variant.
    pub blendable: bool,
}

/// A compiled pass: both pipeline variants plus the resolution table that
/// maps reflected binding slots to registered inputs.
pub(crate) struct PassPipeline {
    plain: wgpu::RenderPipeline,
    /// Additive blending variant; absent when the target cannot blend.
    additive: Option<wgpu::RenderPipeline>,
    layout: Option<wgpu::BindGroupLayout>,
    resolved: Vec<ResolvedBinding>,
    /// True when this is the substituted debug pattern, not the real source.
    pub(crate) fallback: bool,
}

const ADDITIVE_BLEND: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

/// Compiles `fragment`, resolves its bindings and builds the pipelines.
pub(crate) fn build_pass(
    gpu: &GpuContext,
    config: &PassConfig<'_>,
    fragment: &str,
    fallback: bool,
) -> RenderResult<PassPipeline> {
    let source = compose_module(&config.defines.apply(fragment));
    let interface = reflect(&source)?;
    let (resolved, entries) = resolve_bindings(&interface, config)?;

    let scope = gpu.scoped("shader compile");
    let module = gpu
        .device()
        .create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("pass shader"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

    let layout = if entries.is_empty() {
        None
    } else {
        Some(
            gpu.device()
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("pass inputs layout"),
                    entries: &entries,
                }),
        )
    };
    let group_layouts: Vec<&wgpu::BindGroupLayout> = layout.iter().collect();
    let pipeline_layout = gpu
        .device()
        .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("pass pipeline layout"),
            bind_group_layouts: &group_layouts,
            immediate_size: 0,
        });

    let plain = create_variant(gpu, &module, &pipeline_layout, config.format, None);
    let additive = config
        .blendable
        .then(|| create_variant(gpu, &module, &pipeline_layout, config.format, Some(ADDITIVE_BLEND)));
    scope.finish()?;

    Ok(PassPipeline {
        plain,
        additive,
        layout,
        resolved,
        fallback,
    })
}

/// Matches reflected bindings against the registered inputs and the
/// feedback name. Registered inputs the shader does not mention are logged
/// and skipped; shader bindings with no input behind them are errors, since
/// every declared slot must be bound.
fn resolve_bindings(
    interface: &ShaderInterface,
    config: &PassConfig<'_>,
) -> RenderResult<(Vec<ResolvedBinding>, Vec<wgpu::BindGroupLayoutEntry>)> {
    let mut resolved = Vec::new();
    let mut entries = Vec::new();

    for binding in interface.bindings() {
        let (source, kind) = if config.feedback == Some(binding.name.as_str()) {
            (Resolved::Feedback, config.kind)
        } else if let Some(index) = config.inputs.iter().position(|i| i.name == binding.name) {
            (Resolved::Input(index), config.inputs[index].texture.kind())
        } else {
            return Err(RenderError::shader(format!(
                "texture binding '{}' has no registered input",
                binding.name
            )));
        };

        if kind.scalar_kind() != binding.sample_kind {
            return Err(RenderError::shader(format!(
                "texture binding '{}' declares {:?} texels, the bound texture holds {:?}",
                binding.name, binding.sample_kind, kind
            )));
        }

        entries.push(wgpu::BindGroupLayoutEntry {
            binding: binding.binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: kind.sample_type(),
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        resolved.push(ResolvedBinding {
            slot: binding.binding,
            source,
        });
    }

    for input in config.inputs {
        if interface.binding(&input.name).is_none() {
            log::warn!("shader uniform {} not found/optimized out, ignore", input.name);
        }
    }

    Ok((resolved, entries))
}

fn create_variant(
    gpu: &GpuContext,
    module: &wgpu::ShaderModule,
    layout: &wgpu::PipelineLayout,
    format: wgpu::TextureFormat,
    blend: Option<wgpu::BlendState>,
) -> wgpu::RenderPipeline {
    let targets = [Some(wgpu::ColorTargetState {
        format,
        blend,
        write_mask: wgpu::ColorWrites::ALL,
    })];
    gpu.device()
        .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("pass pipeline"),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &targets,
            }),
            multiview_mask: None,
            cache: None,
        })
}

impl PassPipeline {
    /// Whether the compiled module declares the feedback binding.
    pub(crate) fn has_feedback(&self) -> bool {
        self.resolved
            .iter()
            .any(|r| matches!(r.source, Resolved::Feedback))
    }

    /// Picks the pipeline variant for this pass.
    pub(crate) fn variant(&self, accumulate: bool) -> RenderResult<&wgpu::RenderPipeline> {
        if !accumulate {
            return Ok(&self.plain);
        }
        self.additive.as_ref().ok_or_else(|| {
            RenderError::resource("accumulation requires a blendable float render target")
        })
    }

    /// Builds this frame's bind group, realizing each input's pending
    /// upload first. `feedback_view` is the previous frame's output.
    pub(crate) fn bind_inputs(
        &self,
        gpu: &GpuContext,
        inputs: &[InputBinding],
        feedback_view: Option<&wgpu::TextureView>,
        timer: &mut StageTimer,
    ) -> RenderResult<Option<wgpu::BindGroup>> {
        let Some(layout) = &self.layout else {
            return Ok(None);
        };

        let mut views = Vec::with_capacity(self.resolved.len());
        for binding in &self.resolved {
            match binding.source {
                Resolved::Input(index) => {
                    let input = &inputs[index];
                    input.texture.prepare_for_sampling(gpu)?;
                    timer.measure(&format!("tex_{}", input.name));
                    views.push(input.texture.view()?);
                }
                Resolved::Feedback => {
                    let view = feedback_view.ok_or_else(|| {
                        RenderError::resource("feedback slot resolved without a feedback target")
                    })?;
                    views.push(view.clone());
                }
            }
        }

        let entries: Vec<wgpu::BindGroupEntry<'_>> = self
            .resolved
            .iter()
            .zip(&views)
            .map(|(binding, view)| wgpu::BindGroupEntry {
                binding: binding.slot,
                resource: wgpu::BindingResource::TextureView(view),
            })
            .collect();
        Ok(Some(gpu.device().create_bind_group(
            &wgpu::BindGroupDescriptor {
                label: Some("pass inputs"),
                layout,
                entries: &entries,
            },
        )))
    }
}
