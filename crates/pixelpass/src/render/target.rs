use crate::context::GpuContext;
use crate::error::RenderResult;
use crate::texture::{ElementKind, Texture};

/// Destination of a render pass: one host-readable color texture.
pub(crate) struct RenderTarget {
    color: Texture,
}

impl RenderTarget {
    pub(crate) fn new(
        width: u32,
        height: u32,
        channels: u32,
        kind: ElementKind,
    ) -> RenderResult<Self> {
        Ok(Self {
            color: Texture::for_render_target(width, height, channels, kind)?,
        })
    }

    pub(crate) fn color(&self) -> &Texture {
        &self.color
    }

    pub(crate) fn init(&self, gpu: &GpuContext) -> RenderResult<()> {
        self.color.init(gpu)
    }

    /// Clears the color image to transparent black.
    pub(crate) fn clear(&self, gpu: &GpuContext) -> RenderResult<()> {
        let scope = gpu.scoped("target clear");
        let view = self.color.view()?;
        let mut encoder = gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("target clear encoder"),
            });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("target clear"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
        }
        gpu.queue().submit(std::iter::once(encoder.finish()));
        scope.finish_with(&self.color.describe())
    }

    /// Reads the color image back into a tight byte vector.
    pub(crate) fn read_into_vec(&self, gpu: &GpuContext) -> RenderResult<Vec<u8>> {
        self.color.read_bytes(gpu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_rejects_unsupported_formats() {
        assert!(RenderTarget::new(4, 4, 3, ElementKind::U8).is_err());
        assert!(RenderTarget::new(4, 4, 4, ElementKind::U8).is_ok());
    }
}
