use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use crate::context::GpuContext;
use crate::error::{RenderError, RenderResult};

use super::format::{texture_format, ElementKind, PixelElement};
use super::row_width::{DefaultRowWidthPolicy, RowWidthPolicy};

/// How host data reaches the device image.
#[derive(Clone)]
pub enum TransferStrategy {
    /// Whole-image replace through the queue on next use.
    Direct,
    /// Host data goes through a mapped staging buffer, then a device-side
    /// copy binds it as the image source.
    Staged,
    /// Host-aliased strided allocation consumed directly by the device.
    /// Upload-only; row width is dictated by the policy, not the caller.
    Shared { policy: Arc<dyn RowWidthPolicy> },
}

impl TransferStrategy {
    /// Shared strategy with the default row-width policy.
    pub fn shared() -> Self {
        TransferStrategy::Shared {
            policy: Arc::new(DefaultRowWidthPolicy),
        }
    }
}

impl std::fmt::Debug for TransferStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferStrategy::Direct => write!(f, "direct"),
            TransferStrategy::Staged => write!(f, "staged"),
            TransferStrategy::Shared { .. } => write!(f, "shared"),
        }
    }
}

/// Host data staged by `upload`, applied on the render thread.
enum PendingUpload {
    /// Tightly packed bytes.
    Bytes(Vec<u8>),
    /// Caller-provided writer, invoked with the mapped staging memory.
    Writer(Box<dyn FnOnce(&mut StagedRows<'_>) + Send>),
}

/// Host-side mutable state.
struct HostState {
    pending: Option<PendingUpload>,
    /// Strided allocation backing the shared strategy; empty otherwise.
    shared: Vec<u8>,
    dirty: bool,
}

/// Device-side resources, realized once on the render thread.
struct DeviceState {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    /// Upload staging buffer (staged strategy only).
    staging: Option<wgpu::Buffer>,
    /// Readback buffer; render targets carry one from init, plain textures
    /// from their first read.
    readback: Option<wgpu::Buffer>,
}

/// A GPU-resident 2-D array of typed pixels.
///
/// Dimensions, channel count, element kind and transfer strategy are fixed at
/// construction. The device resource is realized lazily on the render thread;
/// host-side staging (`upload`, [`Texture::lock`]) works from any thread.
pub struct Texture {
    width: u32,
    height: u32,
    channels: u32,
    kind: ElementKind,
    strategy: TransferStrategy,
    format: wgpu::TextureFormat,
    /// Row width of the shared allocation in texels (shared strategy only).
    shared_row_texels: u32,
    /// True for textures that double as render-pass color attachments.
    renderable: bool,
    host: Mutex<HostState>,
    device: Mutex<Option<DeviceState>>,
}

impl Texture {
    /// Creates a texture for sampling (an input to the render pass).
    ///
    /// Fails for unsupported `(kind, channels)` combinations, zero
    /// dimensions, or a shared strategy with anything but 16-bit elements
    /// and 4 channels.
    pub fn new(
        width: u32,
        height: u32,
        channels: u32,
        kind: ElementKind,
        strategy: TransferStrategy,
    ) -> RenderResult<Self> {
        Self::build(width, height, channels, kind, strategy, false)
    }

    /// Creates the color texture of a render target.
    pub(crate) fn for_render_target(
        width: u32,
        height: u32,
        channels: u32,
        kind: ElementKind,
    ) -> RenderResult<Self> {
        Self::build(width, height, channels, kind, TransferStrategy::Direct, true)
    }

    fn build(
        width: u32,
        height: u32,
        channels: u32,
        kind: ElementKind,
        strategy: TransferStrategy,
        renderable: bool,
    ) -> RenderResult<Self> {
        let format = texture_format(kind, channels)?;
        if width == 0 || height == 0 {
            return Err(RenderError::resource(format!(
                "texture dimensions must be non-zero, got {width}x{height}"
            )));
        }

        let mut shared_row_texels = 0;
        let mut shared = Vec::new();
        if let TransferStrategy::Shared { policy } = &strategy {
            if kind.size() != 2 || channels != 4 {
                return Err(RenderError::resource(format!(
                    "shared-memory textures support 16-bit elements with 4 channels only, \
                     got {kind:?} x{channels}"
                )));
            }
            shared_row_texels = policy.row_width(width, kind.size());
            let stride = shared_row_texels as usize * channels as usize * kind.size() as usize;
            shared = vec![0u8; stride * height as usize];
        }

        Ok(Self {
            width,
            height,
            channels,
            kind,
            strategy,
            format,
            shared_row_texels,
            renderable,
            host: Mutex::new(HostState {
                pending: None,
                shared,
                dirty: false,
            }),
            device: Mutex::new(None),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u32 {
        self.channels
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Total element count: width x height x channels.
    pub fn element_count(&self) -> usize {
        self.width as usize * self.height as usize * self.channels as usize
    }

    /// Tightly packed bytes per row.
    pub(crate) fn row_bytes(&self) -> u32 {
        self.width * self.channels * self.kind.size()
    }

    pub(crate) fn device_format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// One-line description used in error reports.
    pub fn describe(&self) -> String {
        format!(
            "texture {}x{}x{} {:?} [{:?}]",
            self.width, self.height, self.channels, self.kind, self.strategy
        )
    }

    /// Stages `data` for upload and marks the texture dirty.
    ///
    /// The device copy happens on the render thread immediately before the
    /// texture is next sampled. A repeated call before that replaces the
    /// staged data. Rejected for the shared strategy (write through
    /// [`Texture::lock`] instead).
    pub fn upload<P: PixelElement>(&self, data: &[P]) -> RenderResult<()> {
        if matches!(self.strategy, TransferStrategy::Shared { .. }) {
            return Err(RenderError::resource(format!(
                "{} is externally sourced; write through lock() instead",
                self.describe()
            )));
        }
        self.check_kind::<P>()?;
        if data.len() != self.element_count() {
            return Err(RenderError::size_mismatch(self.element_count(), data.len()));
        }

        let mut host = self.host_state();
        host.pending = Some(PendingUpload::Bytes(bytemuck::cast_slice(data).to_vec()));
        host.dirty = true;
        Ok(())
    }

    /// Stages a writer that fills the mapped staging memory in place.
    ///
    /// The writer runs on the render thread with the staging buffer mapped
    /// for writing; the row view it receives is valid only for the duration
    /// of the call. Staged strategy only.
    pub fn upload_with(
        &self,
        writer: impl FnOnce(&mut StagedRows<'_>) + Send + 'static,
    ) -> RenderResult<()> {
        if !matches!(self.strategy, TransferStrategy::Staged) {
            return Err(RenderError::resource(format!(
                "{} has no staging buffer; upload_with requires the staged strategy",
                self.describe()
            )));
        }

        let mut host = self.host_state();
        host.pending = Some(PendingUpload::Writer(Box::new(writer)));
        host.dirty = true;
        Ok(())
    }

    /// Locks the shared allocation for exclusive CPU write access.
    ///
    /// Dropping the guard releases the lock and marks the texture dirty.
    /// While the guard lives, sampling the texture fails rather than blocks.
    pub fn lock(&self) -> RenderResult<SharedGuard<'_>> {
        if !matches!(self.strategy, TransferStrategy::Shared { .. }) {
            return Err(RenderError::resource(format!(
                "{} is not shared-memory backed; nothing to lock",
                self.describe()
            )));
        }

        let stride =
            self.shared_row_texels as usize * self.channels as usize * self.kind.size() as usize;
        Ok(SharedGuard {
            host: self.host_state(),
            row_bytes: self.row_bytes() as usize,
            stride,
            height: self.height as usize,
            kind: self.kind,
            expected_elements: self.element_count(),
        })
    }

    /// Realizes the device resource. Idempotent.
    pub fn init(&self, gpu: &GpuContext) -> RenderResult<()> {
        let mut device = self.device_state();
        if device.is_some() {
            return Ok(());
        }

        log::debug!("initializing {}", self.describe());
        let scope = gpu.scoped("texture init");

        let mut usage = wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::COPY_SRC;
        if self.renderable {
            usage |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }

        let texture = gpu.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("pixelpass texture"),
            size: self.extent(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let staging = if matches!(self.strategy, TransferStrategy::Staged) {
            Some(gpu.device().create_buffer(&wgpu::BufferDescriptor {
                label: Some("pixelpass upload staging"),
                size: self.padded_image_bytes(),
                usage: wgpu::BufferUsages::MAP_WRITE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            }))
        } else {
            None
        };

        // Render targets get their readback buffer up front; plain textures
        // allocate one on first read.
        let readback = self.renderable.then(|| {
            gpu.device().create_buffer(&wgpu::BufferDescriptor {
                label: Some("pixelpass readback"),
                size: padded_bytes_per_row(self.row_bytes()) as u64 * self.height as u64,
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                mapped_at_creation: false,
            })
        });

        *device = Some(DeviceState {
            texture,
            view,
            staging,
            readback,
        });
        drop(device);

        scope.finish_with(&self.describe())
    }

    /// Applies any staged host data, realizing the device resource first if
    /// needed. Called by the render pass immediately before binding; the
    /// copy happens exactly once per staged update.
    pub fn prepare_for_sampling(&self, gpu: &GpuContext) -> RenderResult<()> {
        self.init(gpu)?;

        let mut host = match &self.strategy {
            // A held CPU lock is an error here, not a wait.
            TransferStrategy::Shared { .. } => match self.host.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(p)) => p.into_inner(),
                Err(TryLockError::WouldBlock) => {
                    return Err(RenderError::resource(format!(
                        "{} is locked for CPU access; unlock it before sampling",
                        self.describe()
                    )));
                }
            },
            _ => self.host_state(),
        };

        if !host.dirty {
            return Ok(());
        }

        let scope = gpu.scoped("texture upload");
        match &self.strategy {
            TransferStrategy::Direct => {
                if let Some(PendingUpload::Bytes(bytes)) = host.pending.take() {
                    self.write_whole_image(gpu, &bytes, self.row_bytes())?;
                }
            }
            TransferStrategy::Staged => {
                if let Some(pending) = host.pending.take() {
                    self.flush_through_staging(gpu, pending)?;
                }
            }
            TransferStrategy::Shared { .. } => {
                let stride = self.shared_row_texels * self.channels * self.kind.size();
                self.write_whole_image(gpu, &host.shared, stride)?;
            }
        }
        host.dirty = false;
        drop(host);

        scope.finish_with(&self.describe())
    }

    /// Reads the device image back as tightly packed bytes.
    ///
    /// Applies staged data first, so an upload/read pair round-trips without
    /// an intervening pass. Rejected for the upload-only shared strategy.
    pub fn read_bytes(&self, gpu: &GpuContext) -> RenderResult<Vec<u8>> {
        if matches!(self.strategy, TransferStrategy::Shared { .. }) {
            return Err(RenderError::resource(format!(
                "{} is upload-only; it cannot be read back",
                self.describe()
            )));
        }
        self.prepare_for_sampling(gpu)?;

        let scope = gpu.scoped("texture read");

        let row_bytes = self.row_bytes();
        let padded = padded_bytes_per_row(row_bytes);

        let mut device = self.device_state();
        let state = device.as_mut().ok_or_else(|| {
            RenderError::resource(format!("{} has no device resource", self.describe()))
        })?;
        let readback = state.readback.get_or_insert_with(|| {
            gpu.device().create_buffer(&wgpu::BufferDescriptor {
                label: Some("pixelpass readback"),
                size: padded as u64 * self.height as u64,
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                mapped_at_creation: false,
            })
        });

        let mut encoder = gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("pixelpass readback encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &state.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(self.height),
                },
            },
            self.extent(),
        );
        gpu.queue().submit(std::iter::once(encoder.finish()));

        let slice = readback.slice(..);
        block_on_map(gpu, slice, wgpu::MapMode::Read, "texture read")?;

        let mut out = vec![0u8; row_bytes as usize * self.height as usize];
        {
            let mapped = slice.get_mapped_range();
            for y in 0..self.height as usize {
                let src = y * padded as usize;
                let dst = y * row_bytes as usize;
                out[dst..dst + row_bytes as usize]
                    .copy_from_slice(&mapped[src..src + row_bytes as usize]);
            }
        }
        readback.unmap();

        scope.finish_with(&self.describe())?;
        Ok(out)
    }

    /// Reads the device image back into `out`, which must hold exactly
    /// width x height x channels elements of the texture's kind.
    pub fn read_into<P: PixelElement>(&self, gpu: &GpuContext, out: &mut [P]) -> RenderResult<()> {
        self.check_kind::<P>()?;
        if out.len() != self.element_count() {
            return Err(RenderError::size_mismatch(self.element_count(), out.len()));
        }
        let bytes = self.read_bytes(gpu)?;
        bytemuck::cast_slice_mut::<P, u8>(out).copy_from_slice(&bytes);
        Ok(())
    }

    /// Reads the device image back and hands it to `reader` as a typed
    /// slice valid only for the duration of the call.
    pub fn read_with<P: PixelElement>(
        &self,
        gpu: &GpuContext,
        reader: impl FnOnce(&[P]),
    ) -> RenderResult<()> {
        self.check_kind::<P>()?;
        let bytes = self.read_bytes(gpu)?;
        let mut pixels = vec![P::zeroed(); self.element_count()];
        bytemuck::cast_slice_mut::<P, u8>(&mut pixels).copy_from_slice(&bytes);
        reader(&pixels);
        Ok(())
    }

    /// View onto the realized device texture.
    pub(crate) fn view(&self) -> RenderResult<wgpu::TextureView> {
        self.device_state()
            .as_ref()
            .map(|d| d.view.clone())
            .ok_or_else(|| {
                RenderError::resource(format!("{} has no device resource yet", self.describe()))
            })
    }

    fn write_whole_image(
        &self,
        gpu: &GpuContext,
        bytes: &[u8],
        bytes_per_row: u32,
    ) -> RenderResult<()> {
        let device = self.device_state();
        let state = device.as_ref().ok_or_else(|| {
            RenderError::resource(format!("{} has no device resource", self.describe()))
        })?;
        gpu.queue().write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &state.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytes,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(self.height),
            },
            self.extent(),
        );
        Ok(())
    }

    /// Fills the staging buffer (mapped write), then copies it into the
    /// image. Rows in the staging buffer are padded to the copy alignment.
    fn flush_through_staging(&self, gpu: &GpuContext, pending: PendingUpload) -> RenderResult<()> {
        let row_bytes = self.row_bytes() as usize;
        let padded = padded_bytes_per_row(self.row_bytes()) as usize;

        let device = self.device_state();
        let state = device.as_ref().ok_or_else(|| {
            RenderError::resource(format!("{} has no device resource", self.describe()))
        })?;
        let staging = state.staging.as_ref().ok_or_else(|| {
            RenderError::resource(format!("{} has no staging buffer", self.describe()))
        })?;

        let slice = staging.slice(..);
        block_on_map(gpu, slice, wgpu::MapMode::Write, "staged upload")?;
        {
            let mut mapped = slice.get_mapped_range_mut();
            let mut rows =
                StagedRows::new(&mut mapped, row_bytes, padded, self.height as usize);
            match pending {
                PendingUpload::Bytes(bytes) => rows.fill_from(&bytes),
                PendingUpload::Writer(writer) => writer(&mut rows),
            }
        }
        staging.unmap();

        let mut encoder = gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("pixelpass staged upload encoder"),
            });
        encoder.copy_buffer_to_texture(
            wgpu::TexelCopyBufferInfo {
                buffer: staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded as u32),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::TexelCopyTextureInfo {
                texture: &state.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            self.extent(),
        );
        gpu.queue().submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn check_kind<P: PixelElement>(&self) -> RenderResult<()> {
        if P::KIND != self.kind {
            return Err(RenderError::resource(format!(
                "element kind mismatch: {} holds {:?}, caller supplied {:?}",
                self.describe(),
                self.kind,
                P::KIND
            )));
        }
        Ok(())
    }

    fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }

    /// Staging size with rows padded to the copy alignment.
    fn padded_image_bytes(&self) -> u64 {
        padded_bytes_per_row(self.row_bytes()) as u64 * self.height as u64
    }

    fn host_state(&self) -> MutexGuard<'_, HostState> {
        self.host.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn device_state(&self) -> MutexGuard<'_, Option<DeviceState>> {
        self.device.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive CPU access to a shared texture's strided allocation.
///
/// Rows are `stride_bytes` apart; only the first `row_bytes` of each row are
/// image data. Dropping the guard unlocks and marks the texture dirty.
pub struct SharedGuard<'a> {
    host: MutexGuard<'a, HostState>,
    row_bytes: usize,
    stride: usize,
    height: usize,
    kind: ElementKind,
    expected_elements: usize,
}

impl SharedGuard<'_> {
    pub fn height(&self) -> usize {
        self.height
    }

    /// Image bytes per row (tight).
    pub fn row_bytes(&self) -> usize {
        self.row_bytes
    }

    /// Allocation bytes per row (the device-mandated stride).
    pub fn stride_bytes(&self) -> usize {
        self.stride
    }

    /// Mutable access to the image portion of row `y`.
    ///
    /// Panics if `y` is out of range.
    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        let start = y * self.stride;
        &mut self.host.shared[start..start + self.row_bytes]
    }

    /// Copies a tightly packed image into the strided allocation.
    ///
    /// `data` must hold exactly width x height x channels elements.
    pub fn write_pixels<P: PixelElement>(&mut self, data: &[P]) -> RenderResult<()> {
        if P::KIND != self.kind {
            return Err(RenderError::resource(format!(
                "element kind mismatch: allocation holds {:?}, caller supplied {:?}",
                self.kind,
                P::KIND
            )));
        }
        if data.len() != self.expected_elements {
            return Err(RenderError::size_mismatch(self.expected_elements, data.len()));
        }

        let bytes: &[u8] = bytemuck::cast_slice(data);
        for y in 0..self.height {
            let src = y * self.row_bytes;
            self.row_mut(y)
                .copy_from_slice(&bytes[src..src + self.row_bytes]);
        }
        Ok(())
    }
}

impl Drop for SharedGuard<'_> {
    fn drop(&mut self) {
        self.host.dirty = true;
    }
}

/// Row-structured view of mapped staging memory.
///
/// Rows are `stride` bytes apart to honor the device copy alignment; writers
/// fill the first `row_bytes` of each row.
pub struct StagedRows<'a> {
    data: &'a mut [u8],
    row_bytes: usize,
    stride: usize,
    height: usize,
}

impl<'a> StagedRows<'a> {
    pub(crate) fn new(data: &'a mut [u8], row_bytes: usize, stride: usize, height: usize) -> Self {
        Self {
            data,
            row_bytes,
            stride,
            height,
        }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn row_bytes(&self) -> usize {
        self.row_bytes
    }

    /// Mutable access to the image portion of row `y`.
    ///
    /// Panics if `y` is out of range.
    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        let start = y * self.stride;
        &mut self.data[start..start + self.row_bytes]
    }

    /// Copies a tightly packed image into the rows.
    fn fill_from(&mut self, tight: &[u8]) {
        for y in 0..self.height {
            let src = y * self.row_bytes;
            self.row_mut(y)
                .copy_from_slice(&tight[src..src + self.row_bytes]);
        }
    }
}

/// Rounds `row_bytes` up to the device copy alignment.
pub(crate) fn padded_bytes_per_row(row_bytes: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    row_bytes.div_ceil(align) * align
}

/// Maps `slice` and blocks until the map completes.
fn block_on_map(
    gpu: &GpuContext,
    slice: wgpu::BufferSlice<'_>,
    mode: wgpu::MapMode,
    what: &str,
) -> RenderResult<()> {
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(mode, move |res| {
        drop(tx.send(res));
    });
    loop {
        let _ = gpu.device().poll(wgpu::PollType::Wait);
        if let Ok(res) = rx.try_recv() {
            return res
                .map_err(|e| RenderError::resource(format!("{what}: buffer map failed: {e}")));
        }
    }
}
