use crate::error::{RenderError, RenderResult};

/// Element kind of a texture, fixed at construction.
///
/// Integral kinds map to integer-sampling device formats and read back
/// exactly; float kinds map to float formats.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ElementKind {
    F32,
    U32,
    I32,
    U16,
    I16,
    U8,
}

impl ElementKind {
    /// Size of one element in bytes.
    pub fn size(self) -> u32 {
        match self {
            ElementKind::F32 | ElementKind::U32 | ElementKind::I32 => 4,
            ElementKind::U16 | ElementKind::I16 => 2,
            ElementKind::U8 => 1,
        }
    }

    pub fn is_integral(self) -> bool {
        !matches!(self, ElementKind::F32)
    }

    /// Sample type the shader sees for this kind.
    pub(crate) fn sample_type(self) -> wgpu::TextureSampleType {
        match self {
            ElementKind::F32 => wgpu::TextureSampleType::Float { filterable: false },
            ElementKind::U32 | ElementKind::U16 | ElementKind::U8 => {
                wgpu::TextureSampleType::Uint
            }
            ElementKind::I32 | ElementKind::I16 => wgpu::TextureSampleType::Sint,
        }
    }

    /// WGSL scalar type texels of this kind load/store as.
    pub(crate) fn wgsl_scalar(self) -> &'static str {
        match self {
            ElementKind::F32 => "f32",
            ElementKind::U32 | ElementKind::U16 | ElementKind::U8 => "u32",
            ElementKind::I32 | ElementKind::I16 => "i32",
        }
    }

    /// Scalar kind a reflected `texture_2d<_>` binding must declare to
    /// sample this kind.
    pub(crate) fn scalar_kind(self) -> naga::ScalarKind {
        match self {
            ElementKind::F32 => naga::ScalarKind::Float,
            ElementKind::U32 | ElementKind::U16 | ElementKind::U8 => naga::ScalarKind::Uint,
            ElementKind::I32 | ElementKind::I16 => naga::ScalarKind::Sint,
        }
    }
}

/// Host-side element types that can fill or receive texture data.
///
/// Sealed: exactly the six kinds of [`ElementKind`] are supported.
pub trait PixelElement: bytemuck::Pod + Send + Sync + sealed::Sealed + 'static {
    const KIND: ElementKind;
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for u32 {}
    impl Sealed for i32 {}
    impl Sealed for u16 {}
    impl Sealed for i16 {}
    impl Sealed for u8 {}
}

impl PixelElement for f32 {
    const KIND: ElementKind = ElementKind::F32;
}
impl PixelElement for u32 {
    const KIND: ElementKind = ElementKind::U32;
}
impl PixelElement for i32 {
    const KIND: ElementKind = ElementKind::I32;
}
impl PixelElement for u16 {
    const KIND: ElementKind = ElementKind::U16;
}
impl PixelElement for i16 {
    const KIND: ElementKind = ElementKind::I16;
}
impl PixelElement for u8 {
    const KIND: ElementKind = ElementKind::U8;
}

/// Device format for a `(kind, channels)` pair.
///
/// There are no 3-channel device formats; 1, 2 and 4 channels are supported.
pub(crate) fn texture_format(
    kind: ElementKind,
    channels: u32,
) -> RenderResult<wgpu::TextureFormat> {
    use wgpu::TextureFormat as F;

    let format = match (kind, channels) {
        (ElementKind::F32, 1) => F::R32Float,
        (ElementKind::F32, 2) => F::Rg32Float,
        (ElementKind::F32, 4) => F::Rgba32Float,
        (ElementKind::U32, 1) => F::R32Uint,
        (ElementKind::U32, 2) => F::Rg32Uint,
        (ElementKind::U32, 4) => F::Rgba32Uint,
        (ElementKind::I32, 1) => F::R32Sint,
        (ElementKind::I32, 2) => F::Rg32Sint,
        (ElementKind::I32, 4) => F::Rgba32Sint,
        (ElementKind::U16, 1) => F::R16Uint,
        (ElementKind::U16, 2) => F::Rg16Uint,
        (ElementKind::U16, 4) => F::Rgba16Uint,
        (ElementKind::I16, 1) => F::R16Sint,
        (ElementKind::I16, 2) => F::Rg16Sint,
        (ElementKind::I16, 4) => F::Rgba16Sint,
        (ElementKind::U8, 1) => F::R8Uint,
        (ElementKind::U8, 2) => F::Rg8Uint,
        (ElementKind::U8, 4) => F::Rgba8Uint,
        (_, 3) => {
            return Err(RenderError::resource(format!(
                "no device format for 3-channel {kind:?} textures (use 4 channels)"
            )));
        }
        (_, n) => {
            return Err(RenderError::resource(format!(
                "channel count must be 1, 2 or 4, got {n}"
            )));
        }
    };
    Ok(format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_kinds_use_integer_sampling_formats() {
        assert_eq!(
            texture_format(ElementKind::U16, 4).unwrap(),
            wgpu::TextureFormat::Rgba16Uint
        );
        assert_eq!(
            texture_format(ElementKind::I32, 1).unwrap(),
            wgpu::TextureFormat::R32Sint
        );
        assert_eq!(
            texture_format(ElementKind::U8, 2).unwrap(),
            wgpu::TextureFormat::Rg8Uint
        );
    }

    #[test]
    fn float_kind_uses_float_formats() {
        assert_eq!(
            texture_format(ElementKind::F32, 4).unwrap(),
            wgpu::TextureFormat::Rgba32Float
        );
    }

    #[test]
    fn three_channels_are_rejected() {
        for kind in [ElementKind::F32, ElementKind::U8, ElementKind::U16] {
            assert!(texture_format(kind, 3).is_err());
        }
    }

    #[test]
    fn out_of_range_channel_counts_are_rejected() {
        assert!(texture_format(ElementKind::U8, 0).is_err());
        assert!(texture_format(ElementKind::U8, 5).is_err());
    }

    #[test]
    fn element_sizes_match_their_kinds() {
        assert_eq!(ElementKind::F32.size(), 4);
        assert_eq!(ElementKind::U16.size(), 2);
        assert_eq!(ElementKind::U8.size(), 1);
    }

    #[test]
    fn wgsl_scalars_widen_narrow_integers() {
        assert_eq!(ElementKind::U16.wgsl_scalar(), "u32");
        assert_eq!(ElementKind::I16.wgsl_scalar(), "i32");
        assert_eq!(ElementKind::F32.wgsl_scalar(), "f32");
    }
}
