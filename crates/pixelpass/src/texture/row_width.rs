/// Computes the row width a shared host-aliased allocation must use.
///
/// The arithmetic of the default policy is empirically derived from one
/// platform's buffer allocator; implement this trait to substitute the rule
/// for platforms with different granularity.
pub trait RowWidthPolicy: Send + Sync {
    /// Mandated row width in texels for a requested `width` and element size
    /// in bytes.
    fn row_width(&self, width: u32, element_size: u32) -> u32;

    /// True when the allocator consumes `width` as-is.
    fn is_native_width(&self, width: u32, element_size: u32) -> bool {
        self.row_width(width, element_size) == width
    }
}

/// Default row-width rule: scale by `element_size / 2`, round up to the next
/// multiple of 64, then skip multiples of 256 (the allocator rejects row
/// widths of 512, 768, 1024, ...) by adding another 64.
#[derive(Debug, Default, Copy, Clone)]
pub struct DefaultRowWidthPolicy;

impl RowWidthPolicy for DefaultRowWidthPolicy {
    fn row_width(&self, width: u32, element_size: u32) -> u32 {
        let mut w = width * (element_size / 2);
        let over = w % 64;
        if over != 0 {
            w += 64 - over;
        }
        if w % 256 == 0 {
            w += 64;
        }
        w
    }
}
