//! Upload → identity shader → readback round trips for every element kind.
//!
//! The odd 21x17 size keeps rows away from the 256-byte copy alignment, so
//! the padded upload and readback paths are actually exercised.

mod common;

use std::sync::Arc;

use bytemuck::Zeroable;
use pixelpass::{
    ElementKind, PixelElement, Renderer, RendererInit, ShaderSource, Texture, TransferStrategy,
};

const WIDTH: u32 = 21;
const HEIGHT: u32 = 17;

fn identity_shader(scalar: &str) -> String {
    format!(
        "@group(0) @binding(0) var source: texture_2d<{scalar}>;

         @fragment
         fn fs_main(@builtin(position) pos: vec4<f32>) -> @location(0) vec4<{scalar}> {{
             return textureLoad(source, vec2<i32>(pos.xy), 0);
         }}"
    )
}

fn pattern<P: PixelElement>(fill: impl Fn(u64) -> P) -> Vec<P> {
    (0..(WIDTH * HEIGHT * 4) as u64).map(fill).collect()
}

/// Runs one frame of the identity shader over `data` and returns the
/// readback, or `None` when the host has no adapter.
fn render_identity<P: PixelElement>(test_name: &str, scalar: &str, data: &[P]) -> Option<Vec<P>> {
    let _gate = common::device_gate();

    let texture = Arc::new(
        Texture::new(WIDTH, HEIGHT, 4, P::KIND, TransferStrategy::Direct).unwrap(),
    );
    texture.upload(data).unwrap();

    let mut init = RendererInit::new(
        WIDTH,
        HEIGHT,
        4,
        P::KIND,
        ShaderSource::Text(identity_shader(scalar)),
    );
    init.context = common::test_context();
    let mut renderer = Renderer::new(init).unwrap();
    renderer.add_input("source", texture).unwrap();
    if !common::start_or_skip(test_name, &mut renderer) {
        return None;
    }

    renderer.render().unwrap();
    let mut out = vec![P::zeroed(); renderer.element_count()];
    renderer.read_into(&mut out).unwrap();
    Some(out)
}

#[test]
fn u8_roundtrip_is_exact() {
    let data = pattern(|i| (i * 7 + 13) as u8);
    if let Some(out) = render_identity("u8_roundtrip_is_exact", "u32", &data) {
        assert_eq!(out, data);
    }
}

#[test]
fn u16_roundtrip_is_exact() {
    let data = pattern(|i| (i * 211) as u16);
    if let Some(out) = render_identity("u16_roundtrip_is_exact", "u32", &data) {
        assert_eq!(out, data);
    }
}

#[test]
fn i16_roundtrip_is_exact() {
    let data = pattern(|i| (i as i64 * 311 % 30000 - 15000) as i16);
    if let Some(out) = render_identity("i16_roundtrip_is_exact", "i32", &data) {
        assert_eq!(out, data);
    }
}

#[test]
fn u32_roundtrip_is_exact() {
    let data = pattern(|i| (i.wrapping_mul(2_654_435_761)) as u32);
    if let Some(out) = render_identity("u32_roundtrip_is_exact", "u32", &data) {
        assert_eq!(out, data);
    }
}

#[test]
fn i32_roundtrip_is_exact() {
    let data = pattern(|i| (i as i64 * 97 - 50_000) as i32);
    if let Some(out) = render_identity("i32_roundtrip_is_exact", "i32", &data) {
        assert_eq!(out, data);
    }
}

#[test]
fn f32_roundtrip_is_close() {
    let data = pattern(|i| i as f32 * 0.25 - 100.0);
    if let Some(out) = render_identity("f32_roundtrip_is_close", "f32", &data) {
        for (got, want) in out.iter().zip(&data) {
            assert!((got - want).abs() < 1e-4, "got {got}, want {want}");
        }
    }
}

/// The shared strategy's strided rows must land the same image as a tight
/// upload of the same pixels.
#[test]
fn shared_upload_lands_strided_rows() {
    let _gate = common::device_gate();

    let data = pattern(|i| (i * 131 + 7) as u16);
    let texture = Arc::new(
        Texture::new(
            WIDTH,
            HEIGHT,
            4,
            ElementKind::U16,
            TransferStrategy::shared(),
        )
        .unwrap(),
    );
    {
        let mut guard = texture.lock().unwrap();
        guard.write_pixels(&data).unwrap();
    }

    let mut init = RendererInit::new(
        WIDTH,
        HEIGHT,
        4,
        ElementKind::U16,
        ShaderSource::Text(identity_shader("u32")),
    );
    init.context = common::test_context();
    let mut renderer = Renderer::new(init).unwrap();
    renderer.add_input("source", texture).unwrap();
    if !common::start_or_skip("shared_upload_lands_strided_rows", &mut renderer) {
        return;
    }

    renderer.render().unwrap();
    let mut out = vec![0u16; renderer.element_count()];
    renderer.read_into(&mut out).unwrap();
    assert_eq!(out, data);
}

/// The staged strategy must land the same bytes as the direct one.
#[test]
fn staged_upload_matches_direct() {
    let _gate = common::device_gate();

    let data = pattern(|i| (i * 3 + 1) as u8);
    let texture = Arc::new(
        Texture::new(WIDTH, HEIGHT, 4, ElementKind::U8, TransferStrategy::Staged).unwrap(),
    );
    texture.upload(&data).unwrap();

    let mut init = RendererInit::new(
        WIDTH,
        HEIGHT,
        4,
        ElementKind::U8,
        ShaderSource::Text(identity_shader("u32")),
    );
    init.context = common::test_context();
    let mut renderer = Renderer::new(init).unwrap();
    renderer.add_input("source", texture).unwrap();
    if !common::start_or_skip("staged_upload_matches_direct", &mut renderer) {
        return;
    }

    renderer.render().unwrap();
    let mut out = vec![0u8; renderer.element_count()];
    renderer.read_into(&mut out).unwrap();
    assert_eq!(out, data);
}
