//! Feedback chaining and frame accumulation.

mod common;

use pixelpass::{ElementKind, RenderError, Renderer, RendererInit, ShaderSource};

const SIZE: u32 = 8;

fn renderer_with(kind: ElementKind, fragment: &str) -> Renderer {
    let mut init = RendererInit::new(SIZE, SIZE, 4, kind, ShaderSource::Text(fragment.into()));
    init.context = common::test_context();
    Renderer::new(init).unwrap()
}

/// Each frame reads the previous output and adds one, so after K frames the
/// counter proves frame N sampled exactly frame N-1.
#[test]
fn feedback_chains_frames() {
    let _gate = common::device_gate();

    let fragment = "
        @group(0) @binding(0) var previous: texture_2d<u32>;

        @fragment
        fn fs_main(@builtin(position) pos: vec4<f32>) -> @location(0) vec4<u32> {
            let prior = textureLoad(previous, vec2<i32>(pos.xy), 0);
            return prior + vec4<u32>(1u, 0u, 0u, 0u);
        }";
    let mut renderer = renderer_with(ElementKind::U32, fragment);
    renderer.enable_feedback("previous").unwrap();
    if !common::start_or_skip("feedback_chains_frames", &mut renderer) {
        return;
    }

    for _ in 0..5 {
        renderer.render().unwrap();
    }

    renderer.read_with(|pixels: &[u32]| {
        for chunk in pixels.chunks_exact(4) {
            assert_eq!(chunk, [5, 0, 0, 0]);
        }
    })
    .unwrap();
}

/// A feedback binding the shader does not declare must fail startup, not
/// silently render garbage.
#[test]
fn missing_feedback_binding_fails_start() {
    let _gate = common::device_gate();

    let fragment = "
        @fragment
        fn fs_main(@builtin(position) pos: vec4<f32>) -> @location(0) vec4<u32> {
            return vec4<u32>(1u, 2u, 3u, 4u);
        }";
    let mut renderer = renderer_with(ElementKind::U32, fragment);
    renderer.enable_feedback("previous").unwrap();

    match renderer.start() {
        Err(RenderError::ShaderCompile(reason)) => {
            assert!(reason.contains("previous"), "unhelpful error: {reason}");
            assert!(!renderer.is_alive());
        }
        Err(RenderError::Resource(reason)) => {
            eprintln!("skipping missing_feedback_binding_fails_start: {reason}");
        }
        other => panic!("start must fail on a missing feedback binding, got {other:?}"),
    }
}

/// Accumulated frames sum additively: K frames of a constant V read K*V.
/// Toggling accumulation restarts the sum.
#[test]
fn accumulation_sums_and_resets() {
    let _gate = common::device_gate();

    let fragment = "
        @fragment
        fn fs_main(@builtin(position) pos: vec4<f32>) -> @location(0) vec4<f32> {
            return vec4<f32>(0.5, 0.25, 1.0, 2.0);
        }";
    let mut renderer = renderer_with(ElementKind::F32, fragment);
    if !common::start_or_skip("accumulation_sums_and_resets", &mut renderer) {
        return;
    }
    renderer.set_accumulate(true);

    for frame in 0..4 {
        match renderer.render() {
            Ok(()) => {}
            // Float blending is an optional device feature; without it the
            // additive variant cannot exist.
            Err(RenderError::Resource(reason)) if frame == 0 => {
                eprintln!("skipping accumulation_sums_and_resets: {reason}");
                return;
            }
            Err(other) => panic!("accumulated pass failed: {other}"),
        }
    }
    renderer.read_with(|pixels: &[f32]| {
        for chunk in pixels.chunks_exact(4) {
            assert_eq!(chunk, [2.0, 1.0, 4.0, 8.0]);
        }
    })
    .unwrap();

    // Re-toggling resets the frame counter, so the sum starts over.
    renderer.set_accumulate(true);
    for _ in 0..2 {
        renderer.render().unwrap();
    }
    renderer.read_with(|pixels: &[f32]| {
        for chunk in pixels.chunks_exact(4) {
            assert_eq!(chunk, [1.0, 0.5, 2.0, 4.0]);
        }
    })
    .unwrap();
}

/// With accumulation off every frame overwrites the last one.
#[test]
fn plain_rendering_overwrites() {
    let _gate = common::device_gate();

    let fragment = "
        @fragment
        fn fs_main(@builtin(position) pos: vec4<f32>) -> @location(0) vec4<u32> {
            return vec4<u32>(9u, 8u, 7u, 6u);
        }";
    let mut renderer = renderer_with(ElementKind::U32, fragment);
    if !common::start_or_skip("plain_rendering_overwrites", &mut renderer) {
        return;
    }

    for _ in 0..3 {
        renderer.render().unwrap();
    }
    renderer.read_with(|pixels: &[u32]| {
        for chunk in pixels.chunks_exact(4) {
            assert_eq!(chunk, [9, 8, 7, 6]);
        }
    })
    .unwrap();
}
