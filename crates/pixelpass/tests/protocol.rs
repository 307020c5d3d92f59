//! Client/render-thread rendezvous behavior under adverse conditions.

mod common;

use std::time::Duration;

use pixelpass::{ElementKind, RenderError, Renderer, RendererInit, ShaderSource};

const FRAGMENT: &str = "
    @fragment
    fn fs_main(@builtin(position) pos: vec4<f32>) -> @location(0) vec4<u32> {
        return vec4<u32>(1u, 1u, 1u, 1u);
    }";

fn renderer() -> Renderer {
    let mut init = RendererInit::new(4, 4, 4, ElementKind::U8, ShaderSource::Text(FRAGMENT.into()));
    init.context = common::test_context();
    Renderer::new(init).unwrap()
}

/// A render thread stalled past the rendezvous timeout fails the call and
/// poisons the renderer instead of hanging the client forever.
#[test]
fn stalled_render_thread_times_out_and_poisons() {
    let _gate = common::device_gate();

    let mut renderer = renderer();
    renderer
        .set_texture_update_hook(|| std::thread::sleep(Duration::from_secs(6)))
        .unwrap();
    if !common::start_or_skip("stalled_render_thread_times_out_and_poisons", &mut renderer) {
        return;
    }

    let err = renderer.render().expect_err("a 6s stall must not succeed");
    assert!(matches!(err, RenderError::Protocol(_)), "got {err:?}");
    assert!(!renderer.is_alive());

    // Poisoned: the next request fails fast with the same error.
    let replay = renderer.render().expect_err("poisoned renderer must fail");
    assert_eq!(replay, err);
}

#[test]
fn double_start_is_rejected() {
    let _gate = common::device_gate();

    let mut renderer = renderer();
    if !common::start_or_skip("double_start_is_rejected", &mut renderer) {
        return;
    }
    assert!(matches!(
        renderer.start(),
        Err(RenderError::Protocol(_))
    ));

    // The first start is unaffected.
    assert!(renderer.is_alive());
    renderer.render().unwrap();
}

#[test]
fn configuration_is_rejected_after_start() {
    let _gate = common::device_gate();

    let mut renderer = renderer();
    if !common::start_or_skip("configuration_is_rejected_after_start", &mut renderer) {
        return;
    }
    assert!(renderer.enable_feedback("previous").is_err());
    assert!(renderer
        .set_texture_update_hook(|| {})
        .is_err());
}
