//! Shared helpers for the GPU integration tests.
//!
//! Device creation is serialized through [`device_gate`]: some backends
//! misbehave when several test threads create and drop devices at once.

use std::sync::{Mutex, MutexGuard, PoisonError};

use pixelpass::{ContextInit, RenderError, Renderer};

static DEVICE_GATE: Mutex<()> = Mutex::new(());

pub fn device_gate() -> MutexGuard<'static, ()> {
    DEVICE_GATE.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Context parameters for headless test hosts.
pub fn test_context() -> ContextInit {
    ContextInit {
        power_preference: wgpu::PowerPreference::LowPower,
        ..ContextInit::default()
    }
}

/// Starts `renderer`; returns false (after logging why) when the host cannot
/// provide an adapter, so the caller can skip the test.
pub fn start_or_skip(test_name: &str, renderer: &mut Renderer) -> bool {
    match renderer.start() {
        Ok(()) => true,
        Err(RenderError::Resource(reason)) => {
            eprintln!("skipping {test_name}: {reason}");
            false
        }
        Err(other) => panic!("{test_name} could not start: {other}"),
    }
}
