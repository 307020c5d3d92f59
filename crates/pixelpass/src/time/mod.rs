//! Time subsystem.
//!
//! Provides the per-stage pass timer used by the render thread. Timing is
//! opt-in; a disabled timer is free.

mod stage_timer;

pub use stage_timer::StageTimer;
