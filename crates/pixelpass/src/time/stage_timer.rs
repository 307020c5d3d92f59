use std::time::{Duration, Instant};

/// Accumulates named stage durations within one render pass.
///
/// The render thread marks a baseline with [`StageTimer::begin`], calls
/// [`StageTimer::measure`] after each stage of interest, and drains the
/// collected stages into a single summary line with [`StageTimer::finish`].
///
/// A timer constructed disabled never allocates and every call is a no-op,
/// so the instrumentation can stay in the pass unconditionally.
#[derive(Debug)]
pub struct StageTimer {
    enabled: bool,
    last: Instant,
    stages: Vec<(String, Duration)>,
}

impl StageTimer {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            last: Instant::now(),
            stages: Vec::new(),
        }
    }

    /// Resets the baseline at the head of a pass.
    pub fn begin(&mut self) {
        if self.enabled {
            self.last = Instant::now();
            self.stages.clear();
        }
    }

    /// Records the time elapsed since the previous mark under `stage`.
    pub fn measure(&mut self, stage: &str) {
        if !self.enabled {
            return;
        }
        let now = Instant::now();
        self.stages
            .push((stage.to_string(), now.saturating_duration_since(self.last)));
        self.last = now;
    }

    /// Drains the collected stages into a summary line, or `None` when
    /// disabled or nothing was measured.
    pub fn finish(&mut self) -> Option<String> {
        if !self.enabled || self.stages.is_empty() {
            return None;
        }
        let mut line = String::from("pass timing:");
        for (stage, dt) in self.stages.drain(..) {
            line.push_str(&format!(" {stage}={:.3}ms", dt.as_secs_f64() * 1e3));
        }
        Some(line)
    }
}
