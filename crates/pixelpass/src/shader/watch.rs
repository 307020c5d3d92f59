use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use crate::error::{RenderError, RenderResult};

/// Timing knobs of the shader file watcher.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// How often the file's modification time is checked at most.
    pub poll_interval: Duration,
    /// Pause between noticing a change and reading the file, to let the
    /// editor finish writing.
    pub debounce: Duration,
    /// Backoff between reload attempts after a failed one.
    pub retry_interval: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            debounce: Duration::from_millis(10),
            retry_interval: Duration::from_secs(2),
        }
    }
}

/// Tracks a watched shader file and decides when a reload attempt is due.
///
/// Two regimes: normally a change in the file's modification time triggers
/// one attempt; after [`ShaderWatcher::attempt_failed`] the watcher turns
/// into a fixed-interval retry loop that re-reads the file each time until
/// an attempt succeeds.
pub(crate) struct ShaderWatcher {
    path: PathBuf,
    config: WatchConfig,
    last_poll: Instant,
    known_mtime: Option<SystemTime>,
    retry_at: Option<Instant>,
}

impl ShaderWatcher {
    pub(crate) fn new(path: PathBuf, config: WatchConfig) -> Self {
        let known_mtime = mtime(&path);
        Self {
            path,
            config,
            last_poll: Instant::now(),
            known_mtime,
            retry_at: None,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the freshly read source when a reload attempt is due.
    ///
    /// The caller reports the attempt's outcome through
    /// [`ShaderWatcher::attempt_failed`] or [`ShaderWatcher::attempt_succeeded`].
    pub(crate) fn poll(&mut self) -> Option<RenderResult<String>> {
        let now = Instant::now();

        if let Some(retry_at) = self.retry_at {
            if now < retry_at {
                return None;
            }
            self.known_mtime = mtime(&self.path);
            return Some(self.read());
        }

        if now.duration_since(self.last_poll) < self.config.poll_interval {
            return None;
        }
        self.last_poll = now;

        let current = mtime(&self.path);
        if current == self.known_mtime {
            return None;
        }
        log::info!(
            "fragment shader file {} changed, updating shader program",
            self.path.display()
        );
        std::thread::sleep(self.config.debounce);
        self.known_mtime = mtime(&self.path);
        Some(self.read())
    }

    pub(crate) fn attempt_failed(&mut self) {
        self.retry_at = Some(Instant::now() + self.config.retry_interval);
    }

    pub(crate) fn attempt_succeeded(&mut self) {
        self.retry_at = None;
    }

    fn read(&self) -> RenderResult<String> {
        std::fs::read_to_string(&self.path).map_err(|e| {
            RenderError::shader(format!("failed to read {}: {e}", self.path.display()))
        })
    }
}

fn mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_config() -> WatchConfig {
        WatchConfig {
            poll_interval: Duration::from_millis(5),
            debounce: Duration::from_millis(1),
            retry_interval: Duration::from_millis(10),
        }
    }

    fn wait(d: Duration) {
        std::thread::sleep(d + Duration::from_millis(2));
    }

    #[test]
    fn change_triggers_one_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pass.wgsl");
        std::fs::write(&path, "a").unwrap();

        let mut watcher = ShaderWatcher::new(path.clone(), quick_config());
        wait(watcher.config.poll_interval);
        assert!(watcher.poll().is_none(), "unchanged file must not trigger");

        wait(Duration::from_millis(20));
        std::fs::write(&path, "b").unwrap();
        wait(watcher.config.poll_interval);
        let source = watcher.poll().expect("change must trigger").unwrap();
        assert_eq!(source, "b");
        watcher.attempt_succeeded();

        wait(watcher.config.poll_interval);
        assert!(watcher.poll().is_none(), "same mtime must not re-trigger");
    }

    #[test]
    fn poll_is_throttled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pass.wgsl");
        std::fs::write(&path, "a").unwrap();

        let mut watcher = ShaderWatcher::new(
            path,
            WatchConfig {
                poll_interval: Duration::from_secs(60),
                ..quick_config()
            },
        );
        assert!(watcher.poll().is_none(), "first interval has not elapsed");
    }

    #[test]
    fn failed_attempt_retries_with_fresh_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pass.wgsl");
        std::fs::write(&path, "a").unwrap();

        let mut watcher = ShaderWatcher::new(path.clone(), quick_config());
        wait(Duration::from_millis(20));
        std::fs::write(&path, "broken").unwrap();
        wait(watcher.config.poll_interval);
        assert_eq!(watcher.poll().unwrap().unwrap(), "broken");
        watcher.attempt_failed();

        assert!(watcher.poll().is_none(), "retry interval has not elapsed");

        std::fs::write(&path, "fixed").unwrap();
        wait(watcher.config.retry_interval);
        assert_eq!(watcher.poll().unwrap().unwrap(), "fixed");
        watcher.attempt_succeeded();

        wait(watcher.config.poll_interval);
        assert!(watcher.poll().is_none(), "retry state must be cleared");
    }

    #[test]
    fn missing_file_surfaces_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pass.wgsl");
        std::fs::write(&path, "a").unwrap();

        let mut watcher = ShaderWatcher::new(path.clone(), quick_config());
        wait(Duration::from_millis(20));
        std::fs::remove_file(&path).unwrap();
        wait(watcher.config.poll_interval);
        let result = watcher.poll().expect("deleted file counts as a change");
        assert!(result.is_err());
    }
}
