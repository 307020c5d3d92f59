use crate::error::{RenderError, RenderResult};

/// Parsed API version of the active adapter.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ApiVersion {
    /// True for GL-family drivers ("OpenGL ES ..." version strings or the GL
    /// backend), which run the device in compatibility mode.
    pub is_compatibility: bool,
    pub major: u32,
    pub minor: u32,
}

impl ApiVersion {
    /// Parses a driver version string as reported by the adapter.
    ///
    /// An "OpenGL ES" prefix marks compatibility mode and is followed by the
    /// version pair; any other string contributes the first `major.minor`
    /// digit pair it contains. A string without such a pair is an error.
    pub fn parse(driver_info: &str, gl_backend: bool) -> RenderResult<Self> {
        let trimmed = driver_info.trim_start();
        let gles = trimmed.starts_with("OpenGL ES");

        let (major, minor) = first_version_pair(trimmed).ok_or_else(|| {
            RenderError::resource(format!(
                "cannot parse driver version string {driver_info:?}"
            ))
        })?;

        Ok(Self {
            is_compatibility: gles || gl_backend,
            major,
            minor,
        })
    }
}

impl std::fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)?;
        if self.is_compatibility {
            write!(f, " (compatibility)")?;
        }
        Ok(())
    }
}

/// Returns the first `major.minor` digit pair in `s`, if any.
fn first_version_pair(s: &str) -> Option<(u32, u32)> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }

        let major_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }

        if i < bytes.len() && bytes[i] == b'.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)
        {
            let minor_start = i + 1;
            let mut j = minor_start;
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            let major = s[major_start..i].parse().ok()?;
            let minor = s[minor_start..j].parse().ok()?;
            return Some((major, minor));
        }
        // Bare digit run without a ".minor" part; keep scanning.
    }
    None
}
