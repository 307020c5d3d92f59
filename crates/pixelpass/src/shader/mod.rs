//! Fragment shader handling: source loading, dimension macro substitution,
//! reflection, the fallback debug shader and file watching.

use std::path::{Path, PathBuf};

use crate::error::{RenderError, RenderResult};

mod fallback;
mod preprocess;
mod reflect;
mod watch;

pub use watch::WatchConfig;

pub(crate) use fallback::fallback_fragment;
pub(crate) use preprocess::ShaderDefines;
pub(crate) use reflect::{reflect, ShaderInterface};
pub(crate) use watch::ShaderWatcher;

/// Where the fragment stage comes from.
#[derive(Debug, Clone)]
pub enum ShaderSource {
    /// Inline source text.
    Text(String),
    /// Source loaded from a file. The render thread watches the file for
    /// changes and recompiles on the fly.
    File(PathBuf),
}

impl ShaderSource {
    pub(crate) fn load(&self) -> RenderResult<String> {
        match self {
            ShaderSource::Text(text) => Ok(text.clone()),
            ShaderSource::File(path) => std::fs::read_to_string(path).map_err(|e| {
                RenderError::shader(format!("failed to read shader {}: {e}", path.display()))
            }),
        }
    }

    pub(crate) fn watched_path(&self) -> Option<&Path> {
        match self {
            ShaderSource::Text(_) => None,
            ShaderSource::File(path) => Some(path),
        }
    }
}

/// Vertex stage appended to every fragment source: a fullscreen quad drawn
/// as two triangles, no vertex buffer.
const VERTEX_STAGE: &str = r#"
@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {
    var positions = array<vec2<f32>, 6>(
        vec2<f32>(-1.0, -1.0), vec2<f32>(1.0, -1.0), vec2<f32>(1.0, 1.0),
        vec2<f32>(1.0, 1.0), vec2<f32>(-1.0, 1.0), vec2<f32>(-1.0, -1.0),
    );
    return vec4<f32>(positions[index], 0.0, 1.0);
}
"#;

/// Builds the complete module text from a fragment stage.
pub(crate) fn compose_module(fragment: &str) -> String {
    format!("{fragment}\n{VERTEX_STAGE}")
}
