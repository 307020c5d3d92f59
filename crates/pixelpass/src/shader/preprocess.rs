use std::fmt::Display;

/// Ordered macro table applied to shader source before compilation.
///
/// Substitution is plain text replacement in registration order; tokens are
/// not required to fall on identifier boundaries, and a later macro sees the
/// replacements of earlier ones.
#[derive(Debug, Clone, Default)]
pub(crate) struct ShaderDefines {
    macros: Vec<(String, String)>,
}

impl ShaderDefines {
    /// Registers both spellings of the render target dimensions.
    pub(crate) fn for_dimensions(width: u32, height: u32) -> Self {
        let mut defines = Self::default();
        defines.define("$width", width);
        defines.define("$height", height);
        defines.define("WIDTH", width);
        defines.define("HEIGHT", height);
        defines
    }

    pub(crate) fn define(&mut self, token: &str, value: impl Display) {
        self.macros.push((token.to_string(), value.to_string()));
    }

    pub(crate) fn apply(&self, source: &str) -> String {
        let mut out = source.to_string();
        for (token, value) in &self.macros {
            out = out.replace(token, value);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_both_dimension_spellings() {
        let defines = ShaderDefines::for_dimensions(640, 480);
        let out = defines.apply("let a = $width * $height; let b = WIDTH + HEIGHT;");
        assert_eq!(out, "let a = 640 * 480; let b = 640 + 480;");
    }

    #[test]
    fn leaves_unknown_tokens_alone() {
        let defines = ShaderDefines::for_dimensions(8, 8);
        assert_eq!(defines.apply("let w = $depth;"), "let w = $depth;");
    }

    #[test]
    fn replaces_every_occurrence() {
        let mut defines = ShaderDefines::default();
        defines.define("N", 3);
        assert_eq!(defines.apply("N + N + N"), "3 + 3 + 3");
    }
}
