use crate::texture::ElementKind;

/// Fragment stage substituted when a watched reload fails.
///
/// Paints 200 along the main diagonal in the first channel and along the
/// anti-diagonal in the last, zero elsewhere, so a broken shader is obvious
/// at a glance. Dimension tokens are resolved by the usual preprocessing.
pub(crate) fn fallback_fragment(kind: ElementKind) -> String {
    let scalar = kind.wgsl_scalar();
    let (zero, mark) = match scalar {
        "f32" => ("0.0", "200.0"),
        "u32" => ("0u", "200u"),
        _ => ("0", "200"),
    };
    format!(
        r#"@fragment
fn fs_main(@builtin(position) frag_pos: vec4<f32>) -> @location(0) vec4<{scalar}> {{
    let pos = vec2<i32>(frag_pos.xy);
    var color = vec4<{scalar}>({zero});
    if pos.x == pos.y {{
        color.x = {mark};
    }}
    if pos.x == HEIGHT - pos.y {{
        color.w = {mark};
    }}
    return color;
}}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::{compose_module, reflect, ShaderDefines};

    #[test]
    fn fallback_validates_for_every_kind() {
        let defines = ShaderDefines::for_dimensions(8, 8);
        for kind in [
            ElementKind::F32,
            ElementKind::U32,
            ElementKind::I32,
            ElementKind::U16,
            ElementKind::I16,
            ElementKind::U8,
        ] {
            let fragment = defines.apply(&fallback_fragment(kind));
            let interface = reflect(&compose_module(&fragment))
                .unwrap_or_else(|e| panic!("fallback for {kind:?} invalid: {e}"));
            assert!(interface.bindings().is_empty());
        }
    }

    #[test]
    fn fallback_references_no_dimensions_after_substitution() {
        let defines = ShaderDefines::for_dimensions(32, 16);
        let fragment = defines.apply(&fallback_fragment(ElementKind::F32));
        assert!(fragment.contains("16 - pos.y"));
        assert!(!fragment.contains("HEIGHT"));
    }
}
