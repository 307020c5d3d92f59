use naga::valid::{Capabilities, ValidationFlags, Validator};

use crate::error::{RenderError, RenderResult};

/// One sampled-texture binding declared by the module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TextureBinding {
    pub name: String,
    pub binding: u32,
    pub sample_kind: naga::ScalarKind,
}

/// The texture bindings a validated module exposes, ordered by slot.
#[derive(Debug, Clone, Default)]
pub(crate) struct ShaderInterface {
    bindings: Vec<TextureBinding>,
}

impl ShaderInterface {
    pub(crate) fn binding(&self, name: &str) -> Option<&TextureBinding> {
        self.bindings.iter().find(|b| b.name == name)
    }

    pub(crate) fn bindings(&self) -> &[TextureBinding] {
        &self.bindings
    }
}

/// Parses and validates `source`, then collects its texture bindings.
///
/// The contract is narrow: inputs are non-arrayed sampled 2-D textures in
/// bind group 0, fetched with `textureLoad`. Samplers, storage or depth
/// textures, uniform and storage buffers are rejected here rather than at
/// pipeline creation so the report names the offending declaration.
pub(crate) fn reflect(source: &str) -> RenderResult<ShaderInterface> {
    let module = naga::front::wgsl::parse_str(source)
        .map_err(|e| RenderError::shader(e.emit_to_string(source)))?;
    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|e| RenderError::shader(e.emit_to_string(source)))?;

    let fragment = module
        .entry_points
        .iter()
        .any(|ep| ep.stage == naga::ShaderStage::Fragment && ep.name == "fs_main");
    if !fragment {
        return Err(RenderError::shader(
            "no fragment entry point named 'fs_main'",
        ));
    }

    let mut bindings = Vec::new();
    for (_, var) in module.global_variables.iter() {
        let Some(resource) = &var.binding else {
            continue;
        };
        let name = var.name.clone().unwrap_or_default();
        match &module.types[var.ty].inner {
            naga::TypeInner::Image {
                dim: naga::ImageDimension::D2,
                arrayed: false,
                class: naga::ImageClass::Sampled { kind, multi: false },
            } => {
                if resource.group != 0 {
                    return Err(RenderError::shader(format!(
                        "texture binding '{name}' uses group {}, only group 0 is bound",
                        resource.group
                    )));
                }
                bindings.push(TextureBinding {
                    name,
                    binding: resource.binding,
                    sample_kind: *kind,
                });
            }
            naga::TypeInner::Sampler { .. } => {
                return Err(RenderError::shader(format!(
                    "sampler '{name}' is not supported; fetch texels with textureLoad"
                )));
            }
            naga::TypeInner::Image { .. } => {
                return Err(RenderError::shader(format!(
                    "texture binding '{name}' has an unsupported image type; \
                     only non-arrayed sampled 2-D textures are bound"
                )));
            }
            _ => {
                return Err(RenderError::shader(format!(
                    "binding '{name}' has an unsupported type; \
                     only sampled 2-D textures are bound"
                )));
            }
        }
    }

    bindings.sort_by_key(|b| b.binding);
    Ok(ShaderInterface { bindings })
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDENTITY: &str = r#"
@group(0) @binding(0) var source: texture_2d<f32>;
@group(0) @binding(1) var weights: texture_2d<u32>;

@fragment
fn fs_main(@builtin(position) pos: vec4<f32>) -> @location(0) vec4<f32> {
    let p = vec2<i32>(pos.xy);
    let w = textureLoad(weights, p, 0);
    return textureLoad(source, p, 0) * f32(w.x);
}
"#;

    #[test]
    fn collects_texture_bindings_in_slot_order() {
        let interface = reflect(IDENTITY).unwrap();
        let names: Vec<_> = interface.bindings().iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["source", "weights"]);
        assert_eq!(interface.binding("weights").unwrap().binding, 1);
        assert_eq!(
            interface.binding("source").unwrap().sample_kind,
            naga::ScalarKind::Float
        );
        assert_eq!(
            interface.binding("weights").unwrap().sample_kind,
            naga::ScalarKind::Uint
        );
        assert!(interface.binding("missing").is_none());
    }

    #[test]
    fn rejects_bindings_outside_group_zero() {
        let src = r#"
@group(1) @binding(0) var source: texture_2d<f32>;
@fragment
fn fs_main(@builtin(position) pos: vec4<f32>) -> @location(0) vec4<f32> {
    return textureLoad(source, vec2<i32>(pos.xy), 0);
}
"#;
        let err = reflect(src).unwrap_err();
        assert!(err.to_string().contains("group 1"));
    }

    #[test]
    fn rejects_samplers() {
        let src = r#"
@group(0) @binding(0) var source: texture_2d<f32>;
@group(0) @binding(1) var samp: sampler;
@fragment
fn fs_main(@builtin(position) pos: vec4<f32>) -> @location(0) vec4<f32> {
    return textureSample(source, samp, pos.xy);
}
"#;
        let err = reflect(src).unwrap_err();
        assert!(err.to_string().contains("sampler"));
    }

    #[test]
    fn rejects_invalid_source() {
        assert!(matches!(
            reflect("fn fs_main( {"),
            Err(crate::error::RenderError::ShaderCompile(_))
        ));
    }

    #[test]
    fn rejects_missing_fragment_entry_point() {
        let src = r#"
@fragment
fn main_fs(@builtin(position) pos: vec4<f32>) -> @location(0) vec4<f32> {
    return vec4<f32>(0.0);
}
"#;
        let err = reflect(src).unwrap_err();
        assert!(err.to_string().contains("fs_main"));
    }

    #[test]
    fn rejects_duplicate_slots() {
        let src = r#"
@group(0) @binding(0) var a: texture_2d<f32>;
@group(0) @binding(0) var b: texture_2d<f32>;
@fragment
fn fs_main(@builtin(position) pos: vec4<f32>) -> @location(0) vec4<f32> {
    let p = vec2<i32>(pos.xy);
    return textureLoad(a, p, 0) + textureLoad(b, p, 0);
}
"#;
        assert!(matches!(
            reflect(src),
            Err(crate::error::RenderError::ShaderCompile(_))
        ));
    }
}
