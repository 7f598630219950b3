//! Generated WGSL must parse and validate with naga.

use std::collections::BTreeSet;

use trailshade::shader::{mesh_shader, COMMON_WGSL};
use trailshade::{ColorBlendStage, DisplacementStage};

fn parse_and_validate(code: &str) -> Result<naga::Module, String> {
    let module = naga::front::wgsl::parse_str(code).map_err(|e| format!("WGSL parse error: {}", e.emit_to_string(code)))?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator
        .validate(&module)
        .map_err(|e| format!("WGSL validation error: {:?}", e))?;

    Ok(module)
}

#[test]
fn test_default_material_validates() {
    let code = mesh_shader(&DisplacementStage::default(), &ColorBlendStage::default());
    let module = parse_and_validate(&code).unwrap();

    let entry_points: Vec<(&str, naga::ShaderStage)> = module
        .entry_points
        .iter()
        .map(|ep| (ep.name.as_str(), ep.stage))
        .collect();
    assert!(entry_points.contains(&("vs_main", naga::ShaderStage::Vertex)));
    assert!(entry_points.contains(&("fs_main", naga::ShaderStage::Fragment)));
}

#[test]
fn test_custom_stages_validate() {
    let blend = ColorBlendStage {
        bands: [(0.0, 0.1), (0.1, 0.3), (0.3, 0.3), (0.5, 0.9), (0.9, 1.0)],
    };
    for min_scale in [0.0, 0.03, 0.5, 1.0] {
        let code = mesh_shader(&DisplacementStage::new(min_scale), &blend);
        if let Err(e) = parse_and_validate(&code) {
            panic!("min_scale {}: {}\n{}", min_scale, e, code);
        }
    }
}

#[test]
fn test_common_block_validates_alone() {
    parse_and_validate(COMMON_WGSL).unwrap();
}

#[test]
fn test_binding_layout() {
    let code = mesh_shader(&DisplacementStage::default(), &ColorBlendStage::default());
    let module = parse_and_validate(&code).unwrap();
    let bindings: BTreeSet<(u32, u32)> = module
        .global_variables
        .iter()
        .filter_map(|(_, var)| var.binding.as_ref().map(|b| (b.group, b.binding)))
        .collect();
    let expected: BTreeSet<(u32, u32)> = [(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2), (1, 3)]
        .into_iter()
        .collect();
    assert_eq!(bindings, expected);
}
