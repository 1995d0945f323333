//! The shipped scenario file stays loadable and consistent with the presets.

use std::path::Path;

use td_app::{get_scenario, load_scenarios, reference_presets, validate_scenarios};

fn reference_file() -> td_app::ScenarioFile {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../scenarios/reference.yaml");
    load_scenarios(&path).unwrap()
}

#[test]
fn shipped_file_validates() {
    validate_scenarios(&reference_file()).unwrap();
}

#[test]
fn shipped_file_contains_presets() {
    let file = reference_file();
    for preset in reference_presets().scenarios {
        assert_eq!(get_scenario(&file, &preset.id).unwrap(), &preset);
    }
}
