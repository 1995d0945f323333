//! Scenario loading, saving, validation, and introspection.

use std::collections::HashSet;
use std::path::Path;

use td_sim::{MAX_OUTPUT_SAMPLES, MAX_TOLERANCE};
use td_tank::GeometryKind;

use crate::error::{AppError, AppResult};
use crate::scenario::{ScenarioDef, ScenarioFile, SizingDef, reference_presets};

/// Summary of a scenario for listing.
#[derive(Debug, Clone)]
pub struct ScenarioSummary {
    pub id: String,
    pub name: String,
    pub geometry: &'static str,
    pub initial_height_m: f64,
    pub span_s: f64,
    pub strategy: &'static str,
}

/// Load scenarios from a YAML file.
pub fn load_scenarios(path: &Path) -> AppResult<ScenarioFile> {
    let content = std::fs::read_to_string(path).map_err(|e| AppError::ScenarioFileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let file: ScenarioFile = serde_yaml::from_str(&content)
        .map_err(|e| AppError::Scenario(format!("Failed to parse scenario YAML: {}", e)))?;

    tracing::debug!(path = %path.display(), scenarios = file.scenarios.len(), "loaded scenario file");
    Ok(file)
}

/// Load from `path` when given, otherwise fall back to the built-in presets.
pub fn load_or_presets(path: Option<&Path>) -> AppResult<ScenarioFile> {
    match path {
        Some(path) => load_scenarios(path),
        None => Ok(reference_presets()),
    }
}

/// Save scenarios to a YAML file.
pub fn save_scenarios(path: &Path, file: &ScenarioFile) -> AppResult<()> {
    let content = serde_yaml::to_string(file)
        .map_err(|e| AppError::Scenario(format!("Failed to serialize scenarios: {}", e)))?;

    std::fs::write(path, content).map_err(|e| AppError::ScenarioFileWrite {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

fn invalid(def: &ScenarioDef, message: impl std::fmt::Display) -> AppError {
    AppError::Validation(format!("Scenario '{}': {}", def.id, message))
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Validate one scenario without running it.
pub fn validate_scenario(def: &ScenarioDef) -> AppResult<()> {
    if def.id.trim().is_empty() {
        return Err(AppError::Validation(
            "Scenario id must not be empty".to_string(),
        ));
    }
    if !positive(def.span_s) {
        return Err(invalid(def, "span_s must be positive"));
    }

    let geometry = def.geometry.to_geometry().map_err(|e| invalid(def, e))?;
    geometry
        .validate_fill_height(def.initial_height_m)
        .map_err(|e| invalid(def, e))?;

    let t = &def.thresholds;
    if !positive(t.accept_below_m) || !positive(t.drained_below_m) {
        return Err(invalid(def, "drain thresholds must be positive"));
    }
    if !(t.snap_below_m.is_finite() && t.snap_below_m >= 0.0) {
        return Err(invalid(def, "snap_below_m must be non-negative"));
    }
    if !(0.0..=1.0).contains(&t.snap_after_fraction) {
        return Err(invalid(def, "snap_after_fraction must lie in [0, 1]"));
    }

    let s = &def.solver;
    if !positive(s.rtol) || !positive(s.atol) || s.rtol > MAX_TOLERANCE || s.atol > MAX_TOLERANCE
    {
        return Err(invalid(
            def,
            format!("solver tolerances must lie in (0, {:e}]", MAX_TOLERANCE),
        ));
    }
    if !positive(s.output_dt_s) {
        return Err(invalid(def, "output_dt_s must be positive"));
    }
    if def.span_s / s.output_dt_s > MAX_OUTPUT_SAMPLES as f64 {
        return Err(invalid(
            def,
            format!(
                "output_dt_s {} gives more than {} samples over {} s",
                s.output_dt_s, MAX_OUTPUT_SAMPLES, def.span_s
            ),
        ));
    }

    match def.sizing {
        Some(SizingDef::ClosedForm { .. }) if geometry.kind() != GeometryKind::Cylindrical => {
            Err(invalid(def, "closed-form sizing requires a cylindrical tank"))
        }
        Some(SizingDef::Fixed { area_m2 }) if !positive(area_m2) => {
            Err(invalid(def, "fixed outlet area must be positive"))
        }
        Some(SizingDef::Search {
            initial_area_m2,
            max_iterations,
            ..
        }) if !positive(initial_area_m2) || max_iterations == 0 => Err(invalid(
            def,
            "search needs a positive initial area and at least one iteration",
        )),
        _ => Ok(()),
    }
}

/// Validate a whole file: at least one scenario, unique ids, each scenario valid.
pub fn validate_scenarios(file: &ScenarioFile) -> AppResult<()> {
    if file.scenarios.is_empty() {
        return Err(AppError::Validation(
            "Scenario file must have at least one scenario".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for def in &file.scenarios {
        if !seen.insert(def.id.as_str()) {
            return Err(AppError::Validation(format!(
                "Duplicate scenario id '{}'",
                def.id
            )));
        }
        validate_scenario(def)?;
    }

    Ok(())
}

/// List all scenarios with summaries. Invalid geometries are listed as "invalid".
pub fn list_scenarios(file: &ScenarioFile) -> Vec<ScenarioSummary> {
    file.scenarios
        .iter()
        .map(|def| {
            let geometry = def.geometry.to_geometry().ok();
            ScenarioSummary {
                id: def.id.clone(),
                name: def.name.clone(),
                geometry: geometry.map_or("invalid", |g| g.label()),
                initial_height_m: def.initial_height_m,
                span_s: def.span_s,
                strategy: geometry.map_or("-", |g| def.calibration_options(&g).strategy.label()),
            }
        })
        .collect()
}

/// Find a scenario by id.
pub fn get_scenario<'a>(file: &'a ScenarioFile, id: &str) -> AppResult<&'a ScenarioDef> {
    file.scenarios
        .iter()
        .find(|def| def.id == id)
        .ok_or_else(|| AppError::ScenarioNotFound(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::GeometryDef;

    #[test]
    fn presets_validate() {
        validate_scenarios(&reference_presets()).unwrap();
    }

    #[test]
    fn duplicate_ids_rejected() {
        let mut file = reference_presets();
        file.scenarios[1].id = "cylinder".to_string();
        let err = validate_scenarios(&file).unwrap_err();
        assert!(err.to_string().contains("Duplicate"));
    }

    #[test]
    fn overfilled_sphere_rejected() {
        let mut file = reference_presets();
        file.scenarios[2].initial_height_m = 5.5;
        let err = validate_scenarios(&file).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(err.to_string().contains("sphere"));
    }

    #[test]
    fn bad_geometry_rejected() {
        let mut file = reference_presets();
        file.scenarios[1].geometry = GeometryDef::Conical {
            radius_m: -1.0,
            height_m: 5.0,
        };
        assert!(validate_scenarios(&file).is_err());
    }

    #[test]
    fn closed_form_on_cone_rejected() {
        let mut file = reference_presets();
        file.scenarios[1].sizing = Some(SizingDef::ClosedForm {
            correction: 1.25,
            escalated_correction: 1.5,
        });
        assert!(validate_scenarios(&file).is_err());
    }

    #[test]
    fn loose_tolerance_rejected() {
        let mut file = reference_presets();
        file.scenarios[0].solver.rtol = 1e-2;
        assert!(validate_scenarios(&file).is_err());
    }

    #[test]
    fn oversized_output_grid_rejected() {
        let mut file = reference_presets();
        file.scenarios[1].solver.output_dt_s = 1e-12;
        let err = validate_scenarios(&file).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(err.to_string().contains("output_dt_s"));

        file.scenarios[1].solver.output_dt_s = 1e-4;
        validate_scenarios(&file).unwrap();
    }

    #[test]
    fn lookup_and_listing() {
        let file = reference_presets();
        assert_eq!(get_scenario(&file, "cone").unwrap().span_s, 40.0);
        assert!(matches!(
            get_scenario(&file, "torus"),
            Err(AppError::ScenarioNotFound(_))
        ));

        let summaries = list_scenarios(&file);
        let strategies: Vec<_> = summaries.iter().map(|s| s.strategy).collect();
        assert_eq!(strategies, vec!["closed-form", "search", "fixed"]);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_scenarios(Path::new("/nonexistent/scenarios.yaml")).unwrap_err();
        assert!(matches!(err, AppError::ScenarioFileRead { .. }));
    }
}
