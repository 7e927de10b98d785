//! YAML scenario files.

use crate::projection::{run_projection, EngineConfig, EngineError, Projection};
use herd_core::SimParams;
use herd_econ::ViewConfig;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::info;

/// A scenario on disk: run parameters plus optional engine overrides.
///
/// Every field is optional; missing ones take the engine defaults.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScenarioFile {
    /// Run parameters; validated when the scenario runs.
    pub params: SimParams,
    /// Preset view name; replaces `engine.view` when set.
    pub view: Option<String>,
    /// Pricing, cycle and view overrides.
    pub engine: EngineConfig,
}

impl ScenarioFile {
    pub fn from_yaml_str(text: &str) -> Result<Self, EngineError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let scenario = Self::from_yaml_str(&text)?;
        info!(path = %path.display(), units = scenario.params.units_count, "loaded scenario");
        Ok(scenario)
    }

    /// Engine configuration with the preset view applied.
    pub fn engine_config(&self) -> Result<EngineConfig, EngineError> {
        let mut config = self.engine.clone();
        if let Some(name) = &self.view {
            config.view = match ViewConfig::named(name) {
                Some(preset) => preset,
                None => return Err(EngineError::UnknownView(name.clone())),
            };
        }
        Ok(config)
    }

    pub fn run(&self) -> Result<Projection, EngineError> {
        run_projection(&self.params, &self.engine_config()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herd_econ::EconError;
    use rust_decimal::Decimal;
    use std::path::PathBuf;

    fn asset(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../../assets/scenarios")
            .join(name)
    }

    fn parse(yaml: &str) -> ScenarioFile {
        ScenarioFile::from_yaml_str(yaml).unwrap()
    }

    #[test]
    fn empty_document_uses_defaults() {
        let s = parse("{}");
        assert_eq!(s, ScenarioFile::default());
        assert_eq!(s.engine_config().unwrap(), EngineConfig::default());
    }

    #[test]
    fn partial_params_keep_remaining_defaults() {
        let s = parse("params:\n  units_count: 3\n");
        assert_eq!(s.params.units_count, 3);
        assert_eq!(s.params.start_year, 2026);
        assert_eq!(s.params.simulation_years, 10);
    }

    #[test]
    fn preset_view_overrides_engine_view() {
        let s = parse("view: herd-valuation\n");
        assert_eq!(s.engine_config().unwrap().view, ViewConfig::herd_valuation());
        let s = parse("view: nope\n");
        assert!(matches!(s.engine_config(), Err(EngineError::UnknownView(_))));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = ScenarioFile::from_yaml_str("unitz: 2\n").unwrap_err();
        assert!(matches!(err, EngineError::Scenario(_)));
    }

    #[test]
    fn bad_valuation_table_is_rejected_at_parse() {
        let yaml = r#"
engine:
  view:
    name: custom
    valuation:
      name: broken
      brackets:
        - { label: young, min_months: 0, max_months: 10, value: "1000" }
        - { label: old, min_months: 20, value: "2000" }
"#;
        let err = ScenarioFile::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, EngineError::Scenario(_)));
    }

    #[test]
    fn invalid_cycle_fails_the_run() {
        let s = parse("engine:\n  cycle:\n    rest_months: 5\n");
        let err = s.run().unwrap_err();
        assert!(matches!(err, EngineError::Config(EconError::CycleLength(13))));
    }

    #[test]
    fn bundled_default_scenario() {
        let s = ScenarioFile::load(asset("default.yaml")).unwrap();
        assert_eq!(s.params, SimParams::default());
        let p = s.run().unwrap();
        assert_eq!(p.initial_investment, Decimal::new(363_000, 0));
        assert_eq!(p.yearly.len(), 10);
        assert_eq!(p.break_even.as_ref().map(|b| b.month_index), Some(6));
    }

    #[test]
    fn bundled_custom_table_scenario() {
        let path = asset("two_units_flat_prices.yaml");
        let s = ScenarioFile::load(path).unwrap();
        assert_eq!(s.params.units_count, 2);
        let p = s.run().unwrap();
        assert_eq!(p.config.view.valuation.name(), "flat");
        assert_eq!(p.initial_investment, Decimal::new(726_000, 0));
        let flat = Decimal::new(100_000, 0);
        for v in &p.valuation_by_year {
            assert_eq!(v.total_value, flat * Decimal::from(v.animal_count));
        }
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let path = asset("does_not_exist.yaml");
        let err = ScenarioFile::load(path).unwrap_err();
        assert!(matches!(err, EngineError::Io(_)));
    }
}
