pub mod engine;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{ScorableError, ScorableResult};
use crate::resources::{InputVariable, ReferenceVariable};

pub use engine::run;

/// Test data shared by every definition in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DatasetSpec {
    #[serde(rename = "test_dataset_id")]
    Reference(String),
    #[serde(rename = "test_data")]
    Rows(Vec<Vec<String>>),
}

impl DatasetSpec {
    /// Exactly one of the two sources must be non-empty.
    pub fn from_parts(
        dataset_id: Option<String>,
        rows: Option<Vec<Vec<String>>>,
    ) -> ScorableResult<Self> {
        let dataset_id = dataset_id.filter(|id| !id.trim().is_empty());
        let rows = rows.filter(|r| !r.is_empty());
        match (dataset_id, rows) {
            (Some(id), None) => Ok(Self::Reference(id)),
            (None, Some(rows)) => Ok(Self::Rows(rows)),
            (Some(_), Some(_)) => Err(ScorableError::config(
                "only one of test_dataset_id or test_data must be provided",
            )),
            (None, None) => Err(ScorableError::config(
                "either test_dataset_id or test_data must be provided",
            )),
        }
    }

    /// Inline rows from a JSON file holding a list of string lists.
    pub fn rows_from_file(path: &Path) -> ScorableResult<Vec<Vec<String>>> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationDefinition {
    pub name: String,
    pub prompt: String,
    pub model: String,
    #[serde(default)]
    pub pii_filter: bool,
    #[serde(default)]
    pub reference_variables: Vec<ReferenceVariable>,
    #[serde(default)]
    pub input_variables: Vec<InputVariable>,
}

impl CalibrationDefinition {
    pub fn new(
        name: impl Into<String>,
        prompt: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            prompt: prompt.into(),
            model: model.into(),
            pii_filter: false,
            reference_variables: Vec::new(),
            input_variables: Vec::new(),
        }
    }
}

/// Load a YAML list of definitions.
pub fn load_definitions(path: &Path) -> ScorableResult<Vec<CalibrationDefinition>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        ScorableError::config(format!("cannot read '{}': {}", path.display(), e))
    })?;
    let definitions: Vec<CalibrationDefinition> = serde_yaml::from_str(&content)?;
    if definitions.is_empty() {
        return Err(ScorableError::config(format!(
            "'{}' contains no evaluator definitions",
            path.display()
        )));
    }
    Ok(definitions)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationScore {
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub expected_score: Option<f64>,
    #[serde(default)]
    pub justification: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One scored test row as returned by a calibration call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationOutput {
    #[serde(default)]
    pub result: CalibrationScore,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CalibrationOutput {
    /// Actual minus expected; a missing value counts as 0.
    pub fn error(&self) -> f64 {
        self.result.score.unwrap_or(0.0) - self.result.expected_score.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ErrorSums {
    pub sum_squared_errors: f64,
    pub abs_errors: f64,
    pub count: u64,
}

impl ErrorSums {
    fn add(&mut self, error: f64) {
        self.sum_squared_errors += error * error;
        self.abs_errors += error.abs();
        self.count += 1;
    }

    pub fn rms(&self) -> Option<f64> {
        (self.count > 0).then(|| (self.sum_squared_errors / self.count as f64).sqrt())
    }

    pub fn mae(&self) -> Option<f64> {
        (self.count > 0).then(|| self.abs_errors / self.count as f64)
    }
}

/// Running error sums keyed by model and by prompt.
#[derive(Debug, Clone, Default)]
pub struct CalibrationErrorAccumulator {
    per_model: BTreeMap<String, ErrorSums>,
    per_prompt: BTreeMap<String, ErrorSums>,
}

impl CalibrationErrorAccumulator {
    pub fn record(&mut self, definition: &CalibrationDefinition, output: &CalibrationOutput) {
        let error = output.error();
        self.per_model
            .entry(definition.model.clone())
            .or_default()
            .add(error);
        self.per_prompt
            .entry(definition.prompt.clone())
            .or_default()
            .add(error);
    }

    pub fn model(&self, model: &str) -> Option<&ErrorSums> {
        self.per_model.get(model)
    }

    pub fn prompt(&self, prompt: &str) -> Option<&ErrorSums> {
        self.per_prompt.get(prompt)
    }

    pub fn rms_by_model(&self) -> BTreeMap<String, f64> {
        derive(&self.per_model, ErrorSums::rms)
    }

    pub fn mae_by_model(&self) -> BTreeMap<String, f64> {
        derive(&self.per_model, ErrorSums::mae)
    }

    pub fn rms_by_prompt(&self) -> BTreeMap<String, f64> {
        derive(&self.per_prompt, ErrorSums::rms)
    }

    pub fn mae_by_prompt(&self) -> BTreeMap<String, f64> {
        derive(&self.per_prompt, ErrorSums::mae)
    }
}

fn derive(
    sums: &BTreeMap<String, ErrorSums>,
    stat: impl Fn(&ErrorSums) -> Option<f64>,
) -> BTreeMap<String, f64> {
    sums.iter()
        .filter_map(|(key, s)| stat(s).map(|v| (key.clone(), v)))
        .collect()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchResult {
    /// Every scored row; order across definitions is not meaningful.
    pub results: Vec<CalibrationOutput>,
    pub rms_errors_model: BTreeMap<String, f64>,
    pub mae_errors_model: BTreeMap<String, f64>,
    pub rms_errors_prompt: BTreeMap<String, f64>,
    pub mae_errors_prompt: BTreeMap<String, f64>,
}

impl BatchResult {
    pub fn new(results: Vec<CalibrationOutput>, errors: &CalibrationErrorAccumulator) -> Self {
        Self {
            results,
            rms_errors_model: errors.rms_by_model(),
            mae_errors_model: errors.mae_by_model(),
            rms_errors_prompt: errors.rms_by_prompt(),
            mae_errors_prompt: errors.mae_by_prompt(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(score: Option<f64>, expected: Option<f64>) -> CalibrationOutput {
        CalibrationOutput {
            result: CalibrationScore {
                score,
                expected_score: expected,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_dataset_spec_requires_exactly_one_source() {
        assert!(matches!(
            DatasetSpec::from_parts(Some("ds".into()), Some(vec![vec!["a".into()]])),
            Err(ScorableError::Config { .. })
        ));
        assert!(matches!(
            DatasetSpec::from_parts(None, None),
            Err(ScorableError::Config { .. })
        ));
        assert!(matches!(
            DatasetSpec::from_parts(Some(String::new()), Some(Vec::new())),
            Err(ScorableError::Config { .. })
        ));
        assert_eq!(
            DatasetSpec::from_parts(Some("ds".into()), None).unwrap(),
            DatasetSpec::Reference("ds".into())
        );
    }

    #[test]
    fn test_rms_and_mae() {
        let def = CalibrationDefinition::new("d", "P", "m");
        let mut acc = CalibrationErrorAccumulator::default();
        acc.record(&def, &output(Some(0.5), Some(0.8)));
        acc.record(&def, &output(Some(0.9), Some(0.5)));

        let mae = acc.mae_by_model()["m"];
        let rms = acc.rms_by_model()["m"];
        assert!((mae - 0.35).abs() < 1e-9);
        assert!((rms - ((0.09 + 0.16) / 2.0f64).sqrt()).abs() < 1e-9);
        assert_eq!(acc.rms_by_prompt()["P"], rms);
        assert_eq!(acc.model("m").map(|s| s.count), Some(2));
    }

    #[test]
    fn test_missing_scores_count_as_zero() {
        assert_eq!(output(None, Some(0.4)).error(), -0.4);
        assert_eq!(output(Some(0.3), None).error(), 0.3);
    }

    #[test]
    fn test_empty_keys_never_reported() {
        let mut acc = CalibrationErrorAccumulator::default();
        acc.per_model.insert("idle".into(), ErrorSums::default());
        assert!(acc.rms_by_model().is_empty());
        assert!(acc.mae_by_model().is_empty());
        assert_eq!(ErrorSums::default().rms(), None);
    }
}
