//! Step input documents.
//!
//! Every request carries a flat set of field values plus the step the client
//! wants to reach. Form posts, query strings and JSON bodies all normalize to
//! the same [`StepInputs`].

use crate::error::{ForgeError, Result};
use serde::{Deserialize, Serialize};

/// Key carrying the target step in every payload shape.
pub const STEP_INDEX_KEY: &str = "stepIndex";

/// Field whose value names the generated artifact.
pub const ARTIFACT_FIELD: &str = "named";

/// Artifact name used when the payload has no `named` field.
pub const DEFAULT_ARTIFACT_NAME: &str = "demo";

// ---------------------------------------------------------------------------
// InputValue / InputField
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    One(String),
    Many(Vec<String>),
}

impl InputValue {
    /// The value as a single string. Multi-valued inputs yield their first entry.
    pub fn first(&self) -> Option<&str> {
        match self {
            InputValue::One(v) => Some(v.as_str()),
            InputValue::Many(vs) => vs.first().map(String::as_str),
        }
    }

    pub fn values(&self) -> Vec<String> {
        match self {
            InputValue::One(v) => vec![v.clone()],
            InputValue::Many(vs) => vs.clone(),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            InputValue::One(v) => v.trim().is_empty(),
            InputValue::Many(vs) => vs.iter().all(|v| v.trim().is_empty()),
        }
    }

    fn push(&mut self, value: String) {
        match self {
            InputValue::One(v) => *self = InputValue::Many(vec![std::mem::take(v), value]),
            InputValue::Many(vs) => vs.push(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputField {
    pub name: String,
    pub value: InputValue,
}

// ---------------------------------------------------------------------------
// StepInputs
// ---------------------------------------------------------------------------

/// Immutable, step-tagged set of client inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepInputs {
    pub step_index: usize,
    pub inputs: Vec<InputField>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument {
    #[serde(default)]
    step_index: Option<serde_json::Value>,
    #[serde(default)]
    inputs: Vec<RawField>,
}

#[derive(Deserialize)]
struct RawField {
    name: String,
    #[serde(default)]
    value: Option<serde_json::Value>,
}

impl StepInputs {
    pub fn new(step_index: usize) -> Self {
        Self {
            step_index,
            inputs: Vec::new(),
        }
    }

    /// Builder-style helper, mainly for tests and the CLI.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add(name.into(), value.into());
        self
    }

    /// Build from multi-valued key/value pairs (form posts and query strings).
    ///
    /// Repeated keys collapse into one multi-valued field at the position of
    /// their first occurrence.
    pub fn from_params<I, K, V>(params: I, default_step: usize) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut raw_step: Option<String> = None;
        let mut doc = StepInputs::new(default_step);
        for (key, value) in params {
            let key = key.into();
            let value = value.into();
            if key == STEP_INDEX_KEY {
                if raw_step.is_none() {
                    raw_step = Some(value);
                }
                continue;
            }
            doc.add(key, value);
        }
        doc.step_index = parse_step(raw_step.as_deref(), default_step)?;
        Ok(doc)
    }

    /// Build from a `{"stepIndex": .., "inputs": [{"name": .., "value": ..}]}` body.
    pub fn from_json(body: &serde_json::Value, default_step: usize) -> Result<Self> {
        let raw: RawDocument = serde_json::from_value(body.clone())
            .map_err(|e| ForgeError::InvalidPayload(e.to_string()))?;

        let step_index = match raw.step_index {
            None | Some(serde_json::Value::Null) => default_step,
            Some(serde_json::Value::Number(n)) => n
                .as_u64()
                .map(|n| n as usize)
                .ok_or_else(|| ForgeError::InvalidStepIndex(n.to_string()))?,
            Some(serde_json::Value::String(s)) => parse_step(Some(&s), default_step)?,
            Some(other) => return Err(ForgeError::InvalidStepIndex(other.to_string())),
        };

        let mut doc = StepInputs::new(step_index);
        for field in raw.inputs {
            match field.value {
                None | Some(serde_json::Value::Null) => {}
                Some(serde_json::Value::Array(items)) => {
                    for item in items {
                        doc.add(field.name.clone(), scalar_to_string(item)?);
                    }
                }
                Some(other) => doc.add(field.name, scalar_to_string(other)?),
            }
        }
        Ok(doc)
    }

    pub fn get(&self, name: &str) -> Option<&InputValue> {
        self.inputs
            .iter()
            .find(|field| field.name == name)
            .map(|field| &field.value)
    }

    /// Name of the generated artifact: the first `named` input that still has
    /// characters left after [`sanitize_artifact_name`], falling back to
    /// [`DEFAULT_ARTIFACT_NAME`].
    ///
    /// The result is safe both as a zip entry root and inside a quoted
    /// `Content-Disposition` filename.
    pub fn artifact_name(&self) -> String {
        self.inputs
            .iter()
            .filter(|field| field.name == ARTIFACT_FIELD)
            .find_map(|field| match &field.value {
                InputValue::One(v) => Some(sanitize_artifact_name(v)).filter(|n| !n.is_empty()),
                _ => None,
            })
            .unwrap_or_else(|| DEFAULT_ARTIFACT_NAME.to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    fn add(&mut self, name: String, value: String) {
        match self.inputs.iter_mut().find(|field| field.name == name) {
            Some(field) => field.value.push(value),
            None => self.inputs.push(InputField {
                name,
                value: InputValue::One(value),
            }),
        }
    }
}

/// Absent or blank means "use the default"; `"0"` is an explicit step zero.
fn parse_step(raw: Option<&str>, default_step: usize) -> Result<usize> {
    match raw.map(str::trim) {
        None | Some("") => Ok(default_step),
        Some(s) => s
            .parse::<usize>()
            .map_err(|_| ForgeError::InvalidStepIndex(s.to_string())),
    }
}

fn scalar_to_string(value: serde_json::Value) -> Result<String> {
    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(ForgeError::InvalidPayload(format!(
            "input values must be strings, numbers or booleans, got {other}"
        ))),
    }
}

/// Keep ASCII alphanumerics, `-`, `_` and `.`; strip leading dots so the
/// name can never climb out of the archive root.
pub fn sanitize_artifact_name(raw: &str) -> String {
    let kept: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect();
    kept.trim_start_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_step_index_uses_default() {
        let doc = StepInputs::from_params(vec![("named", "demo")], 1).unwrap();
        assert_eq!(doc.step_index, 1);
        assert_eq!(doc.get("named"), Some(&InputValue::One("demo".into())));
    }

    #[test]
    fn empty_step_index_is_not_zero() {
        let empty = StepInputs::from_params(vec![("stepIndex", "")], 3).unwrap();
        assert_eq!(empty.step_index, 3);
        let zero = StepInputs::from_params(vec![("stepIndex", "0")], 3).unwrap();
        assert_eq!(zero.step_index, 0);
    }

    #[test]
    fn step_index_is_not_an_input() {
        let doc = StepInputs::from_params(vec![("stepIndex", "2"), ("a", "1")], 0).unwrap();
        assert_eq!(doc.step_index, 2);
        assert_eq!(doc.inputs.len(), 1);
        assert!(doc.get(STEP_INDEX_KEY).is_none());
    }

    #[test]
    fn non_numeric_step_index_is_rejected() {
        let err = StepInputs::from_params(vec![("stepIndex", "two")], 0).unwrap_err();
        assert!(matches!(err, ForgeError::InvalidStepIndex(s) if s == "two"));
    }

    #[test]
    fn repeated_keys_become_multi_valued() {
        let doc = StepInputs::from_params(
            vec![("repo", "a"), ("named", "x"), ("repo", "b")],
            0,
        )
        .unwrap();
        assert_eq!(doc.inputs[0].name, "repo");
        assert_eq!(
            doc.get("repo"),
            Some(&InputValue::Many(vec!["a".into(), "b".into()]))
        );
    }

    #[test]
    fn json_and_form_shapes_agree() {
        let form = StepInputs::from_params(
            vec![("stepIndex", "1"), ("named", "demo"), ("repo", "a"), ("repo", "b")],
            0,
        )
        .unwrap();
        let json = StepInputs::from_json(
            &json!({
                "stepIndex": 1,
                "inputs": [
                    {"name": "named", "value": "demo"},
                    {"name": "repo", "value": ["a", "b"]}
                ]
            }),
            0,
        )
        .unwrap();
        assert_eq!(form, json);
    }

    #[test]
    fn json_step_index_accepts_numeric_string() {
        let doc = StepInputs::from_json(&json!({"stepIndex": "2", "inputs": []}), 0).unwrap();
        assert_eq!(doc.step_index, 2);
    }

    #[test]
    fn json_missing_step_index_uses_default() {
        let doc = StepInputs::from_json(&json!({"inputs": []}), 1).unwrap();
        assert_eq!(doc.step_index, 1);
    }

    #[test]
    fn json_rejects_object_values() {
        let err = StepInputs::from_json(
            &json!({"inputs": [{"name": "x", "value": {"nested": true}}]}),
            0,
        )
        .unwrap_err();
        assert!(matches!(err, ForgeError::InvalidPayload(_)));
    }

    #[test]
    fn artifact_name_defaults_to_demo() {
        assert_eq!(StepInputs::new(0).artifact_name(), "demo");
        let blank = StepInputs::new(0).with("named", "  ");
        assert_eq!(blank.artifact_name(), "demo");
    }

    #[test]
    fn artifact_name_drops_path_and_quote_characters() {
        let traversal = StepInputs::new(0).with("named", "../../evil");
        assert_eq!(traversal.artifact_name(), "evil");
        let quoted = StepInputs::new(0).with("named", "a\"b");
        assert_eq!(quoted.artifact_name(), "ab");
        let nothing_left = StepInputs::new(0).with("named", "/../");
        assert_eq!(nothing_left.artifact_name(), "demo");
        assert_eq!(sanitize_artifact_name("my-app_1.0"), "my-app_1.0");
    }

    #[test]
    fn artifact_name_uses_named_field() {
        let doc = StepInputs::new(0).with("version", "1").with("named", "my-app");
        assert_eq!(doc.artifact_name(), "my-app");
    }
}
