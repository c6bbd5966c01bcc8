//! Installable commands and the field/step model they declare.

use regex::Regex;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::input::InputValue;
use crate::outcome::{Outcome, ValidationMessage};

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandMetadata {
    pub name: String,
    pub title: String,
    pub description: String,
    pub category: String,
}

// ---------------------------------------------------------------------------
// FieldSpec / StepSpec
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub label: String,
    pub required: bool,
    pub many: bool,
    pub default: Option<String>,
    pub choices: Vec<String>,
    pub pattern: Option<Regex>,
    pub pattern_hint: Option<String>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            required: false,
            many: false,
            default: None,
            choices: Vec::new(),
            pattern: None,
            pattern_hint: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn many(mut self) -> Self {
        self.many = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    /// Constrain values to `pattern`; `hint` is shown when a value does not match.
    pub fn pattern(mut self, pattern: Regex, hint: impl Into<String>) -> Self {
        self.pattern = Some(pattern);
        self.pattern_hint = Some(hint.into());
        self
    }

    /// Validate one field value, or its absence.
    pub fn check(&self, value: Option<&InputValue>) -> Option<ValidationMessage> {
        let value = value.filter(|v| !v.is_blank());
        let Some(value) = value else {
            return self
                .required
                .then(|| ValidationMessage::error(&self.name, format!("{} must be specified.", self.label)));
        };
        for v in value.values() {
            if !self.choices.is_empty() && !self.choices.contains(&v) {
                return Some(ValidationMessage::error(
                    &self.name,
                    format!(
                        "{} must be one of '{}', got '{v}'.",
                        self.label,
                        self.choices.join("', '")
                    ),
                ));
            }
            if let Some(re) = &self.pattern {
                if !re.is_match(&v) {
                    let hint = self.pattern_hint.as_deref().unwrap_or("invalid format");
                    return Some(ValidationMessage::error(
                        &self.name,
                        format!("{}: {hint}.", self.label),
                    ));
                }
            }
        }
        None
    }
}

#[derive(Debug, Clone)]
pub struct StepSpec {
    pub title: String,
    pub description: String,
    pub fields: Vec<FieldSpec>,
}

impl StepSpec {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn field_spec(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

// ---------------------------------------------------------------------------
// UiContext / ExecutionContext
// ---------------------------------------------------------------------------

/// Request-scoped context a controller is bound to: the initial selection
/// (working directory) plus request headers as attributes.
#[derive(Debug, Clone, Default)]
pub struct UiContext {
    pub selection: PathBuf,
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl UiContext {
    pub fn new(selection: impl Into<PathBuf>) -> Self {
        Self {
            selection: selection.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes
            .entry(key.into().to_ascii_lowercase())
            .or_default()
            .push(value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&[String]> {
        self.attributes
            .get(&key.to_ascii_lowercase())
            .map(Vec::as_slice)
    }
}

/// What a command sees when it executes.
pub struct ExecutionContext<'a> {
    pub ui: &'a UiContext,
    /// Field values of every step, keyed by field name.
    pub values: &'a BTreeMap<String, InputValue>,
    selection: RefCell<Option<PathBuf>>,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(ui: &'a UiContext, values: &'a BTreeMap<String, InputValue>) -> Self {
        Self {
            ui,
            values,
            selection: RefCell::new(None),
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.ui.selection
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(InputValue::first)
    }

    pub fn values_of(&self, name: &str) -> Vec<String> {
        self.values
            .get(name)
            .map(InputValue::values)
            .unwrap_or_default()
    }

    /// Record the path the command produced; archiving picks it up.
    pub fn select(&self, path: impl Into<PathBuf>) {
        *self.selection.borrow_mut() = Some(path.into());
    }

    /// The path selected during execution, or the working directory.
    pub fn into_selection(self) -> PathBuf {
        self.selection
            .into_inner()
            .unwrap_or_else(|| self.ui.selection.clone())
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// A named, multi-step operation the service can run.
pub trait Command: Send + Sync {
    fn metadata(&self) -> CommandMetadata;

    /// Ordered steps; more than one makes the command a wizard.
    fn steps(&self) -> Vec<StepSpec>;

    /// Cross-field checks for one step, run after per-field checks pass.
    fn validate_step(
        &self,
        _step: usize,
        _values: &BTreeMap<String, InputValue>,
        _ctx: &UiContext,
    ) -> Vec<ValidationMessage> {
        Vec::new()
    }

    fn execute(&self, ctx: &ExecutionContext<'_>) -> Result<Outcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_field_reports_missing_value() {
        let field = FieldSpec::new("named", "Project name").required();
        let msg = field.check(None).unwrap();
        assert_eq!(msg.input.as_deref(), Some("named"));
        assert_eq!(msg.description, "Project name must be specified.");
        assert!(field
            .check(Some(&InputValue::One("   ".into())))
            .is_some());
    }

    #[test]
    fn optional_field_accepts_absence() {
        let field = FieldSpec::new("description", "Description");
        assert!(field.check(None).is_none());
    }

    #[test]
    fn choices_are_enforced() {
        let field = FieldSpec::new("type", "Type").choices(["rest", "crud"]);
        assert!(field.check(Some(&InputValue::One("rest".into()))).is_none());
        let msg = field.check(Some(&InputValue::One("soap".into()))).unwrap();
        assert!(msg.description.contains("'rest', 'crud'"));
    }

    #[test]
    fn pattern_checks_every_value() {
        let field = FieldSpec::new("repos", "Repositories")
            .many()
            .pattern(Regex::new(r"^[a-z-]+$").unwrap(), "lowercase letters only");
        let ok = InputValue::Many(vec!["a".into(), "b-c".into()]);
        assert!(field.check(Some(&ok)).is_none());
        let bad = InputValue::Many(vec!["a".into(), "B".into()]);
        assert_eq!(
            field.check(Some(&bad)).unwrap().description,
            "Repositories: lowercase letters only."
        );
    }

    #[test]
    fn attributes_are_case_insensitive() {
        let ctx = UiContext::new("/tmp").with_attribute("X-Git-User", "octo");
        assert_eq!(ctx.attribute("x-git-user"), Some(&["octo".to_string()][..]));
    }

    #[test]
    fn selection_defaults_to_working_dir() {
        let ui = UiContext::new("/tmp/work");
        let values = BTreeMap::new();
        let ctx = ExecutionContext::new(&ui, &values);
        assert_eq!(ctx.into_selection(), PathBuf::from("/tmp/work"));

        let ctx = ExecutionContext::new(&ui, &values);
        ctx.select("/tmp/work/demo");
        assert_eq!(ctx.into_selection(), PathBuf::from("/tmp/work/demo"));
    }
}
