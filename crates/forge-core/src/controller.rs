//! Controllers drive one command instance through its steps.
//!
//! A controller is created fresh for every request and never shared. Wizard
//! behaviour is a capability: [`Controller::as_wizard_mut`] returns `Some` only
//! for multi-step commands.

use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::command::{Command, ExecutionContext, StepSpec, UiContext};
use crate::error::Result;
use crate::input::{InputValue, StepInputs};
use crate::outcome::{Outcome, ValidationMessage};
use crate::workdir::WorkDir;

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

pub trait Controller: Send {
    /// Prepare the current step, filling declared defaults.
    fn initialize(&mut self) -> Result<()>;

    /// Apply the inputs relevant to the current step. Unknown fields are ignored.
    fn populate(&mut self, inputs: &StepInputs);

    /// Messages for every step visited so far.
    fn validation(&self) -> Vec<ValidationMessage>;

    fn is_valid(&self) -> bool {
        self.validation().iter().all(|m| !m.is_error())
    }

    fn describe_metadata(&self) -> Value;

    fn describe_state(&self) -> Value;

    fn describe_inputs(&self) -> Value;

    fn execute(&mut self) -> Result<Outcome>;

    /// Path produced by the last execution, or the initial selection.
    fn selection(&self) -> PathBuf;

    /// Idempotent; runs on every exit path through [`Session`].
    fn release(&mut self);

    fn as_wizard_mut(&mut self) -> Option<&mut dyn Wizard>;

    fn is_wizard(&self) -> bool;
}

pub trait Wizard: Controller {
    fn can_move_to_next_step(&self) -> bool;

    /// Advance one step and initialize it.
    fn next(&mut self) -> Result<()>;
}

// ---------------------------------------------------------------------------
// StepController
// ---------------------------------------------------------------------------

/// Controller over a [`Command`]'s declared steps.
pub struct StepController {
    command: Arc<dyn Command>,
    ui: UiContext,
    steps: Vec<StepSpec>,
    current: usize,
    values: Vec<BTreeMap<String, InputValue>>,
    selection: Option<PathBuf>,
    released: bool,
}

impl StepController {
    pub fn new(command: Arc<dyn Command>, ui: UiContext) -> Self {
        let steps = command.steps();
        let values = vec![BTreeMap::new(); steps.len().max(1)];
        Self {
            command,
            ui,
            steps,
            current: 0,
            values,
            selection: None,
            released: false,
        }
    }

    pub fn current_step(&self) -> usize {
        self.current
    }

    fn step_messages(&self, index: usize) -> Vec<ValidationMessage> {
        let Some(step) = self.steps.get(index) else {
            return Vec::new();
        };
        let values = &self.values[index];
        let field_messages: Vec<ValidationMessage> = step
            .fields
            .iter()
            .filter_map(|field| field.check(values.get(&field.name)))
            .collect();
        if !field_messages.is_empty() {
            return field_messages;
        }
        self.command.validate_step(index, values, &self.ui)
    }

    fn merged_values(&self) -> BTreeMap<String, InputValue> {
        let mut merged = BTreeMap::new();
        for step_values in &self.values[..=self.current] {
            for (name, value) in step_values {
                merged.insert(name.clone(), value.clone());
            }
        }
        merged
    }

    fn name(&self) -> String {
        self.command.metadata().name
    }
}

impl Controller for StepController {
    fn initialize(&mut self) -> Result<()> {
        let Some(step) = self.steps.get(self.current) else {
            return Ok(());
        };
        let values = &mut self.values[self.current];
        for field in &step.fields {
            if let Some(default) = &field.default {
                values
                    .entry(field.name.clone())
                    .or_insert_with(|| InputValue::One(default.clone()));
            }
        }
        Ok(())
    }

    fn populate(&mut self, inputs: &StepInputs) {
        let Some(step) = self.steps.get(self.current) else {
            return;
        };
        let values = &mut self.values[self.current];
        for field in &inputs.inputs {
            if step.field_spec(&field.name).is_some() {
                values.insert(field.name.clone(), field.value.clone());
            }
        }
    }

    fn validation(&self) -> Vec<ValidationMessage> {
        (0..=self.current)
            .flat_map(|index| self.step_messages(index))
            .collect()
    }

    fn describe_metadata(&self) -> Value {
        let meta = self.command.metadata();
        json!({
            "name": meta.name,
            "title": meta.title,
            "description": meta.description,
            "category": meta.category,
            "wizard": self.is_wizard(),
            "steps": self.steps.iter().map(|s| json!({
                "title": s.title,
                "description": s.description,
            })).collect::<Vec<_>>(),
        })
    }

    fn describe_state(&self) -> Value {
        let valid = self.is_valid();
        let last = self.steps.len().saturating_sub(1);
        json!({
            "valid": valid,
            "canExecute": valid && self.current == last,
            "wizard": self.is_wizard(),
            "currentStep": self.current,
            "totalSteps": self.steps.len(),
            "canMoveToNextStep": self.is_wizard() && valid && self.current < last,
            "canMoveToPreviousStep": self.current > 0,
        })
    }

    fn describe_inputs(&self) -> Value {
        let Some(step) = self.steps.get(self.current) else {
            return json!({ "inputs": [] });
        };
        let values = &self.values[self.current];
        let inputs: Vec<Value> = step
            .fields
            .iter()
            .map(|field| {
                let value = match values.get(&field.name) {
                    Some(InputValue::One(v)) if field.many => json!([v]),
                    Some(InputValue::One(v)) => json!(v),
                    Some(InputValue::Many(vs)) if field.many => json!(vs),
                    Some(InputValue::Many(vs)) => json!(vs.first()),
                    None => Value::Null,
                };
                let value_type = if field.many { "List" } else { "String" };
                json!({
                    "name": field.name,
                    "label": field.label,
                    "required": field.required,
                    "valueType": value_type,
                    "value": value,
                    "defaultValue": field.default,
                    "valueChoices": field.choices,
                })
            })
            .collect();
        json!({ "inputs": inputs })
    }

    fn execute(&mut self) -> Result<Outcome> {
        let values = self.merged_values();
        let ctx = ExecutionContext::new(&self.ui, &values);
        debug!(command = %self.name(), "executing");
        let outcome = self.command.execute(&ctx)?;
        self.selection = Some(ctx.into_selection());
        Ok(outcome)
    }

    fn selection(&self) -> PathBuf {
        self.selection
            .clone()
            .unwrap_or_else(|| self.ui.selection.clone())
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            debug!(command = %self.name(), step = self.current, "controller released");
        }
    }

    fn as_wizard_mut(&mut self) -> Option<&mut dyn Wizard> {
        if self.is_wizard() {
            Some(self)
        } else {
            None
        }
    }

    fn is_wizard(&self) -> bool {
        self.steps.len() > 1
    }
}

impl Wizard for StepController {
    fn can_move_to_next_step(&self) -> bool {
        self.current + 1 < self.steps.len()
            && self
                .step_messages(self.current)
                .iter()
                .all(|m| !m.is_error())
    }

    fn next(&mut self) -> Result<()> {
        self.current += 1;
        self.initialize()
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A controller bound to one request.
///
/// Dropping the session releases the controller and then the working
/// directory, so both happen on every exit path.
pub struct Session {
    controller: Box<dyn Controller>,
    workdir: Option<WorkDir>,
}

impl Session {
    pub fn new(controller: Box<dyn Controller>, workdir: Option<WorkDir>) -> Self {
        Self {
            controller,
            workdir,
        }
    }

    pub fn controller(&mut self) -> &mut dyn Controller {
        self.controller.as_mut()
    }

    pub fn workdir(&self) -> Option<&WorkDir> {
        self.workdir.as_ref()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.controller.release();
        if let Some(workdir) = self.workdir.take() {
            workdir.release();
        }
    }
}
