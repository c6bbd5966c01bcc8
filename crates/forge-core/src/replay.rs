//! Stateless wizard replay.
//!
//! Every request rebuilds wizard state from a freshly initialized controller
//! and one flat [`StepInputs`] document. Replay never skips an invalid step:
//! the first time a wizard cannot advance, replay stops and reports the
//! current validation messages.

use std::fmt;
use tracing::debug;

use crate::controller::Controller;
use crate::error::{ForgeError, Result};
use crate::input::StepInputs;
use crate::outcome::{Outcome, ValidationMessage};

/// Where a replay ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initial,
    Populated,
    Advanced(usize),
    Gated(usize),
    Ready,
    Executed,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Initial => write!(f, "initial"),
            Phase::Populated => write!(f, "populated"),
            Phase::Advanced(n) => write!(f, "advanced({n})"),
            Phase::Gated(n) => write!(f, "gated({n})"),
            Phase::Ready => write!(f, "ready"),
            Phase::Executed => write!(f, "executed"),
            Phase::Failed => write!(f, "failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// advance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Advance {
    /// Number of `next` calls performed.
    pub advanced: usize,
    /// Validation messages of the step that blocked advancement, if any.
    pub blocked: Option<Vec<ValidationMessage>>,
}

impl Advance {
    pub fn phase(&self) -> Phase {
        match self.blocked {
            Some(_) => Phase::Gated(self.advanced),
            None => Phase::Advanced(self.advanced),
        }
    }
}

/// Move a wizard forward up to `target` steps.
///
/// Each iteration populates the current step and advances only when the
/// wizard allows it. When `target` steps were taken (including zero), the
/// step reached is populated as well.
pub fn advance(controller: &mut dyn Controller, inputs: &StepInputs, target: usize) -> Result<Advance> {
    let name = command_name(controller);
    let Some(wizard) = controller.as_wizard_mut() else {
        return Err(ForgeError::NotAWizard(name));
    };

    let mut advanced = 0;
    while advanced < target {
        wizard.populate(inputs);
        if !wizard.can_move_to_next_step() {
            let blocked = Advance {
                advanced,
                blocked: Some(wizard.validation()),
            };
            debug!(command = %name, phase = %blocked.phase(), "replay stopped");
            return Ok(blocked);
        }
        wizard.next()?;
        advanced += 1;
    }
    wizard.populate(inputs);

    let done = Advance {
        advanced,
        blocked: None,
    };
    debug!(command = %name, phase = %done.phase(), "replay finished");
    Ok(done)
}

// ---------------------------------------------------------------------------
// populate_all_steps
// ---------------------------------------------------------------------------

/// Populate every reachable step from the same flat inputs, so defaults the
/// client never sent for later steps are still filled. Returns the number of
/// steps advanced.
pub fn populate_all_steps(controller: &mut dyn Controller, inputs: &StepInputs) -> Result<usize> {
    controller.populate(inputs);
    let mut advanced = 0;
    if let Some(wizard) = controller.as_wizard_mut() {
        while wizard.can_move_to_next_step() {
            wizard.next()?;
            wizard.populate(inputs);
            advanced += 1;
        }
    }
    Ok(advanced)
}

// ---------------------------------------------------------------------------
// execute
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Execution {
    /// The command was not executed; the inputs need fixing.
    Invalid(Vec<ValidationMessage>),
    Completed(Outcome),
}

/// Populate all steps and execute the command if the result is valid.
pub fn execute(controller: &mut dyn Controller, inputs: &StepInputs) -> Result<Execution> {
    let name = command_name(controller);
    let advanced = populate_all_steps(controller, inputs)?;
    debug!(command = %name, phase = %Phase::Populated, advanced, "inputs applied");

    if !controller.is_valid() {
        let mut messages = controller.validation();
        messages.sort_by_key(|m| !m.is_error());
        debug!(command = %name, phase = %Phase::Gated(advanced), messages = messages.len(), "not executing");
        return Ok(Execution::Invalid(messages));
    }

    debug!(command = %name, phase = %Phase::Ready, "executing");
    let outcome = controller.execute()?;
    let phase = if outcome.is_failure() {
        Phase::Failed
    } else {
        Phase::Executed
    };
    debug!(command = %name, phase = %phase, "command finished");
    Ok(Execution::Completed(outcome))
}

fn command_name(controller: &dyn Controller) -> String {
    controller.describe_metadata()["name"]
        .as_str()
        .unwrap_or_default()
        .to_string()
}
