use crate::output::print_json;
use forge_core::command::UiContext;
use forge_core::controller::Session;
use forge_core::{replay, CommandRegistry};

/// Print metadata, state and inputs after replaying the wizard to `step`.
pub fn run(name: &str, inputs: Vec<(String, String)>, step: usize) -> anyhow::Result<()> {
    let registry = CommandRegistry::with_builtin_commands();
    let inputs = super::step_inputs(inputs, step)?;
    let cwd = std::env::current_dir()?;

    let controller = registry.open(name, UiContext::new(cwd))?;
    let mut session = Session::new(controller, None);
    let controller = session.controller();

    let blocked = if controller.is_wizard() {
        replay::advance(controller, &inputs, inputs.step_index)?.blocked
    } else {
        controller.populate(&inputs);
        None
    };

    let mut doc = serde_json::json!({
        "metadata": controller.describe_metadata(),
        "state": controller.describe_state(),
        "inputs": controller.describe_inputs()["inputs"],
    });
    if let Some(messages) = blocked {
        doc["messages"] = serde_json::json!(messages);
    }
    print_json(&doc)
}
