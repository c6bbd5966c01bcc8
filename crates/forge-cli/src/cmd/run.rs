use anyhow::{anyhow, bail};
use clap::Args;
use forge_core::command::UiContext;
use forge_core::controller::Session;
use forge_core::outcome::{project, Projection};
use forge_core::replay::{self, Execution};
use forge_core::workdir::{Reaper, WorkDir};
use forge_core::{archive, CommandRegistry};
use std::path::PathBuf;
use std::time::Duration;

use crate::output::print_json;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Command name
    name: String,

    /// Field value as key=value (repeatable)
    #[arg(short = 'i', long = "input", value_parser = super::parse_input)]
    inputs: Vec<(String, String)>,

    /// Generate into this directory instead of a temporary one
    #[arg(long)]
    output: Option<PathBuf>,

    /// Write the generated project as a ZIP archive
    #[arg(long)]
    zip: Option<PathBuf>,
}

pub fn run(args: RunArgs, json: bool) -> anyhow::Result<()> {
    let registry = CommandRegistry::with_builtin_commands();
    registry.ensure(&args.name)?;
    let inputs = super::step_inputs(args.inputs, 0)?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let reaper = Reaper::spawn();

        let result = (|| -> anyhow::Result<()> {
            let (selection, workdir) = match &args.output {
                Some(dir) => {
                    std::fs::create_dir_all(dir)?;
                    (dir.clone(), None)
                }
                None => {
                    let workdir = WorkDir::acquire(&reaper)?;
                    (workdir.path().to_path_buf(), Some(workdir))
                }
            };

            let controller = registry.open(&args.name, UiContext::new(selection))?;
            let mut session = Session::new(controller, workdir);

            let outcome = match replay::execute(session.controller(), &inputs)? {
                Execution::Invalid(messages) => {
                    let lines: Vec<String> = messages
                        .iter()
                        .map(|m| format!("  {:?} {}", m.severity, m.description))
                        .collect();
                    bail!("inputs are not valid:\n{}", lines.join("\n"));
                }
                Execution::Completed(outcome) => outcome,
            };

            match project(&outcome) {
                Projection::Failed(doc) => {
                    return Err(anyhow!(
                        "{}",
                        doc["message"].as_str().unwrap_or("command failed")
                    ));
                }
                Projection::Entity(entity) => print_json(&entity)?,
                Projection::Message(message) if json => {
                    print_json(&serde_json::json!({ "message": message }))?
                }
                Projection::Message(message) => println!("{message}"),
            }

            if let Some(path) = &args.zip {
                let selection = session.controller().selection();
                let bytes = archive::zip_directory(&inputs.artifact_name(), &selection)?;
                std::fs::write(path, bytes)?;
                eprintln!("wrote {}", path.display());
            }
            Ok(())
        })();

        // Let the reaper finish before the runtime shuts down.
        for _ in 0..100 {
            if reaper.deleted() >= reaper.enqueued() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        result
    })
}
