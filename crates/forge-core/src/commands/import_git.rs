//! `import-git`: resolve repository coordinates for a git organisation.

use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};

use super::slug_regex;
use crate::command::{Command, CommandMetadata, ExecutionContext, FieldSpec, StepSpec, UiContext};
use crate::error::{ForgeError, Result};
use crate::input::InputValue;
use crate::outcome::{Outcome, ValidationMessage};

pub const GIT_HOST: &str = "https://github.com";

pub struct ImportGit;

impl Command for ImportGit {
    fn metadata(&self) -> CommandMetadata {
        CommandMetadata {
            name: "import-git".into(),
            title: "Import: Git repositories".into(),
            description: "Import repositories of a git organisation".into(),
            category: "Git".into(),
        }
    }

    fn steps(&self) -> Vec<StepSpec> {
        vec![StepSpec::new("Repositories", "Organisation and repositories to import")
            .field(
                FieldSpec::new("gitOrganisation", "Git organisation")
                    .required()
                    .pattern(slug_regex(), "use lowercase letters, digits and hyphens"),
            )
            .field(
                FieldSpec::new("repositories", "Repositories")
                    .required()
                    .many()
                    .pattern(slug_regex(), "use lowercase letters, digits and hyphens"),
            )]
    }

    fn validate_step(
        &self,
        _step: usize,
        values: &BTreeMap<String, InputValue>,
        _ctx: &UiContext,
    ) -> Vec<ValidationMessage> {
        let repos = values
            .get("repositories")
            .map(InputValue::values)
            .unwrap_or_default();
        let mut seen = BTreeSet::new();
        repos
            .iter()
            .filter(|r| !seen.insert(r.as_str()))
            .map(|r| {
                ValidationMessage::warning(
                    "repositories",
                    format!("Repository '{r}' is listed more than once."),
                )
            })
            .collect()
    }

    fn execute(&self, ctx: &ExecutionContext<'_>) -> Result<Outcome> {
        let organisation = ctx
            .value("gitOrganisation")
            .ok_or_else(|| ForgeError::InvalidPayload("missing value for 'gitOrganisation'".into()))?;

        let mut seen = BTreeSet::new();
        let results = ctx
            .values_of("repositories")
            .into_iter()
            .filter(|repo| seen.insert(repo.clone()))
            .map(|repo| {
                Outcome::entity(
                    json!({
                        "organisation": organisation,
                        "repository": repo,
                        "cloneUrl": format!("{GIT_HOST}/{organisation}/{repo}.git"),
                    }),
                    format!("Imported {organisation}/{repo}"),
                )
            })
            .collect();
        Ok(Outcome::Composite { results })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::{project, Projection, Severity};
    use crate::input::StepInputs;
    use crate::registry::CommandRegistry;
    use crate::replay::{self, Execution};

    fn run(inputs: &StepInputs) -> Execution {
        let registry = CommandRegistry::with_builtin_commands();
        let mut controller = registry
            .open("import-git", UiContext::new("/tmp"))
            .unwrap();
        replay::execute(controller.as_mut(), inputs).unwrap()
    }

    #[test]
    fn each_repository_becomes_an_entity() {
        let inputs = StepInputs::new(0)
            .with("gitOrganisation", "acme")
            .with("repositories", "api")
            .with("repositories", "web");
        let Execution::Completed(outcome) = run(&inputs) else {
            panic!("expected execution");
        };
        match project(&outcome) {
            Projection::Entity(value) => {
                let repos = value.as_array().unwrap();
                assert_eq!(repos.len(), 2);
                assert_eq!(repos[0]["cloneUrl"], "https://github.com/acme/api.git");
                assert_eq!(repos[1]["repository"], "web");
            }
            other => panic!("expected entities, got {other:?}"),
        }
    }

    #[test]
    fn duplicates_warn_but_still_execute() {
        let inputs = StepInputs::new(0)
            .with("gitOrganisation", "acme")
            .with("repositories", "api")
            .with("repositories", "api");

        let registry = CommandRegistry::with_builtin_commands();
        let mut controller = registry
            .open("import-git", UiContext::new("/tmp"))
            .unwrap();
        controller.populate(&inputs);
        let messages = controller.validation();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].severity, Severity::Warn);

        let Execution::Completed(outcome) = run(&inputs) else {
            panic!("warnings must not block execution");
        };
        assert_eq!(outcome.entities().len(), 1);
    }

    #[test]
    fn missing_repositories_block_execution() {
        let inputs = StepInputs::new(0).with("gitOrganisation", "acme");
        match run(&inputs) {
            Execution::Invalid(messages) => {
                assert_eq!(messages[0].input.as_deref(), Some("repositories"));
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
    }
}
