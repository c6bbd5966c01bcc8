//! `new-project`: two-step wizard that writes a project skeleton.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use super::{package_regex, slug_regex};
use crate::command::{Command, CommandMetadata, ExecutionContext, FieldSpec, StepSpec, UiContext};
use crate::error::{ForgeError, Result};
use crate::input::InputValue;
use crate::outcome::{Outcome, ValidationMessage};

pub const PROJECT_TYPES: &[&str] = &["rest", "crud", "health-check"];

pub struct NewProject;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectManifest<'a> {
    name: &'a str,
    top_level_package: &'a str,
    version: &'a str,
    #[serde(rename = "type")]
    project_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

impl Command for NewProject {
    fn metadata(&self) -> CommandMetadata {
        CommandMetadata {
            name: "new-project".into(),
            title: "Project: New".into(),
            description: "Generate a new project from a template".into(),
            category: "Project".into(),
        }
    }

    fn steps(&self) -> Vec<StepSpec> {
        vec![
            StepSpec::new("Project info", "Name and coordinates of the project")
                .field(
                    FieldSpec::new("named", "Project name")
                        .required()
                        .pattern(slug_regex(), "use lowercase letters, digits and hyphens"),
                )
                .field(
                    FieldSpec::new("topLevelPackage", "Top level package")
                        .required()
                        .default_value("org.example")
                        .pattern(package_regex(), "use a dotted lowercase package name"),
                )
                .field(
                    FieldSpec::new("version", "Version")
                        .required()
                        .default_value("1.0.0-SNAPSHOT"),
                ),
            StepSpec::new("Project type", "Template to generate")
                .field(
                    FieldSpec::new("type", "Project type")
                        .required()
                        .choices(PROJECT_TYPES.iter().copied()),
                )
                .field(FieldSpec::new("description", "Description")),
        ]
    }

    fn validate_step(
        &self,
        step: usize,
        values: &BTreeMap<String, InputValue>,
        ctx: &UiContext,
    ) -> Vec<ValidationMessage> {
        if step != 0 {
            return Vec::new();
        }
        let Some(named) = values.get("named").and_then(InputValue::first) else {
            return Vec::new();
        };
        if ctx.selection.join(named).exists() {
            return vec![ValidationMessage::error(
                "named",
                format!("Project '{named}' already exists in the target directory."),
            )];
        }
        Vec::new()
    }

    fn execute(&self, ctx: &ExecutionContext<'_>) -> Result<Outcome> {
        let named = required(ctx, "named")?;
        let package = required(ctx, "topLevelPackage")?;
        let version = required(ctx, "version")?;
        let project_type = required(ctx, "type")?;
        let description = ctx.value("description").filter(|d| !d.trim().is_empty());

        let project_dir = ctx.working_dir().join(named);
        let manifest = ProjectManifest {
            name: named,
            top_level_package: package,
            version,
            project_type,
            description,
        };
        write_skeleton(&project_dir, &manifest)?;
        ctx.select(&project_dir);

        Ok(Outcome::message(format!(
            "Project '{named}' ({project_type}) created"
        )))
    }
}

fn required<'a>(ctx: &'a ExecutionContext<'_>, name: &str) -> Result<&'a str> {
    ctx.value(name)
        .ok_or_else(|| ForgeError::InvalidPayload(format!("missing value for '{name}'")))
}

fn write_skeleton(project_dir: &Path, manifest: &ProjectManifest<'_>) -> Result<()> {
    let class_name = application_class(manifest.project_type);
    let package_dir = manifest
        .top_level_package
        .split('.')
        .fold(project_dir.join("src/main/java"), |dir, part| dir.join(part));
    std::fs::create_dir_all(&package_dir)?;

    std::fs::write(
        project_dir.join("project.yaml"),
        serde_yaml::to_string(manifest)?,
    )?;
    std::fs::write(project_dir.join("README.md"), readme(manifest))?;
    std::fs::write(project_dir.join("pom.xml"), pom(manifest))?;
    std::fs::write(
        package_dir.join(format!("{class_name}.java")),
        format!(
            "package {};\n\npublic class {class_name} {{\n    public static void main(String[] args) {{\n        System.out.println(\"{} {}\");\n    }}\n}}\n",
            manifest.top_level_package, manifest.name, manifest.version
        ),
    )?;
    Ok(())
}

fn application_class(project_type: &str) -> &'static str {
    match project_type {
        "crud" => "CrudApplication",
        "health-check" => "HealthCheckApplication",
        _ => "RestApplication",
    }
}

fn readme(manifest: &ProjectManifest<'_>) -> String {
    let mut out = format!("# {}\n\n", manifest.name);
    if let Some(description) = manifest.description {
        out.push_str(description);
        out.push_str("\n\n");
    }
    out.push_str(&format!(
        "Generated `{}` project, version `{}`.\n",
        manifest.project_type, manifest.version
    ));
    out
}

fn pom(manifest: &ProjectManifest<'_>) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0">
  <modelVersion>4.0.0</modelVersion>
  <groupId>{group}</groupId>
  <artifactId>{artifact}</artifactId>
  <version>{version}</version>
  <packaging>jar</packaging>
</project>
"#,
        group = manifest.top_level_package,
        artifact = manifest.name,
        version = manifest.version,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::StepInputs;
    use crate::registry::CommandRegistry;
    use crate::replay::{self, Execution};
    use tempfile::TempDir;

    fn inputs() -> StepInputs {
        StepInputs::new(0)
            .with("named", "demo")
            .with("topLevelPackage", "org.demo")
            .with("type", "crud")
    }

    #[test]
    fn execute_writes_skeleton_and_selects_project() {
        let dir = TempDir::new().unwrap();
        let registry = CommandRegistry::with_builtin_commands();
        let mut controller = registry
            .open("new-project", UiContext::new(dir.path()))
            .unwrap();

        let result = replay::execute(controller.as_mut(), &inputs()).unwrap();
        assert_eq!(
            result,
            Execution::Completed(Outcome::message("Project 'demo' (crud) created"))
        );

        let project = dir.path().join("demo");
        assert_eq!(controller.selection(), project);
        assert!(project.join("pom.xml").exists());
        assert!(project
            .join("src/main/java/org/demo/CrudApplication.java")
            .exists());
        let manifest = std::fs::read_to_string(project.join("project.yaml")).unwrap();
        assert!(manifest.contains("version: 1.0.0-SNAPSHOT"));
        assert!(manifest.contains("type: crud"));
    }

    #[test]
    fn missing_type_is_reported_not_executed() {
        let dir = TempDir::new().unwrap();
        let registry = CommandRegistry::with_builtin_commands();
        let mut controller = registry
            .open("new-project", UiContext::new(dir.path()))
            .unwrap();

        let partial = StepInputs::new(0).with("named", "demo");
        match replay::execute(controller.as_mut(), &partial).unwrap() {
            Execution::Invalid(messages) => {
                assert_eq!(messages.len(), 1);
                assert_eq!(messages[0].input.as_deref(), Some("type"));
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
        assert!(!dir.path().join("demo").exists());
    }

    #[test]
    fn existing_project_blocks_first_step() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("demo")).unwrap();
        let registry = CommandRegistry::with_builtin_commands();
        let mut controller = registry
            .open("new-project", UiContext::new(dir.path()))
            .unwrap();

        let result = replay::advance(controller.as_mut(), &inputs(), 1).unwrap();
        assert_eq!(result.advanced, 0);
        let messages = result.blocked.unwrap();
        assert!(messages[0].description.contains("already exists"));
    }
}
