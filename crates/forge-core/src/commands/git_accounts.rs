//! `check-git-accounts`: report the git identity attached to the request.

use serde_json::json;

use crate::command::{Command, CommandMetadata, ExecutionContext, StepSpec};
use crate::error::Result;
use crate::outcome::Outcome;

/// Request attribute carrying the caller's git user.
pub const GIT_USER_ATTRIBUTE: &str = "x-git-user";

pub struct CheckGitAccounts;

impl Command for CheckGitAccounts {
    fn metadata(&self) -> CommandMetadata {
        CommandMetadata {
            name: "check-git-accounts".into(),
            title: "Git: Check accounts".into(),
            description: "Report the git accounts available to this request".into(),
            category: "Git".into(),
        }
    }

    fn steps(&self) -> Vec<StepSpec> {
        vec![StepSpec::new("Accounts", "No input required")]
    }

    fn execute(&self, ctx: &ExecutionContext<'_>) -> Result<Outcome> {
        let accounts = ctx.ui.attribute(GIT_USER_ATTRIBUTE).unwrap_or_default();
        Ok(Outcome::entity(
            json!({
                "configured": !accounts.is_empty(),
                "accounts": accounts,
            }),
            format!("{} git account(s) found", accounts.len()),
        ))
    }
}
