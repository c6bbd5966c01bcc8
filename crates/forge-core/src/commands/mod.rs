//! Built-in commands.

pub mod git_accounts;
pub mod import_git;
pub mod new_project;

use regex::Regex;
use std::sync::{Arc, OnceLock};

use crate::command::Command;

static SLUG_RE: OnceLock<Regex> = OnceLock::new();
static PACKAGE_RE: OnceLock<Regex> = OnceLock::new();

pub(crate) fn slug_regex() -> Regex {
    SLUG_RE
        .get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9\-]*[a-z0-9]$|^[a-z0-9]$").unwrap())
        .clone()
}

pub(crate) fn package_regex() -> Regex {
    PACKAGE_RE
        .get_or_init(|| Regex::new(r"^[a-z_][a-z0-9_]*(\.[a-z_][a-z0-9_]*)*$").unwrap())
        .clone()
}

pub fn builtin() -> Vec<Arc<dyn Command>> {
    vec![
        Arc::new(new_project::NewProject),
        Arc::new(import_git::ImportGit),
        Arc::new(git_accounts::CheckGitAccounts),
    ]
}
