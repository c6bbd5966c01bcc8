//! Command outcomes and their projection into response shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Result reported by a command's `execute`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        entity: Option<Value>,
        message: String,
    },
    Composite {
        results: Vec<Outcome>,
    },
    Failure {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<Value>,
    },
}

impl Outcome {
    pub fn message(message: impl Into<String>) -> Self {
        Outcome::Success {
            entity: None,
            message: message.into(),
        }
    }

    pub fn entity(entity: Value, message: impl Into<String>) -> Self {
        Outcome::Success {
            entity: Some(entity),
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Outcome::Failure {
            message: message.into(),
            detail: None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure { .. })
    }

    /// Leaf entities in depth-first order. Leaves without an entity are skipped.
    pub fn entities(&self) -> Vec<Value> {
        let mut out = Vec::new();
        self.collect_entities(&mut out);
        out
    }

    fn collect_entities(&self, out: &mut Vec<Value>) {
        match self {
            Outcome::Success {
                entity: Some(e), ..
            } => out.push(e.clone()),
            Outcome::Success { entity: None, .. } | Outcome::Failure { .. } => {}
            Outcome::Composite { results } => {
                for child in results {
                    child.collect_entities(out);
                }
            }
        }
    }

    /// Non-blank leaf messages joined with `\n`.
    pub fn flat_message(&self) -> String {
        let mut lines = Vec::new();
        self.collect_messages(&mut lines);
        lines.join("\n")
    }

    fn collect_messages<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Outcome::Success { message, .. } | Outcome::Failure { message, .. } => {
                if !message.trim().is_empty() {
                    out.push(message.as_str());
                }
            }
            Outcome::Composite { results } => {
                for child in results {
                    child.collect_messages(out);
                }
            }
        }
    }

    /// Replace every nested composite by its leaves, keeping order.
    pub fn flatten(self) -> Outcome {
        let mut leaves = Vec::new();
        self.into_leaves(&mut leaves);
        Outcome::Composite { results: leaves }
    }

    fn into_leaves(self, out: &mut Vec<Outcome>) {
        match self {
            Outcome::Composite { results } => {
                for child in results {
                    child.into_leaves(out);
                }
            }
            leaf => out.push(leaf),
        }
    }
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

/// Response shape of an executed command.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// Structured data, rendered as JSON with a success status.
    Entity(Value),
    /// Plain-text success message.
    Message(String),
    /// Failure document, rendered with a server-error status.
    Failed(Value),
}

/// Classify an outcome: failure first, then entity, then message.
///
/// A single success yields its entity verbatim; a composite yields the list of
/// its leaf entities when it has any.
pub fn project(outcome: &Outcome) -> Projection {
    match outcome {
        Outcome::Failure { message, detail } => Projection::Failed(failure_document(message, detail)),
        Outcome::Success {
            entity: Some(entity),
            ..
        } => Projection::Entity(entity.clone()),
        Outcome::Success { entity: None, message } => Projection::Message(message.clone()),
        Outcome::Composite { .. } => {
            let entities = outcome.entities();
            if entities.is_empty() {
                Projection::Message(outcome.flat_message())
            } else {
                Projection::Entity(Value::Array(entities))
            }
        }
    }
}

fn failure_document(message: &str, detail: &Option<Value>) -> Value {
    let mut doc = serde_json::json!({
        "status": "FAILED",
        "message": message,
    });
    if let Some(detail) = detail {
        doc["detail"] = detail.clone();
    }
    doc
}

// ---------------------------------------------------------------------------
// Validation documents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Error,
    Warn,
    Info,
}

/// One per-field validation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    pub severity: Severity,
    pub description: String,
}

impl ValidationMessage {
    pub fn error(input: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            input: Some(input.into()),
            severity: Severity::Error,
            description: description.into(),
        }
    }

    pub fn warning(input: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            input: Some(input.into()),
            severity: Severity::Warn,
            description: description.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// `{"messages": [...]}`, the body shared by validate, next and 412 responses.
pub fn validation_document(messages: &[ValidationMessage]) -> Value {
    serde_json::json!({ "messages": messages })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn leaf(n: i64) -> Outcome {
        Outcome::entity(json!({ "n": n }), format!("leaf {n}"))
    }

    #[test]
    fn failure_projects_to_failed_document() {
        let p = project(&Outcome::failure("boom"));
        match p {
            Projection::Failed(doc) => {
                assert_eq!(doc["status"], "FAILED");
                assert_eq!(doc["message"], "boom");
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn entity_is_returned_verbatim() {
        let p = project(&Outcome::entity(json!({"a": 1}), "done"));
        assert_eq!(p, Projection::Entity(json!({"a": 1})));
    }

    #[test]
    fn message_only_success_projects_to_text() {
        let p = project(&Outcome::message("created"));
        assert_eq!(p, Projection::Message("created".into()));
    }

    #[test]
    fn composite_messages_skip_blank_children() {
        let outcome = Outcome::Composite {
            results: vec![
                Outcome::message(""),
                Outcome::message("first"),
                Outcome::message("   "),
                Outcome::message("second"),
                Outcome::message(""),
            ],
        };
        assert_eq!(project(&outcome), Projection::Message("first\nsecond".into()));
    }

    #[test]
    fn composite_collects_entities_in_order() {
        let outcome = Outcome::Composite {
            results: vec![leaf(1), Outcome::message("no entity"), leaf(2)],
        };
        assert_eq!(
            project(&outcome),
            Projection::Entity(json!([{"n": 1}, {"n": 2}]))
        );
    }

    #[test]
    fn flattening_is_associative() {
        let nested = Outcome::Composite {
            results: vec![
                leaf(1),
                Outcome::Composite {
                    results: vec![
                        leaf(2),
                        Outcome::Composite {
                            results: vec![leaf(3)],
                        },
                    ],
                },
                leaf(4),
            ],
        };
        let pre_flattened = Outcome::Composite {
            results: vec![
                leaf(1),
                Outcome::Composite {
                    results: vec![leaf(2), leaf(3)],
                }
                .flatten(),
                leaf(4),
            ],
        };
        assert_eq!(nested.entities(), pre_flattened.entities());
        assert_eq!(nested.flat_message(), pre_flattened.flat_message());
        assert_eq!(nested.clone().flatten(), pre_flattened.flatten());
        assert_eq!(nested.entities().len(), 4);
    }

    #[test]
    fn nested_composite_failure_is_not_top_level_failure() {
        let outcome = Outcome::Composite {
            results: vec![Outcome::failure("one repo failed"), leaf(1)],
        };
        assert!(!outcome.is_failure());
        assert_eq!(project(&outcome), Projection::Entity(json!([{"n": 1}])));
    }

    #[test]
    fn validation_document_shape() {
        let doc = validation_document(&[ValidationMessage::error("named", "Named is required")]);
        assert_eq!(
            doc,
            json!({"messages": [{"input": "named", "severity": "ERROR", "description": "Named is required"}]})
        );
    }
}
