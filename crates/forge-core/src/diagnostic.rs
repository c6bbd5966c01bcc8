//! Bounded-depth diagnostic documents for unexpected failures.
//!
//! The document mirrors an error's source chain: each level carries its type,
//! messages, a short stack trace when one was captured, and its `cause`.

use serde_json::{Map, Value};
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error;

use crate::error::ForgeError;

/// Maximum number of `cause` levels below the top-level error.
pub const DIAGNOSTIC_DEPTH: usize = 7;

/// Maximum number of stack frames recorded per level.
pub const MAX_STACK_FRAMES: usize = 32;

pub const FORGE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Render an application error with its captured backtrace, if any.
pub fn render(err: &anyhow::Error) -> Value {
    let root: &(dyn Error + 'static) = err.as_ref();
    render_error(root, Some(err.backtrace()), DIAGNOSTIC_DEPTH)
}

/// Render `err` and at most `depth` levels of its source chain.
///
/// A cause that is the same object as the error itself or as one of its
/// ancestors ends the chain.
pub fn render_error(
    err: &(dyn Error + 'static),
    backtrace: Option<&Backtrace>,
    depth: usize,
) -> Value {
    let mut ancestors = Vec::new();
    render_level(err, backtrace, depth, &mut ancestors)
}

fn render_level(
    err: &(dyn Error + 'static),
    backtrace: Option<&Backtrace>,
    depth: usize,
    ancestors: &mut Vec<*const ()>,
) -> Value {
    ancestors.push(identity(err));

    let mut doc = Map::new();
    doc.insert("type".into(), Value::String(type_name(err)));
    doc.insert("message".into(), Value::String(err.to_string()));
    doc.insert("localizedMessage".into(), Value::String(format!("{err:#}")));
    doc.insert("forgeVersion".into(), Value::String(FORGE_VERSION.into()));

    if let Some(bt) = backtrace.filter(|bt| bt.status() == BacktraceStatus::Captured) {
        let frames = parse_frames(&bt.to_string(), MAX_STACK_FRAMES);
        doc.insert("stackTrace".into(), Value::Array(frames));
    }

    if depth > 0 {
        if let Some(cause) = err.source() {
            if !ancestors.contains(&identity(cause)) {
                let rendered = render_level(cause, None, depth - 1, ancestors);
                doc.insert("cause".into(), rendered);
            }
        }
    }

    Value::Object(doc)
}

fn identity(err: &(dyn Error + 'static)) -> *const () {
    err as *const dyn Error as *const ()
}

fn type_name(err: &(dyn Error + 'static)) -> String {
    if let Some(e) = err.downcast_ref::<ForgeError>() {
        return e.kind().to_string();
    }
    if err.is::<std::io::Error>() {
        return "std::io::Error".into();
    }
    if err.is::<serde_json::Error>() {
        return "serde_json::Error".into();
    }
    if err.is::<serde_yaml::Error>() {
        return "serde_yaml::Error".into();
    }
    // Fall back to the leading identifier of the Debug representation,
    // which is the struct or variant name for derived impls.
    let debug = format!("{err:?}");
    let head: String = debug
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == ':')
        .collect();
    if head.is_empty() {
        "Error".into()
    } else {
        head
    }
}

/// Parse the `Display` form of a captured backtrace into frame objects.
///
/// Frames look like:
///
/// ```text
///    3: forge_server::routes::forge::execute
///              at ./crates/forge-server/src/routes/forge.rs:120:9
/// ```
pub fn parse_frames(text: &str, limit: usize) -> Vec<Value> {
    let mut frames: Vec<Map<String, Value>> = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(location) = trimmed.strip_prefix("at ") {
            if let Some(frame) = frames.last_mut() {
                let (file, line_no) = split_location(location);
                frame.insert("file".into(), Value::String(file));
                frame.insert("line".into(), Value::from(line_no));
            }
            continue;
        }
        let Some((index, symbol)) = trimmed.split_once(": ") else {
            continue;
        };
        if index.is_empty() || !index.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        if frames.len() == limit {
            break;
        }
        let (class, method) = match symbol.rsplit_once("::") {
            Some((class, method)) => (class.to_string(), method.to_string()),
            None => (String::new(), symbol.to_string()),
        };
        let mut frame = Map::new();
        frame.insert("line".into(), Value::from(0));
        if !class.is_empty() {
            frame.insert("class".into(), Value::String(class));
        }
        frame.insert("method".into(), Value::String(method));
        frames.push(frame);
    }
    frames.into_iter().map(Value::Object).collect()
}

/// `path:line:col` → (`path`, `line`).
fn split_location(location: &str) -> (String, u64) {
    let mut parts = location.rsplitn(3, ':');
    let col = parts.next();
    let line = parts.next();
    let file = parts.next();
    match (file, line, col) {
        (Some(file), Some(line), Some(_)) => (file.to_string(), line.parse().unwrap_or(0)),
        _ => (location.to_string(), 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Looping {
        label: String,
    }

    impl std::fmt::Display for Looping {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "looping {}", self.label)
        }
    }

    impl Error for Looping {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(self)
        }
    }

    #[derive(Debug)]
    struct Chain {
        level: usize,
        next: Option<Box<Chain>>,
    }

    impl Chain {
        fn of_length(n: usize) -> Chain {
            let mut chain = Chain {
                level: n - 1,
                next: None,
            };
            for level in (0..n - 1).rev() {
                chain = Chain {
                    level,
                    next: Some(Box::new(chain)),
                };
            }
            chain
        }
    }

    impl std::fmt::Display for Chain {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "level {}", self.level)
        }
    }

    impl Error for Chain {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            self.next.as_deref().map(|c| c as &(dyn Error + 'static))
        }
    }

    fn depth_of(doc: &Value) -> usize {
        match doc.get("cause") {
            Some(cause) => 1 + depth_of(cause),
            None => 0,
        }
    }

    #[test]
    fn self_referencing_cause_terminates() {
        let err = Looping {
            label: "x".into(),
        };
        let doc = render_error(&err, None, DIAGNOSTIC_DEPTH);
        assert_eq!(doc["message"], "looping x");
        assert_eq!(doc["type"], "Looping");
        assert!(doc.get("cause").is_none());
    }

    #[test]
    fn long_chain_is_cut_at_depth_bound() {
        let err = Chain::of_length(20);
        let doc = render_error(&err, None, DIAGNOSTIC_DEPTH);
        assert_eq!(depth_of(&doc), DIAGNOSTIC_DEPTH);
        assert_eq!(doc["cause"]["message"], "level 1");
    }

    #[test]
    fn short_chain_is_rendered_fully() {
        let err = Chain::of_length(3);
        let doc = render_error(&err, None, DIAGNOSTIC_DEPTH);
        assert_eq!(depth_of(&doc), 2);
        assert_eq!(doc["cause"]["cause"]["message"], "level 2");
    }

    #[test]
    fn anyhow_context_layers_become_causes() {
        let err = anyhow::Error::new(ForgeError::Configuration("host missing".into()))
            .context("catapult upload failed");
        let doc = render(&err);
        assert_eq!(doc["message"], "catapult upload failed");
        assert_eq!(doc["cause"]["type"], "ForgeError::Configuration");
        assert_eq!(doc["forgeVersion"], FORGE_VERSION);
    }

    #[test]
    fn parses_backtrace_frames() {
        let text = "   0: forge_core::replay::execute\n             at ./crates/forge-core/src/replay.rs:42:9\n   1: main\n   2: std::rt::lang_start\n             at /rustc/library/std/src/rt.rs:206:5\n";
        let frames = parse_frames(text, 10);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0]["class"], "forge_core::replay");
        assert_eq!(frames[0]["method"], "execute");
        assert_eq!(frames[0]["file"], "./crates/forge-core/src/replay.rs");
        assert_eq!(frames[0]["line"], 42);
        assert_eq!(frames[1]["method"], "main");
        assert!(frames[1].get("class").is_none());
    }

    #[test]
    fn frame_list_is_bounded() {
        let text: String = (0..100)
            .map(|i| format!("  {i}: crate::f{i}\n"))
            .collect();
        assert_eq!(parse_frames(&text, MAX_STACK_FRAMES).len(), MAX_STACK_FRAMES);
    }
}
