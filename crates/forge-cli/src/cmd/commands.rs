use crate::output::{print_json, print_table};
use forge_core::CommandRegistry;

pub fn run(json: bool) -> anyhow::Result<()> {
    let registry = CommandRegistry::with_builtin_commands();

    if json {
        let commands: Vec<serde_json::Value> = registry
            .metadata()
            .into_iter()
            .map(|meta| {
                let wizard = registry.is_wizard(&meta.name);
                serde_json::json!({
                    "name": meta.name,
                    "title": meta.title,
                    "category": meta.category,
                    "wizard": wizard,
                })
            })
            .collect();
        return print_json(&serde_json::json!({ "commands": commands }));
    }

    let rows = registry
        .metadata()
        .into_iter()
        .map(|meta| {
            let kind = if registry.is_wizard(&meta.name) {
                "wizard"
            } else {
                "single"
            };
            vec![meta.name, kind.to_string(), meta.title]
        })
        .collect();
    print_table(&["NAME", "KIND", "TITLE"], rows);
    Ok(())
}
