//! graph command - Show the resolved module graph

use std::collections::HashSet;

use crate::core::graph::ModuleGraph;
use crate::core::types::ModuleId;
use crate::engine::events::ModuleSnapshot;
use crate::engine::{self, Context};
use anyhow::{Context as _, Result};
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphJson {
    host: ModuleSnapshot,
    /// Modules in traversal order.
    modules: Vec<ModuleSnapshot>,
}

/// Print the module graph of the context's host.
///
/// # Arguments
///
/// * `ctx` - Execution context
/// * `json` - Output as JSON
pub fn graph(ctx: &Context, json: bool) -> Result<()> {
    let graph = engine::resolve(ctx).context("Failed to resolve module graph")?;

    if json {
        let out = GraphJson {
            host: ModuleSnapshot::of(graph.host(), &graph),
            modules: graph
                .all_recursive_dependencies()
                .map(|m| ModuleSnapshot::of(m, &graph))
                .collect(),
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    for line in render_tree(&graph) {
        println!("{}", line);
    }
    Ok(())
}

/// Render the graph as an indented tree, depth first.
///
/// A module reached again is printed once more, marked, without its subtree.
fn render_tree(graph: &ModuleGraph) -> Vec<String> {
    let mut lines = vec![graph.host().name.to_string()];
    let mut seen = HashSet::new();
    for child in &graph.host().dependencies {
        render_node(graph, *child, 1, &mut seen, &mut lines);
    }
    lines
}

fn render_node(
    graph: &ModuleGraph,
    id: ModuleId,
    depth: usize,
    seen: &mut HashSet<ModuleId>,
    lines: &mut Vec<String>,
) {
    let node = graph.node(id);
    let mut line = format!("{}{}", "  ".repeat(depth), node.name);
    if node.is_entry {
        line.push_str(" [entry]");
    }
    if node.precompiled {
        line.push_str(" [precompiled]");
    }

    if !seen.insert(id) {
        line.push_str(" (see above)");
        lines.push(line);
        return;
    }
    lines.push(line);

    for child in &node.dependencies {
        render_node(graph, *child, depth + 1, seen, lines);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixtures::TestWorkspace;
    use serde_json::json;

    #[test]
    fn tree_marks_shared_modules() {
        let ws = TestWorkspace::new();
        ws.host(&["shell", "tools"], json!({ "name": "app" }))
            .module("shell", &["common"], json!({ "isEntry": true }))
            .module("tools", &["common"], json!({ "precompiled": true }))
            .module("common", &[], json!({}));

        let lines = render_tree(&ws.resolve());
        assert_eq!(
            lines,
            vec![
                "app",
                "  shell [entry]",
                "    common",
                "  tools [precompiled]",
                "    common (see above)",
            ]
        );
    }
}
