pub(crate) mod graph;

use std::time::Instant;

use argus_common::ether::signatures::SignatureCatalog;
use argus_vm::ext::exec::{EdgeKind, StateSpace};
use serde_json::{json, Value};
use tracing::debug;

use self::graph::{block_label, edge_label};

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>{{title}}</title>
  <script src="https://unpkg.com/vis-network@9.1.9/standalone/umd/vis-network.min.js"></script>
  <style>
    html, body { margin: 0; height: 100%; background: #232625; }
    #graph { width: 100%; height: 100%; }
  </style>
</head>
<body>
  <div id="graph"></div>
  <script>
    const nodes = new vis.DataSet({{nodes}});
    const edges = new vis.DataSet({{edges}});
    const options = {{options}};
    new vis.Network(document.getElementById("graph"), { nodes, edges }, options);
  </script>
</body>
</html>
"#;

// json embedded in a script tag must not close it
fn embed(value: &Value) -> String {
    value.to_string().replace("</", "<\\/")
}

fn edge_color(kind: EdgeKind) -> &'static str {
    match kind {
        EdgeKind::Conditional(true) => "#4caf50",
        EdgeKind::Conditional(false) => "#e53935",
        EdgeKind::Call => "#ffb300",
        EdgeKind::Jump | EdgeKind::Fallthrough => "#b0bec5",
    }
}

/// Render the state space as a self-contained HTML page drawn with vis-network.
/// `enable_physics` turns on the force-directed layout; otherwise blocks are laid
/// out top-down.
pub fn render_html(
    space: &StateSpace,
    catalog: Option<&SignatureCatalog>,
    enable_physics: bool,
) -> String {
    let start_time = Instant::now();

    let nodes = space
        .graph
        .node_indices()
        .map(|index| {
            let block = &space.graph[index];
            json!({
                "id": index.index(),
                "label": block_label(block, catalog),
                "title": format!("{} @ {}", block.contract, block.start),
            })
        })
        .collect::<Vec<_>>();

    let edges = space
        .graph
        .edge_indices()
        .filter_map(|edge| {
            let (from, to) = space.graph.edge_endpoints(edge)?;
            let kind = space.graph[edge];
            Some(json!({
                "from": from.index(),
                "to": to.index(),
                "label": edge_label(kind),
                "color": { "color": edge_color(kind) },
                "dashes": kind == EdgeKind::Call,
                "arrows": "to",
            }))
        })
        .collect::<Vec<_>>();

    let options = json!({
        "physics": { "enabled": enable_physics },
        "layout": if enable_physics {
            json!({ "improvedLayout": true })
        } else {
            json!({
                "hierarchical": { "enabled": true, "direction": "UD", "sortMethod": "directed" }
            })
        },
        "nodes": {
            "shape": "box",
            "color": { "background": "#2e3432", "border": "#7cb342" },
            "font": { "face": "monospace", "align": "left", "color": "#ffffff" },
        },
        "edges": { "font": { "color": "#ffffff", "strokeWidth": 0 } },
    });

    let title = space
        .contracts
        .iter()
        .map(|contract| contract.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let html = TEMPLATE
        .replace("{{title}}", &format!("argus: {}", title.replace('<', "&lt;")))
        .replace("{{nodes}}", &embed(&Value::Array(nodes)))
        .replace("{{edges}}", &embed(&Value::Array(edges)))
        .replace("{{options}}", &embed(&options));

    debug!(
        "rendered graph with {} nodes and {} edges in {:?}",
        space.graph.node_count(),
        space.graph.edge_count(),
        start_time.elapsed()
    );
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::graph::{as_dot, label_graph};
    use alloy::primitives::Address;
    use argus_common::utils::strings::decode_hex;
    use argus_vm::ext::exec::{ContractCode, StateSpaceBuilder};

    async fn dispatch_space() -> StateSpace {
        // 00 PUSH0 CALLDATALOAD PUSH1 0xe0 SHR PUSH4 0xa9059cbb EQ PUSH1 0x11 JUMPI
        // 0e PUSH0 PUSH0 REVERT
        // 11 JUMPDEST STOP
        let code = decode_hex("0x5f3560e01c63a9059cbb146011575f5ffd5b00").expect("valid hex");
        StateSpaceBuilder::new()
            .build(&[ContractCode { name: "MAIN".to_string(), address: Address::ZERO, code }])
            .await
            .expect("exploration succeeds")
    }

    #[tokio::test]
    async fn test_label_graph_names_functions() {
        let space = dispatch_space().await;
        let mut catalog = SignatureCatalog::new();
        catalog.merge_from_source(
            "function transfer(address to, uint256 amount) public returns (bool) {}",
        );

        let graph = label_graph(&space, Some(&catalog));
        assert_eq!(graph.node_count(), 3);
        assert!(graph
            .node_weights()
            .any(|label| label.starts_with("MAIN transfer(address,uint256)\n000011 JUMPDEST")));
        assert!(graph.node_weights().any(|label| label.contains("PUSH4 0xa9059cbb  ; transfer")));

        let mut edges = graph.edge_weights().cloned().collect::<Vec<_>>();
        edges.sort();
        assert_eq!(edges, vec!["false", "true"]);
    }

    #[tokio::test]
    async fn test_as_dot() {
        let space = dispatch_space().await;
        let dot = as_dot(&space, None, true);
        assert!(dot.starts_with("digraph G {"));
        assert!(dot.contains("color = \"green\""));
        assert!(dot.contains("color = \"red\""));
        assert!(dot.contains("MAIN 0xa9059cbb"));
    }

    #[tokio::test]
    async fn test_render_html() {
        let space = dispatch_space().await;

        let html = render_html(&space, None, false);
        assert!(html.contains("vis-network"));
        assert!(html.contains("\"hierarchical\""));
        assert!(html.contains("\"enabled\":false"));
        assert!(html.contains("<title>argus: MAIN</title>"));
        assert!(!html.contains("{{"));

        let html = render_html(&space, None, true);
        assert!(html.contains("\"improvedLayout\":true"));
    }

    #[test]
    fn test_embed_escapes_script_close() {
        assert_eq!(embed(&json!("</script>")), "\"<\\/script>\"");
    }
}
