use argus_common::{ether::signatures::SignatureCatalog, utils::strings::encode_hex};
use argus_disassembler::render_instruction;
use argus_vm::ext::exec::{BlockNode, EdgeKind, StateSpace};
use petgraph::{dot::Dot, graph::Graph};

/// The text shown for a block: a header naming the contract and function,
/// followed by one line per instruction.
pub(crate) fn block_label(block: &BlockNode, catalog: Option<&SignatureCatalog>) -> String {
    let mut label = match block.function {
        Some(selector) => {
            let name = catalog
                .and_then(|c| c.get_bytes(&selector))
                .map(str::to_string)
                .unwrap_or_else(|| format!("0x{}", encode_hex(&selector)));
            format!("{} {}\n", block.contract, name)
        }
        None => format!("{}\n", block.contract),
    };

    for instruction in &block.instructions {
        label.push_str(&render_instruction(instruction, catalog));
        label.push('\n');
    }
    label
}

pub(crate) fn edge_label(kind: EdgeKind) -> &'static str {
    match kind {
        EdgeKind::Conditional(true) => "true",
        EdgeKind::Conditional(false) => "false",
        EdgeKind::Call => "call",
        EdgeKind::Jump | EdgeKind::Fallthrough => "",
    }
}

/// Convert a [`StateSpace`] into a [`Graph`] of block labels, with edges labelled
/// `true`/`false` for conditional jumps and `call` for external calls.
pub(crate) fn label_graph(
    space: &StateSpace,
    catalog: Option<&SignatureCatalog>,
) -> Graph<String, String> {
    space.graph.map(
        |_, block| block_label(block, catalog),
        |_, kind| edge_label(*kind).to_string(),
    )
}

/// Render the state space in the `dot` graphviz format. With `color_edges`,
/// taken branches are green and fall-through branches red.
pub fn as_dot(space: &StateSpace, catalog: Option<&SignatureCatalog>, color_edges: bool) -> String {
    let graph = label_graph(space, catalog);
    let mut output = format!("{}", Dot::with_config(&graph, &[])).replace(
        "digraph {",
        concat!(
            "digraph G {\n",
            "    node [shape=box, style=\"rounded\", fontname=\"Helvetica\"];\n",
            "    edge [fontname=\"Helvetica\"];",
        ),
    );

    if color_edges {
        output = output.replace("[ label = \"true\" ]", "[ color = \"green\" ]");
        output = output.replace("[ label = \"false\" ]", "[ color = \"red\" ]");
    }

    output.replace("[ label = \"\" ]", "[]")
}
