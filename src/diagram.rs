//! Mermaid state diagrams.

use std::collections::BTreeSet;

use crate::spec::Specification;

/// Render `spec` as a Mermaid `stateDiagram-v2`.
///
/// One `A --> B : condition` line per declared transition, followed by any
/// declared state that no transition touches.
pub fn to_mermaid(spec: &Specification) -> String {
    let mut out = String::from("stateDiagram-v2\n");

    let mut connected = BTreeSet::new();
    for t in &spec.transitions {
        connected.insert(t.from.as_str());
        connected.insert(t.to.as_str());

        out.push_str(&format!("    {} --> {}", node_id(&t.from), node_id(&t.to)));
        let label = label_text(&t.condition);
        if !label.is_empty() {
            out.push_str(" : ");
            out.push_str(&label);
        }
        out.push('\n');
    }

    for state in &spec.states {
        if !connected.contains(state.name.as_str()) {
            out.push_str(&format!("    {}\n", node_id(&state.name)));
        }
    }

    out
}

fn node_id(name: &str) -> String {
    let id: String = name
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if id.is_empty() {
        "_".to_string()
    } else {
        id
    }
}

// Mermaid labels end at a newline and treat ';' as a statement break.
fn label_text(condition: &str) -> String {
    condition
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace(';', ",")
}
