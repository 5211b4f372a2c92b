//! Structural checks on an in-memory flowchart.

use std::collections::HashSet;

use super::{DiagramKind, ValidationResult};
use crate::diagram::Diagram;

/// Check a [`Diagram`] built through the builder or the parser.
///
/// Empty diagrams are errors; isolated nodes and a missing start or end
/// candidate are warnings.
pub fn validate_diagram(diagram: &Diagram) -> ValidationResult {
    let mut result = ValidationResult::default();
    result.set_kind(DiagramKind::Flowchart);

    if diagram.is_empty() {
        result.error(None, "flowchart must contain at least one node");
        return result;
    }

    let mut sources: HashSet<&str> = HashSet::new();
    let mut targets: HashSet<&str> = HashSet::new();
    for conn in diagram.connections() {
        for id in [&conn.from, &conn.to] {
            if !diagram.contains_node(id) && !diagram.has_subgraph(id) {
                result.error(None, format!("connection references unknown node '{id}'"));
            }
        }
        sources.insert(conn.from.as_str());
        targets.insert(conn.to.as_str());
    }

    let isolated: Vec<&str> = diagram
        .nodes()
        .map(|n| n.id.as_str())
        .filter(|id| !sources.contains(id) && !targets.contains(id))
        .collect();
    if !isolated.is_empty() {
        result.warning(
            None,
            format!("isolated nodes found: {}", isolated.join(", ")),
        );
    }

    if sources.difference(&targets).next().is_none() {
        result.warning(
            None,
            "no clear start node found (every node has an incoming connection)",
        );
    }
    if targets.difference(&sources).next().is_none() {
        result.warning(
            None,
            "no clear end node found (every node has an outgoing connection)",
        );
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::FlowchartBuilder;

    #[test]
    fn test_empty_diagram_is_an_error() {
        let result = validate_diagram(&Diagram::new());
        assert!(!result.is_valid());
        assert_eq!(result.errors().len(), 1);
    }

    #[test]
    fn test_linear_flow_has_no_warnings() {
        let mut builder = FlowchartBuilder::new();
        builder
            .add_process_node("a", "A")
            .unwrap()
            .add_process_node("b", "B")
            .unwrap()
            .connect("a", "b")
            .unwrap();
        let result = validate_diagram(builder.diagram());
        assert!(result.is_valid());
        assert!(result.warnings().is_empty(), "{:?}", result.warnings());
    }

    #[test]
    fn test_cycle_and_isolated_node_warn() {
        let mut builder = FlowchartBuilder::new();
        builder
            .add_process_node("a", "A")
            .unwrap()
            .add_process_node("b", "B")
            .unwrap()
            .add_process_node("lonely", "L")
            .unwrap()
            .connect("a", "b")
            .unwrap()
            .connect("b", "a")
            .unwrap();
        let result = validate_diagram(builder.diagram());
        assert!(result.is_valid());
        let messages: Vec<_> = result.warnings().iter().map(|w| w.message.as_str()).collect();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0], "isolated nodes found: lonely");
        assert!(messages[1].starts_with("no clear start node"));
        assert!(messages[2].starts_with("no clear end node"));
    }
}
