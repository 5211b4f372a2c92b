//! Fluent flowchart construction.
//!
//! Every fallible call either applies its change completely or returns an
//! error with the diagram untouched.

use std::fs;
use std::io;
use std::path::Path;

use crate::diagram::syntax::{node_declaration, sanitize_id};
use crate::diagram::{
    ArrowType, ClickAction, Diagram, DiagramConnection, DiagramNode, Direction, NodeShape,
    NodeStyle, Subgraph,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("duplicate id '{0}'")]
    DuplicateId(String),
    #[error("unknown node '{0}'")]
    UnknownNode(String),
    #[error("unknown subgraph '{0}'")]
    UnknownSubgraph(String),
}

/// Accumulates a [`Diagram`] and serialises it to Mermaid flowchart text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowchartBuilder {
    diagram: Diagram,
}

impl FlowchartBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(title: impl Into<String>) -> Self {
        let mut builder = Self::new();
        builder.set_title(title);
        builder
    }

    /// Continue building on top of an existing (e.g. parsed) diagram.
    pub const fn from_diagram(diagram: Diagram) -> Self {
        Self { diagram }
    }

    pub const fn diagram(&self) -> &Diagram {
        &self.diagram
    }

    pub fn into_diagram(self) -> Diagram {
        self.diagram
    }

    pub fn set_title(&mut self, title: impl Into<String>) -> &mut Self {
        let title = title.into();
        self.diagram
            .set_title((!title.trim().is_empty()).then_some(title));
        self
    }

    pub fn set_direction(&mut self, direction: Direction) -> &mut Self {
        self.diagram.set_direction(direction);
        self
    }

    fn known_node(&self, id: &str) -> Result<String, BuildError> {
        let id = sanitize_id(id);
        if self.diagram.contains_node(&id) {
            Ok(id)
        } else {
            Err(BuildError::UnknownNode(id))
        }
    }

    /// A node or subgraph id, either of which may end a connection.
    fn known_endpoint(&self, id: &str) -> Result<String, BuildError> {
        let id = sanitize_id(id);
        if self.diagram.contains_node(&id) || self.diagram.has_subgraph(&id) {
            Ok(id)
        } else {
            Err(BuildError::UnknownNode(id))
        }
    }

    /// Register a node. The id is sanitised before the uniqueness check.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::DuplicateId`] if a node or subgraph already uses
    /// the id.
    pub fn add_node(
        &mut self,
        id: &str,
        label: &str,
        shape: NodeShape,
    ) -> Result<&mut Self, BuildError> {
        let id = sanitize_id(id);
        if self.diagram.contains_node(&id) || self.diagram.has_subgraph(&id) {
            return Err(BuildError::DuplicateId(id));
        }
        self.diagram.insert_node(DiagramNode::new(id, label, shape));
        Ok(self)
    }

    pub fn add_process_node(&mut self, id: &str, label: &str) -> Result<&mut Self, BuildError> {
        self.add_node(id, label, NodeShape::Rect)
    }

    pub fn add_decision_node(&mut self, id: &str, label: &str) -> Result<&mut Self, BuildError> {
        self.add_node(id, label, NodeShape::Rhombus)
    }

    pub fn add_start_end_node(&mut self, id: &str, label: &str) -> Result<&mut Self, BuildError> {
        self.add_node(id, label, NodeShape::Stadium)
    }

    /// Connect two registered nodes with a plain arrow.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::UnknownNode`] naming the first missing endpoint.
    /// Subgraph ids are valid endpoints.
    pub fn connect(&mut self, from: &str, to: &str) -> Result<&mut Self, BuildError> {
        self.connect_styled(from, to, ArrowType::Arrow, None)
    }

    pub fn connect_labeled(
        &mut self,
        from: &str,
        to: &str,
        label: &str,
    ) -> Result<&mut Self, BuildError> {
        self.connect_styled(from, to, ArrowType::Arrow, Some(label))
    }

    pub fn connect_styled(
        &mut self,
        from: &str,
        to: &str,
        arrow: ArrowType,
        label: Option<&str>,
    ) -> Result<&mut Self, BuildError> {
        let from = self.known_endpoint(from)?;
        let to = self.known_endpoint(to)?;
        self.diagram.push_connection(DiagramConnection {
            from,
            to,
            arrow,
            label: label
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(ToString::to_string),
        });
        Ok(self)
    }

    pub fn style_node(&mut self, id: &str, style: NodeStyle) -> Result<&mut Self, BuildError> {
        let id = self.known_node(id)?;
        if let Some(node) = self.diagram.node_mut(&id) {
            node.style = (!style.is_empty()).then_some(style);
        }
        Ok(self)
    }

    pub fn add_class_def(&mut self, name: &str, css: &str) -> &mut Self {
        self.diagram
            .insert_class_def(name.trim().to_string(), css.trim().to_string());
        self
    }

    pub fn apply_class(&mut self, id: &str, class: &str) -> Result<&mut Self, BuildError> {
        let id = self.known_node(id)?;
        if let Some(node) = self.diagram.node_mut(&id) {
            node.class = Some(class.trim().to_string());
        }
        Ok(self)
    }

    pub fn add_click_action(&mut self, id: &str, callback: &str) -> Result<&mut Self, BuildError> {
        self.set_click(
            id,
            ClickAction::Callback {
                name: callback.trim().to_string(),
            },
        )
    }

    pub fn add_href_link(
        &mut self,
        id: &str,
        url: &str,
        tooltip: Option<&str>,
    ) -> Result<&mut Self, BuildError> {
        self.set_click(
            id,
            ClickAction::Link {
                url: url.to_string(),
                tooltip: tooltip.map(ToString::to_string),
            },
        )
    }

    fn set_click(&mut self, id: &str, click: ClickAction) -> Result<&mut Self, BuildError> {
        let id = self.known_node(id)?;
        if let Some(node) = self.diagram.node_mut(&id) {
            node.click = Some(click);
        }
        Ok(self)
    }

    /// Group existing nodes under a top-level subgraph.
    ///
    /// # Errors
    ///
    /// [`BuildError::DuplicateId`] if the id is taken by a node or subgraph,
    /// [`BuildError::UnknownNode`] if any member is not registered.
    pub fn add_subgraph(
        &mut self,
        id: &str,
        title: Option<&str>,
        members: &[&str],
    ) -> Result<&mut Self, BuildError> {
        let subgraph = self.new_subgraph(id, title, members)?;
        self.diagram.push_subgraph(subgraph);
        Ok(self)
    }

    /// Like [`Self::add_subgraph`], but nested inside the subgraph `parent`.
    ///
    /// # Errors
    ///
    /// As [`Self::add_subgraph`], plus [`BuildError::UnknownSubgraph`] if
    /// `parent` does not exist.
    pub fn add_nested_subgraph(
        &mut self,
        parent: &str,
        id: &str,
        title: Option<&str>,
        members: &[&str],
    ) -> Result<&mut Self, BuildError> {
        let parent = sanitize_id(parent);
        if !self.diagram.has_subgraph(&parent) {
            return Err(BuildError::UnknownSubgraph(parent));
        }
        let subgraph = self.new_subgraph(id, title, members)?;
        self.diagram
            .push_nested_subgraph(&parent, subgraph)
            .map_err(|_| BuildError::UnknownSubgraph(parent))?;
        Ok(self)
    }

    fn new_subgraph(
        &self,
        id: &str,
        title: Option<&str>,
        members: &[&str],
    ) -> Result<Subgraph, BuildError> {
        let id = sanitize_id(id);
        if self.diagram.contains_node(&id) || self.diagram.has_subgraph(&id) {
            return Err(BuildError::DuplicateId(id));
        }
        let mut subgraph = Subgraph::new(id, title.map(ToString::to_string));
        for member in members {
            let member = self.known_node(member)?;
            if !subgraph.nodes.contains(&member) {
                subgraph.nodes.push(member);
            }
        }
        Ok(subgraph)
    }

    /// Serialise the diagram. Pure: repeated calls yield identical text.
    pub fn build(&self) -> String {
        let diagram = &self.diagram;
        let mut lines = Vec::new();

        if let Some(title) = diagram.title() {
            lines.push("---".to_string());
            lines.push(format!("title: {title}"));
            lines.push("---".to_string());
        }
        lines.push(format!("flowchart {}", diagram.direction()));

        for node in diagram.nodes() {
            lines.push(format!(
                "    {}",
                node_declaration(&node.id, &node.label, node.shape)
            ));
        }

        for subgraph in diagram.subgraphs() {
            push_subgraph_block(&mut lines, subgraph, 1);
        }

        for conn in diagram.connections() {
            match &conn.label {
                Some(label) => lines.push(format!(
                    "    {} {} |{label}| {}",
                    conn.from, conn.arrow, conn.to
                )),
                None => lines.push(format!("    {} {} {}", conn.from, conn.arrow, conn.to)),
            }
        }

        for (name, css) in diagram.class_defs() {
            lines.push(format!("    classDef {name} {css}"));
        }
        for node in diagram.nodes() {
            if let Some(class) = &node.class {
                lines.push(format!("    class {} {class}", node.id));
            }
        }
        for node in diagram.nodes() {
            if let Some(style) = node.style.as_ref().filter(|s| !s.is_empty()) {
                lines.push(format!("    style {} {}", node.id, style.to_css()));
            }
        }
        for node in diagram.nodes() {
            match &node.click {
                Some(ClickAction::Callback { name }) => {
                    lines.push(format!("    click {} {name}", node.id));
                }
                Some(ClickAction::Link { url, tooltip }) => {
                    let tooltip = tooltip
                        .as_ref()
                        .map(|t| format!(" \"{t}\""))
                        .unwrap_or_default();
                    lines.push(format!("    click {} href \"{url}\"{tooltip}", node.id));
                }
                None => {}
            }
        }

        lines.join("\n")
    }

    /// Write [`Self::build`] output to `path`, creating parent directories.
    pub fn save_to_file(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.build())?;
        tracing::debug!(path = %path.display(), "saved flowchart");
        Ok(())
    }
}

fn push_subgraph_block(lines: &mut Vec<String>, subgraph: &Subgraph, depth: usize) {
    let indent = "    ".repeat(depth);
    match &subgraph.title {
        Some(title) => lines.push(format!("{indent}subgraph {} [{title}]", subgraph.id)),
        None => lines.push(format!("{indent}subgraph {}", subgraph.id)),
    }
    for member in &subgraph.nodes {
        lines.push(format!("{indent}    {member}"));
    }
    for child in &subgraph.subgraphs {
        push_subgraph_block(lines, child, depth + 1);
    }
    lines.push(format!("{indent}end"));
}

/// Start → steps → finish, optionally with a decision before the middle step.
///
/// # Errors
///
/// Only fails if two steps sanitise to colliding ids, which cannot happen for
/// the generated `step_N` ids.
pub fn quick_flowchart(
    title: &str,
    steps: &[impl AsRef<str>],
    decision: bool,
) -> Result<FlowchartBuilder, BuildError> {
    let mut builder = FlowchartBuilder::with_title(title);
    builder.add_start_end_node("start", "Start")?;

    let decision_at = steps.len() / 2;
    let mut previous = "start".to_string();
    for (idx, step) in steps.iter().enumerate() {
        let n = idx + 1;
        let node_id = format!("step_{n}");
        if decision && idx == decision_at {
            let decision_id = format!("decision_{n}");
            let alt_id = format!("alt_{n}");
            builder
                .add_decision_node(&decision_id, "Continue?")?
                .connect(&previous, &decision_id)?
                .add_process_node(&node_id, step.as_ref())?
                .connect_labeled(&decision_id, &node_id, "Yes")?
                .add_process_node(&alt_id, "Alternative Action")?
                .connect_labeled(&decision_id, &alt_id, "No")?;
        } else {
            builder
                .add_process_node(&node_id, step.as_ref())?
                .connect(&previous, &node_id)?;
        }
        previous = node_id;
    }

    // `end` is reserved in flowchart syntax.
    builder
        .add_start_end_node("finish", "End")?
        .connect(&previous, "finish")?;
    Ok(builder)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FlowchartBuilder {
        let mut builder = FlowchartBuilder::with_title("Login");
        builder
            .set_direction(Direction::LeftRight)
            .add_start_end_node("start", "Start")
            .unwrap()
            .add_decision_node("ok", "Valid?")
            .unwrap()
            .connect("start", "ok")
            .unwrap()
            .connect_labeled("ok", "start", "No")
            .unwrap();
        builder
    }

    #[test]
    fn test_build_layout() {
        let text = sample().build();
        assert_eq!(
            text,
            "---\ntitle: Login\n---\nflowchart LR\n    start([Start])\n    ok{Valid?}\n    start --> ok\n    ok --> |No| start"
        );
    }

    #[test]
    fn test_build_is_idempotent() {
        let builder = sample();
        assert_eq!(builder.build(), builder.build());
    }

    #[test]
    fn test_duplicate_node_is_rejected_atomically() {
        let mut builder = sample();
        let before = builder.clone();
        let err = builder.add_node("ok", "Again", NodeShape::Rect).unwrap_err();
        assert_eq!(err, BuildError::DuplicateId("ok".to_string()));
        assert_eq!(builder, before);
    }

    #[test]
    fn test_duplicate_check_uses_sanitized_id() {
        let mut builder = FlowchartBuilder::new();
        builder.add_process_node("a-b", "One").unwrap();
        assert_eq!(
            builder.add_process_node("a b", "Two").unwrap_err(),
            BuildError::DuplicateId("a_b".to_string())
        );
    }

    #[test]
    fn test_connect_unknown_node() {
        let mut builder = sample();
        let before = builder.clone();
        assert_eq!(
            builder.connect("start", "ghost").unwrap_err(),
            BuildError::UnknownNode("ghost".to_string())
        );
        assert_eq!(
            builder.connect("ghost", "start").unwrap_err(),
            BuildError::UnknownNode("ghost".to_string())
        );
        assert_eq!(builder, before);
    }

    #[test]
    fn test_set_direction_last_call_wins() {
        let mut builder = FlowchartBuilder::new();
        builder
            .set_direction(Direction::LeftRight)
            .set_direction(Direction::BottomTop);
        assert_eq!(builder.diagram().direction(), Direction::BottomTop);
    }

    #[test]
    fn test_styles_classes_and_clicks_are_emitted() {
        let mut builder = FlowchartBuilder::new();
        builder
            .add_process_node("A", "Work")
            .unwrap()
            .style_node("A", NodeStyle::default().fill("#f9f"))
            .unwrap()
            .add_class_def("hot", "fill:#f00")
            .apply_class("A", "hot")
            .unwrap()
            .add_href_link("A", "https://example.com", Some("Docs"))
            .unwrap();
        let text = builder.build();
        assert!(text.contains("    classDef hot fill:#f00"));
        assert!(text.contains("    class A hot"));
        assert!(text.contains("    style A fill:#f9f"));
        assert!(text.contains("    click A href \"https://example.com\" \"Docs\""));
    }

    #[test]
    fn test_subgraph_rules() {
        let mut builder = sample();
        builder
            .add_subgraph("auth", Some("Auth"), &["start", "ok"])
            .unwrap();
        assert_eq!(
            builder.add_subgraph("auth", None, &[]).unwrap_err(),
            BuildError::DuplicateId("auth".to_string())
        );
        assert_eq!(
            builder.add_subgraph("other", None, &["nope"]).unwrap_err(),
            BuildError::UnknownNode("nope".to_string())
        );
        assert_eq!(builder.diagram().subgraphs().len(), 1);
        assert!(builder.build().contains("    subgraph auth [Auth]\n        start\n        ok\n    end"));
    }

    #[test]
    fn test_nested_subgraphs_render_as_nested_blocks() {
        let mut builder = sample();
        builder
            .add_subgraph("outer", None, &["start"])
            .unwrap()
            .add_nested_subgraph("outer", "inner", Some("Check"), &["ok"])
            .unwrap();
        assert_eq!(
            builder.add_nested_subgraph("missing", "x", None, &[]).unwrap_err(),
            BuildError::UnknownSubgraph("missing".to_string())
        );
        assert_eq!(
            builder.add_nested_subgraph("outer", "inner", None, &[]).unwrap_err(),
            BuildError::DuplicateId("inner".to_string())
        );

        let diagram = builder.diagram();
        assert_eq!(diagram.subgraphs().len(), 1);
        assert_eq!(diagram.subgraph_count(), 2);
        assert_eq!(diagram.subgraphs()[0].subgraphs[0].id, "inner");
        assert!(builder.build().contains(
            "    subgraph outer\n        start\n        subgraph inner [Check]\n            ok\n        end\n    end"
        ));
    }

    #[test]
    fn test_connect_accepts_subgraph_endpoints() {
        let mut builder = sample();
        builder
            .add_subgraph("auth", None, &["ok"])
            .unwrap()
            .connect("start", "auth")
            .unwrap();
        let last = builder.diagram().connections().last().unwrap();
        assert_eq!((last.from.as_str(), last.to.as_str()), ("start", "auth"));
        assert!(builder.build().ends_with("    start --> auth"));
    }

    #[test]
    fn test_quick_flowchart_with_decision() {
        let builder = quick_flowchart("Q", &["a", "b", "c"], true).unwrap();
        let diagram = builder.diagram();
        assert!(diagram.contains_node("decision_2"));
        assert!(diagram.contains_node("alt_2"));
        assert_eq!(diagram.node("decision_2").unwrap().shape, NodeShape::Rhombus);
        let labels: Vec<_> = diagram
            .connections()
            .iter()
            .filter_map(|c| c.label.as_deref())
            .collect();
        assert_eq!(labels, ["Yes", "No"]);
        let last = diagram.connections().last().unwrap();
        assert_eq!((last.from.as_str(), last.to.as_str()), ("step_3", "finish"));
    }

    #[test]
    fn test_quick_flowchart_without_steps() {
        let builder = quick_flowchart("Empty", &[] as &[&str], false).unwrap();
        assert_eq!(builder.diagram().node_count(), 2);
        assert_eq!(builder.diagram().connections().len(), 1);
    }

    #[test]
    fn test_save_to_file_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("flow.mmd");
        let builder = sample();
        builder.save_to_file(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), builder.build());
    }
}
