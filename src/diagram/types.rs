//! Core diagram types.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Node shapes supported by Mermaid flowcharts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeShape {
    #[default]
    Rect,
    Round,
    Stadium,
    Subroutine,
    Cylinder,
    Circle,
    Asymmetric,
    Rhombus,
    Hexagon,
    Parallelogram,
    ParallelogramAlt,
    Trapezoid,
    TrapezoidAlt,
}

impl NodeShape {
    pub const ALL: [Self; 13] = [
        Self::Rect,
        Self::Round,
        Self::Stadium,
        Self::Subroutine,
        Self::Cylinder,
        Self::Circle,
        Self::Asymmetric,
        Self::Rhombus,
        Self::Hexagon,
        Self::Parallelogram,
        Self::ParallelogramAlt,
        Self::Trapezoid,
        Self::TrapezoidAlt,
    ];

    /// Opening and closing delimiters around the label.
    pub const fn delimiters(self) -> (&'static str, &'static str) {
        match self {
            Self::Rect => ("[", "]"),
            Self::Round => ("(", ")"),
            Self::Stadium => ("([", "])"),
            Self::Subroutine => ("[[", "]]"),
            Self::Cylinder => ("[(", ")]"),
            Self::Circle => ("((", "))"),
            Self::Asymmetric => (">", "]"),
            Self::Rhombus => ("{", "}"),
            Self::Hexagon => ("{{", "}}"),
            Self::Parallelogram => ("[/", "/]"),
            Self::ParallelogramAlt => ("[\\", "\\]"),
            Self::Trapezoid => ("[/", "\\]"),
            Self::TrapezoidAlt => ("[\\", "/]"),
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Rect => "rect",
            Self::Round => "round",
            Self::Stadium => "stadium",
            Self::Subroutine => "subroutine",
            Self::Cylinder => "cylinder",
            Self::Circle => "circle",
            Self::Asymmetric => "asymmetric",
            Self::Rhombus => "rhombus",
            Self::Hexagon => "hexagon",
            Self::Parallelogram => "parallelogram",
            Self::ParallelogramAlt => "parallelogram_alt",
            Self::Trapezoid => "trapezoid",
            Self::TrapezoidAlt => "trapezoid_alt",
        }
    }
}

impl fmt::Display for NodeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NodeShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase().replace('-', "_");
        match lower.as_str() {
            "rectangle" | "process" => Ok(Self::Rect),
            "round_rect" | "rounded" => Ok(Self::Round),
            "diamond" | "decision" => Ok(Self::Rhombus),
            "database" => Ok(Self::Cylinder),
            other => Self::ALL
                .into_iter()
                .find(|shape| shape.name() == other)
                .ok_or_else(|| format!("unknown node shape '{s}'")),
        }
    }
}

/// How a connection line is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Solid,
    Dotted,
    Thick,
    Invisible,
}

/// Connection arrow tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ArrowType {
    #[default]
    #[serde(rename = "-->")]
    Arrow,
    #[serde(rename = "---")]
    Open,
    #[serde(rename = "-.->")]
    DottedArrow,
    #[serde(rename = "-.-")]
    DottedOpen,
    #[serde(rename = "==>")]
    ThickArrow,
    #[serde(rename = "===")]
    ThickOpen,
    #[serde(rename = "~~~")]
    Invisible,
}

impl ArrowType {
    pub const ALL: [Self; 7] = [
        Self::Arrow,
        Self::Open,
        Self::DottedArrow,
        Self::DottedOpen,
        Self::ThickArrow,
        Self::ThickOpen,
        Self::Invisible,
    ];

    pub const fn token(self) -> &'static str {
        match self {
            Self::Arrow => "-->",
            Self::Open => "---",
            Self::DottedArrow => "-.->",
            Self::DottedOpen => "-.-",
            Self::ThickArrow => "==>",
            Self::ThickOpen => "===",
            Self::Invisible => "~~~",
        }
    }

    pub const fn line_style(self) -> LineStyle {
        match self {
            Self::Arrow | Self::Open => LineStyle::Solid,
            Self::DottedArrow | Self::DottedOpen => LineStyle::Dotted,
            Self::ThickArrow | Self::ThickOpen => LineStyle::Thick,
            Self::Invisible => LineStyle::Invisible,
        }
    }

    /// Map a possibly lengthened link token (`---->`, `-..->`) onto its kind.
    pub fn from_link_token(token: &str) -> Option<Self> {
        let head = token.ends_with('>');
        let arrow = if token.starts_with("-.") || token.contains('.') {
            if head { Self::DottedArrow } else { Self::DottedOpen }
        } else if token.starts_with('=') {
            if head { Self::ThickArrow } else { Self::ThickOpen }
        } else if token.starts_with('~') {
            Self::Invisible
        } else if token.starts_with('-') {
            if head { Self::Arrow } else { Self::Open }
        } else {
            return None;
        };
        Some(arrow)
    }
}

impl fmt::Display for ArrowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for ArrowType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        Self::ALL
            .into_iter()
            .find(|arrow| arrow.token() == token)
            .ok_or_else(|| format!("unknown arrow '{s}'"))
    }
}

/// Layout direction of a flowchart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    #[serde(rename = "TD", alias = "TB")]
    TopDown,
    #[serde(rename = "BT")]
    BottomTop,
    #[serde(rename = "LR")]
    LeftRight,
    #[serde(rename = "RL")]
    RightLeft,
}

impl Direction {
    pub const fn token(self) -> &'static str {
        match self {
            Self::TopDown => "TD",
            Self::BottomTop => "BT",
            Self::LeftRight => "LR",
            Self::RightLeft => "RL",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TD" | "TB" => Ok(Self::TopDown),
            "BT" => Ok(Self::BottomTop),
            "LR" => Ok(Self::LeftRight),
            "RL" => Ok(Self::RightLeft),
            _ => Err(format!("unknown direction '{s}'")),
        }
    }
}

/// Inline style for a single node (`style <id> ...`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<String>,
}

impl NodeStyle {
    pub fn fill(mut self, color: impl Into<String>) -> Self {
        self.fill = Some(color.into());
        self
    }

    pub fn stroke(mut self, color: impl Into<String>) -> Self {
        self.stroke = Some(color.into());
        self
    }

    pub const fn stroke_width(mut self, px: u32) -> Self {
        self.stroke_width = Some(px);
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Render as Mermaid's comma-separated CSS property list.
    pub fn to_css(&self) -> String {
        let mut parts = Vec::new();
        if let Some(fill) = &self.fill {
            parts.push(format!("fill:{fill}"));
        }
        if let Some(stroke) = &self.stroke {
            parts.push(format!("stroke:{stroke}"));
        }
        if let Some(width) = self.stroke_width {
            parts.push(format!("stroke-width:{width}px"));
        }
        if let Some(color) = &self.color {
            parts.push(format!("color:{color}"));
        }
        if let Some(size) = &self.font_size {
            parts.push(format!("font-size:{size}"));
        }
        if let Some(weight) = &self.font_weight {
            parts.push(format!("font-weight:{weight}"));
        }
        parts.join(",")
    }

    /// Parse a CSS property list; unknown properties are ignored.
    pub fn from_css(css: &str) -> Self {
        let mut style = Self::default();
        for part in css.split(',') {
            let Some((prop, value)) = part.split_once(':') else {
                continue;
            };
            let value = value.trim().to_string();
            match prop.trim() {
                "fill" => style.fill = Some(value),
                "stroke" => style.stroke = Some(value),
                "stroke-width" => {
                    style.stroke_width = value.trim_end_matches("px").trim().parse().ok();
                }
                "color" => style.color = Some(value),
                "font-size" => style.font_size = Some(value),
                "font-weight" => style.font_weight = Some(value),
                _ => {}
            }
        }
        style
    }

    pub fn is_empty(&self) -> bool {
        self.to_css().is_empty()
    }
}

/// What happens when a node is clicked in the rendered diagram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClickAction {
    Callback { name: String },
    Link { url: String, tooltip: Option<String> },
}

/// A node in a flowchart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramNode {
    pub id: String,
    pub label: String,
    pub shape: NodeShape,
    /// Style class tag (`class <id> <name>`).
    pub class: Option<String>,
    pub style: Option<NodeStyle>,
    pub click: Option<ClickAction>,
}

impl DiagramNode {
    pub fn new(id: impl Into<String>, label: impl Into<String>, shape: NodeShape) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            shape,
            class: None,
            style: None,
            click: None,
        }
    }
}

/// A directed edge between two registered nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramConnection {
    pub from: String,
    pub to: String,
    pub arrow: ArrowType,
    pub label: Option<String>,
}

/// A titled group of existing nodes, possibly holding nested groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subgraph {
    pub id: String,
    pub title: Option<String>,
    pub nodes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subgraphs: Vec<Subgraph>,
}

impl Subgraph {
    pub fn new(id: impl Into<String>, title: Option<String>) -> Self {
        Self {
            id: id.into(),
            title,
            nodes: Vec::new(),
            subgraphs: Vec::new(),
        }
    }

    /// This subgraph or a descendant with the given id.
    pub fn find(&self, id: &str) -> Option<&Self> {
        if self.id == id {
            return Some(self);
        }
        self.subgraphs.iter().find_map(|child| child.find(id))
    }

    fn find_mut(&mut self, id: &str) -> Option<&mut Self> {
        if self.id == id {
            return Some(self);
        }
        self.subgraphs.iter_mut().find_map(|child| child.find_mut(id))
    }

    /// Number of subgraphs in this tree, including `self`.
    pub fn count(&self) -> usize {
        1 + self.subgraphs.iter().map(Self::count).sum::<usize>()
    }

    pub(crate) fn forget_node(&mut self, id: &str) {
        self.nodes.retain(|member| member != id);
        for child in &mut self.subgraphs {
            child.forget_node(id);
        }
    }
}

/// A flowchart: insertion-ordered nodes, ordered connections and metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagram {
    title: Option<String>,
    direction: Direction,
    nodes: IndexMap<String, DiagramNode>,
    connections: Vec<DiagramConnection>,
    subgraphs: Vec<Subgraph>,
    class_defs: IndexMap<String, String>,
}

impl Diagram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub const fn direction(&self) -> Direction {
        self.direction
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl ExactSizeIterator<Item = &DiagramNode> {
        self.nodes.values()
    }

    pub fn node(&self, id: &str) -> Option<&DiagramNode> {
        self.nodes.get(id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn connections(&self) -> &[DiagramConnection] {
        &self.connections
    }

    /// Top-level subgraphs. Nested ones hang off [`Subgraph::subgraphs`].
    pub fn subgraphs(&self) -> &[Subgraph] {
        &self.subgraphs
    }

    pub fn subgraph(&self, id: &str) -> Option<&Subgraph> {
        self.subgraphs.iter().find_map(|sg| sg.find(id))
    }

    /// All subgraphs at any depth.
    pub fn subgraph_count(&self) -> usize {
        self.subgraphs.iter().map(Subgraph::count).sum()
    }

    pub const fn class_defs(&self) -> &IndexMap<String, String> {
        &self.class_defs
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn set_title(&mut self, title: Option<String>) {
        self.title = title;
    }

    pub(crate) const fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    pub(crate) fn insert_node(&mut self, node: DiagramNode) {
        self.nodes.insert(node.id.clone(), node);
    }

    pub(crate) fn node_mut(&mut self, id: &str) -> Option<&mut DiagramNode> {
        self.nodes.get_mut(id)
    }

    pub(crate) fn push_connection(&mut self, connection: DiagramConnection) {
        self.connections.push(connection);
    }

    pub(crate) fn push_subgraph(&mut self, subgraph: Subgraph) {
        self.subgraphs.push(subgraph);
    }

    /// Attach `subgraph` under `parent`. Hands it back if no such parent exists.
    pub(crate) fn push_nested_subgraph(
        &mut self,
        parent: &str,
        subgraph: Subgraph,
    ) -> Result<(), Subgraph> {
        match self.subgraphs.iter_mut().find_map(|sg| sg.find_mut(parent)) {
            Some(parent) => {
                parent.subgraphs.push(subgraph);
                Ok(())
            }
            None => Err(subgraph),
        }
    }

    /// Drop a node and its subgraph memberships. Connections are left alone.
    pub(crate) fn remove_node(&mut self, id: &str) -> Option<DiagramNode> {
        let node = self.nodes.shift_remove(id)?;
        for subgraph in &mut self.subgraphs {
            subgraph.forget_node(id);
        }
        Some(node)
    }

    pub(crate) fn insert_class_def(&mut self, name: String, css: String) {
        self.class_defs.insert(name, css);
    }

    pub(crate) fn has_subgraph(&self, id: &str) -> bool {
        self.subgraph(id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_parses_aliases_case_insensitively() {
        assert_eq!("Diamond".parse::<NodeShape>(), Ok(NodeShape::Rhombus));
        assert_eq!("rectangle".parse::<NodeShape>(), Ok(NodeShape::Rect));
        assert_eq!(
            "parallelogram-alt".parse::<NodeShape>(),
            Ok(NodeShape::ParallelogramAlt)
        );
        assert!("blob".parse::<NodeShape>().is_err());
    }

    #[test]
    fn test_arrow_from_link_token_handles_long_links() {
        assert_eq!(ArrowType::from_link_token("---->"), Some(ArrowType::Arrow));
        assert_eq!(ArrowType::from_link_token("----"), Some(ArrowType::Open));
        assert_eq!(
            ArrowType::from_link_token("-..->"),
            Some(ArrowType::DottedArrow)
        );
        assert_eq!(ArrowType::from_link_token("====>"), Some(ArrowType::ThickArrow));
        assert_eq!(ArrowType::from_link_token("~~~~"), Some(ArrowType::Invisible));
    }

    #[test]
    fn test_arrow_line_style() {
        assert_eq!(ArrowType::DottedOpen.line_style(), LineStyle::Dotted);
        assert_eq!(ArrowType::ThickArrow.line_style(), LineStyle::Thick);
        assert_eq!(ArrowType::Open.line_style(), LineStyle::Solid);
    }

    #[test]
    fn test_direction_accepts_tb_alias() {
        assert_eq!("TB".parse::<Direction>(), Ok(Direction::TopDown));
        assert_eq!("lr".parse::<Direction>(), Ok(Direction::LeftRight));
        assert!("XY".parse::<Direction>().is_err());
    }

    #[test]
    fn test_node_style_css_round_trip() {
        let style = NodeStyle::default()
            .fill("#f9f")
            .stroke("#333")
            .stroke_width(4)
            .color("#000");
        let css = style.to_css();
        assert_eq!(css, "fill:#f9f,stroke:#333,stroke-width:4px,color:#000");
        assert_eq!(NodeStyle::from_css(&css), style);
    }

    #[test]
    fn test_empty_style_renders_nothing() {
        assert!(NodeStyle::default().is_empty());
    }
}
