//! Mermaid flowchart text to [`Diagram`].
//!
//! The parser is lenient: statements it does not understand are skipped.
//! Only input that is not a flowchart at all is rejected.

use super::syntax::{NodeRef, is_valid_id, sanitize_id, split_chain, split_group};
use super::types::{
    ClickAction, Diagram, DiagramConnection, DiagramNode, Direction, NodeShape, NodeStyle,
    Subgraph,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("not a flowchart: expected a `flowchart` or `graph` header, found '{0}'")]
    NotAFlowchart(String),
    #[error("empty input")]
    Empty,
}

#[derive(Default)]
struct ParseState {
    diagram: Diagram,
    open_subgraphs: Vec<Subgraph>,
}

impl ParseState {
    fn is_subgraph(&self, id: &str) -> bool {
        self.diagram.has_subgraph(id) || self.open_subgraphs.iter().any(|sg| sg.find(id).is_some())
    }

    fn touch(&mut self, node_ref: &NodeRef) -> Option<String> {
        if node_ref.id.is_empty() {
            return None;
        }
        let id = sanitize_id(&node_ref.id);
        // Links may target a whole subgraph.
        if self.is_subgraph(&id) {
            return Some(id);
        }

        match self.diagram.node_mut(&id) {
            Some(node) => {
                if let Some((shape, label)) = &node_ref.shape {
                    node.shape = *shape;
                    node.label.clone_from(label);
                }
                if node_ref.class.is_some() {
                    node.class.clone_from(&node_ref.class);
                }
            }
            None => {
                let (shape, label) = node_ref
                    .shape
                    .clone()
                    .unwrap_or_else(|| (NodeShape::Rect, id.clone()));
                let mut node = DiagramNode::new(id.clone(), label, shape);
                node.class.clone_from(&node_ref.class);
                self.diagram.insert_node(node);
            }
        }

        if let Some(subgraph) = self.open_subgraphs.last_mut()
            && !subgraph.nodes.contains(&id)
        {
            subgraph.nodes.push(id.clone());
        }
        Some(id)
    }

    fn open_subgraph(&mut self, header: &str) {
        let subgraph = parse_subgraph_header(header);
        // A link that named the subgraph before its block created a bare node.
        if self.diagram.node(&subgraph.id).is_some_and(is_implicit) {
            self.diagram.remove_node(&subgraph.id);
            for open in &mut self.open_subgraphs {
                open.forget_node(&subgraph.id);
            }
        }
        self.open_subgraphs.push(subgraph);
    }

    fn close_subgraph(&mut self) {
        let Some(subgraph) = self.open_subgraphs.pop() else {
            return;
        };
        match self.open_subgraphs.last_mut() {
            Some(parent) => parent.subgraphs.push(subgraph),
            None => self.diagram.push_subgraph(subgraph),
        }
    }

    fn statement(&mut self, line: &str) {
        if let Some(rest) = line.strip_prefix("subgraph ") {
            self.open_subgraph(rest);
            return;
        }
        if line == "end" {
            self.close_subgraph();
            return;
        }
        if line.starts_with("direction ") || line.starts_with("linkStyle ") {
            return;
        }
        if let Some(rest) = line.strip_prefix("style ") {
            if let Some((id, css)) = rest.trim().split_once(char::is_whitespace)
                && let Some(node) = self.diagram.node_mut(id)
            {
                node.style = Some(NodeStyle::from_css(css.trim()));
            }
            return;
        }
        if let Some(rest) = line.strip_prefix("classDef ") {
            if let Some((name, css)) = rest.trim().split_once(char::is_whitespace) {
                self.diagram
                    .insert_class_def(name.to_string(), css.trim().to_string());
            }
            return;
        }
        if let Some(rest) = line.strip_prefix("class ") {
            if let Some((ids, class)) = rest.trim().rsplit_once(char::is_whitespace) {
                for id in ids.split(',').map(str::trim) {
                    if let Some(node) = self.diagram.node_mut(id) {
                        node.class = Some(class.trim().to_string());
                    }
                }
            }
            return;
        }
        if let Some(rest) = line.strip_prefix("click ") {
            self.click(rest.trim());
            return;
        }

        if let Some(chain) = split_chain(line) {
            let groups: Vec<Vec<String>> = chain
                .groups
                .iter()
                .map(|group| group.iter().filter_map(|r| self.touch(r)).collect())
                .collect();
            for (idx, link) in chain.links.iter().enumerate() {
                for from in &groups[idx] {
                    for to in &groups[idx + 1] {
                        self.diagram.push_connection(DiagramConnection {
                            from: from.clone(),
                            to: to.clone(),
                            arrow: link.arrow,
                            label: link.label.clone(),
                        });
                    }
                }
            }
            return;
        }

        for node_ref in split_group(line) {
            self.touch(&node_ref);
        }
    }

    fn click(&mut self, rest: &str) {
        let Some((id, action)) = rest.split_once(char::is_whitespace) else {
            return;
        };
        let action = action.trim();
        let click = if let Some(link) = action.strip_prefix("href") {
            let quoted = quoted_strings(link);
            let Some(url) = quoted.first() else {
                return;
            };
            ClickAction::Link {
                url: url.clone(),
                tooltip: quoted.get(1).cloned(),
            }
        } else if action.starts_with('"') {
            let quoted = quoted_strings(action);
            let Some(url) = quoted.first() else {
                return;
            };
            ClickAction::Link {
                url: url.clone(),
                tooltip: quoted.get(1).cloned(),
            }
        } else {
            ClickAction::Callback {
                name: action.to_string(),
            }
        };
        if let Some(node) = self.diagram.node_mut(id) {
            node.click = Some(click);
        }
    }
}

fn is_implicit(node: &DiagramNode) -> bool {
    node.shape == NodeShape::Rect
        && node.label == node.id
        && node.class.is_none()
        && node.style.is_none()
        && node.click.is_none()
}

fn quoted_strings(text: &str) -> Vec<String> {
    text.split('"')
        .skip(1)
        .step_by(2)
        .map(ToString::to_string)
        .collect()
}

fn parse_subgraph_header(rest: &str) -> Subgraph {
    let rest = rest.trim();
    if let Some(open) = rest.find('[') {
        let id = rest[..open].trim();
        let title = rest[open + 1..]
            .trim_end()
            .trim_end_matches(']')
            .trim()
            .trim_matches('"');
        return Subgraph::new(sanitize_id(id), Some(title.to_string()));
    }
    if is_valid_id(rest) {
        Subgraph::new(rest, None)
    } else {
        let title = rest.trim_matches('"');
        Subgraph::new(sanitize_id(title), Some(title.to_string()))
    }
}

/// Parse Mermaid flowchart text into a [`Diagram`].
///
/// # Errors
///
/// Returns an error if the input is empty or does not start with a
/// `flowchart`/`graph` header.
pub fn parse_flowchart(text: &str) -> Result<Diagram, ParseError> {
    let mut state = ParseState::default();
    let mut lines = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("%%"));

    let mut header = None;
    while let Some(line) = lines.next() {
        if line == "---" {
            for meta in lines.by_ref() {
                if meta == "---" {
                    break;
                }
                if let Some(title) = meta.strip_prefix("title:") {
                    state.diagram.set_title(Some(title.trim().to_string()));
                }
            }
            continue;
        }
        header = Some(line);
        break;
    }

    let header = header.ok_or(ParseError::Empty)?;
    let mut tokens = header.trim_end_matches(';').split_whitespace();
    match tokens.next() {
        Some("flowchart" | "graph") => {}
        _ => return Err(ParseError::NotAFlowchart(header.to_string())),
    }
    let direction = tokens
        .next()
        .and_then(|token| token.parse::<Direction>().ok())
        .unwrap_or_default();
    state.diagram.set_direction(direction);

    for line in lines {
        state.statement(line);
    }
    while !state.open_subgraphs.is_empty() {
        state.close_subgraph();
    }

    tracing::debug!(
        nodes = state.diagram.node_count(),
        connections = state.diagram.connections().len(),
        "parsed flowchart"
    );
    Ok(state.diagram)
}
