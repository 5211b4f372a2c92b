//! Flowchart diagram model.
//!
//! This module handles:
//! - The in-memory model (nodes, connections, subgraphs, styling)
//! - Lexing flowchart statements
//! - Parsing Mermaid flowchart text back into the model

mod parser;
pub mod syntax;
mod types;

pub use parser::{ParseError, parse_flowchart};
pub use types::{
    ArrowType, ClickAction, Diagram, DiagramConnection, DiagramNode, Direction, LineStyle,
    NodeShape, NodeStyle, Subgraph,
};
