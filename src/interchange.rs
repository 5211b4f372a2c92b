//! Structured import and export of flowcharts as JSON, YAML or CSV.
//!
//! Imports never construct a [`Diagram`] directly; every document is replayed
//! through [`FlowchartBuilder`] so ids are sanitised and references checked.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::builder::{BuildError, FlowchartBuilder};
use crate::diagram::{
    ArrowType, ClickAction, Diagram, Direction, NodeShape, NodeStyle, Subgraph,
};

#[derive(Debug, thiserror::Error)]
pub enum InterchangeError {
    #[error("unsupported exchange format '{0}' (expected json, yaml or csv)")]
    UnsupportedFormat(String),
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: {message}")]
    InvalidRecord { row: usize, message: String },
    #[error(transparent)]
    Build(#[from] BuildError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeFormat {
    Json,
    Yaml,
    Csv,
}

impl ExchangeFormat {
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Csv => "csv",
        }
    }

    /// Pick the format from a file extension.
    ///
    /// # Errors
    ///
    /// [`InterchangeError::UnsupportedFormat`] for any other extension.
    pub fn from_path(path: &Path) -> Result<Self, InterchangeError> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        ext.parse()
    }
}

impl fmt::Display for ExchangeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExchangeFormat {
    type Err = InterchangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            "csv" => Ok(Self::Csv),
            _ => Err(InterchangeError::UnsupportedFormat(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub shape: NodeShape,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<NodeStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub click: Option<ClickAction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub arrow: ArrowType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub node_count: usize,
    pub connection_count: usize,
    pub subgraph_count: usize,
}

/// The JSON / YAML document shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagramDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub connections: Vec<ConnectionRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subgraphs: Vec<Subgraph>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub class_defs: IndexMap<String, String>,
    /// Written on export, ignored on import.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl DiagramDocument {
    pub fn from_diagram(diagram: &Diagram) -> Self {
        Self {
            title: diagram.title().map(ToString::to_string),
            direction: diagram.direction(),
            nodes: diagram
                .nodes()
                .map(|node| NodeRecord {
                    id: node.id.clone(),
                    label: node.label.clone(),
                    shape: node.shape,
                    class: node.class.clone(),
                    style: node.style.clone(),
                    click: node.click.clone(),
                })
                .collect(),
            connections: diagram
                .connections()
                .iter()
                .map(|conn| ConnectionRecord {
                    from: conn.from.clone(),
                    to: conn.to.clone(),
                    arrow: conn.arrow,
                    label: conn.label.clone(),
                })
                .collect(),
            subgraphs: diagram.subgraphs().to_vec(),
            class_defs: diagram.class_defs().clone(),
            metadata: Some(Metadata {
                node_count: diagram.node_count(),
                connection_count: diagram.connections().len(),
                subgraph_count: diagram.subgraph_count(),
            }),
        }
    }

    /// Replay the document through a builder.
    ///
    /// # Errors
    ///
    /// Any [`BuildError`] raised while replaying, e.g. a duplicate node id or
    /// a connection to a node the document never declares.
    pub fn to_builder(&self) -> Result<FlowchartBuilder, BuildError> {
        let mut builder = FlowchartBuilder::new();
        if let Some(title) = &self.title {
            builder.set_title(title.as_str());
        }
        builder.set_direction(self.direction);

        for node in &self.nodes {
            builder.add_node(&node.id, &node.label, node.shape)?;
            if let Some(style) = &node.style {
                builder.style_node(&node.id, style.clone())?;
            }
            if let Some(class) = &node.class {
                builder.apply_class(&node.id, class)?;
            }
            match &node.click {
                Some(ClickAction::Callback { name }) => {
                    builder.add_click_action(&node.id, name)?;
                }
                Some(ClickAction::Link { url, tooltip }) => {
                    builder.add_href_link(&node.id, url, tooltip.as_deref())?;
                }
                None => {}
            }
        }
        // Subgraphs first: connections may end on one.
        for subgraph in &self.subgraphs {
            replay_subgraph(&mut builder, None, subgraph)?;
        }
        for conn in &self.connections {
            builder.connect_styled(&conn.from, &conn.to, conn.arrow, conn.label.as_deref())?;
        }
        for (name, css) in &self.class_defs {
            builder.add_class_def(name, css);
        }
        Ok(builder)
    }
}

fn replay_subgraph(
    builder: &mut FlowchartBuilder,
    parent: Option<&str>,
    subgraph: &Subgraph,
) -> Result<(), BuildError> {
    let members: Vec<&str> = subgraph.nodes.iter().map(String::as_str).collect();
    let title = subgraph.title.as_deref();
    match parent {
        Some(parent) => builder.add_nested_subgraph(parent, &subgraph.id, title, &members)?,
        None => builder.add_subgraph(&subgraph.id, title, &members)?,
    };
    for child in &subgraph.subgraphs {
        replay_subgraph(builder, Some(&subgraph.id), child)?;
    }
    Ok(())
}

/// # Errors
///
/// Serialisation failures from `serde_json`.
pub fn to_json(diagram: &Diagram) -> Result<String, InterchangeError> {
    Ok(serde_json::to_string_pretty(&DiagramDocument::from_diagram(
        diagram,
    ))?)
}

/// # Errors
///
/// Malformed JSON or a document that violates builder invariants.
pub fn from_json(text: &str) -> Result<FlowchartBuilder, InterchangeError> {
    let document: DiagramDocument = serde_json::from_str(text)?;
    Ok(document.to_builder()?)
}

/// # Errors
///
/// Serialisation failures from `serde_yaml`.
pub fn to_yaml(diagram: &Diagram) -> Result<String, InterchangeError> {
    Ok(serde_yaml::to_string(&DiagramDocument::from_diagram(diagram))?)
}

/// # Errors
///
/// Malformed YAML or a document that violates builder invariants.
pub fn from_yaml(text: &str) -> Result<FlowchartBuilder, InterchangeError> {
    let document: DiagramDocument = serde_yaml::from_str(text)?;
    Ok(document.to_builder()?)
}

/// One CSV row. Unused columns stay empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
struct CsvRow {
    record: String,
    id: String,
    label: String,
    shape: String,
    from: String,
    to: String,
    arrow: String,
}

/// Flatten a diagram into `record,id,label,shape,from,to,arrow` rows.
///
/// Styles, classes, click actions and subgraphs have no CSV columns and are
/// left out.
///
/// # Errors
///
/// Writer failures from the `csv` crate.
pub fn to_csv(diagram: &Diagram) -> Result<String, InterchangeError> {
    let mut out = Vec::new();
    {
        let mut writer = csv::Writer::from_writer(&mut out);
        if let Some(title) = diagram.title() {
            writer.serialize(CsvRow {
                record: "title".to_string(),
                label: title.to_string(),
                ..CsvRow::default()
            })?;
        }
        writer.serialize(CsvRow {
            record: "direction".to_string(),
            label: diagram.direction().to_string(),
            ..CsvRow::default()
        })?;
        for node in diagram.nodes() {
            writer.serialize(CsvRow {
                record: "node".to_string(),
                id: node.id.clone(),
                label: node.label.clone(),
                shape: node.shape.to_string(),
                ..CsvRow::default()
            })?;
        }
        for conn in diagram.connections() {
            writer.serialize(CsvRow {
                record: "connection".to_string(),
                label: conn.label.clone().unwrap_or_default(),
                from: conn.from.clone(),
                to: conn.to.clone(),
                arrow: conn.arrow.to_string(),
                ..CsvRow::default()
            })?;
        }
        writer.flush().map_err(csv::Error::from)?;
    }
    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// Read rows written by [`to_csv`] (or by hand).
///
/// A row with an empty `record` column is treated as a node when it has an
/// id, and as a connection when it has both endpoints. Unknown shapes fall
/// back to a rectangle.
///
/// # Errors
///
/// Malformed CSV, an unknown record kind or direction, an unknown arrow, or
/// a builder error while replaying.
pub fn from_csv(text: &str) -> Result<FlowchartBuilder, InterchangeError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut builder = FlowchartBuilder::new();
    for (index, row) in reader.deserialize::<CsvRow>().enumerate() {
        // Row 1 is the header.
        let row_number = index + 2;
        let row = row?;
        let invalid = |message: String| InterchangeError::InvalidRecord {
            row: row_number,
            message,
        };

        let kind = match row.record.to_ascii_lowercase().as_str() {
            "" if !row.id.is_empty() => "node",
            "" if !row.from.is_empty() && !row.to.is_empty() => "connection",
            "" => continue,
            other => match other {
                "title" => "title",
                "direction" => "direction",
                "node" => "node",
                "connection" | "edge" => "connection",
                _ => return Err(invalid(format!("unknown record kind '{}'", row.record))),
            },
        };

        match kind {
            "title" => {
                builder.set_title(row.label.as_str());
            }
            "direction" => {
                let direction = row.label.parse::<Direction>().map_err(invalid)?;
                builder.set_direction(direction);
            }
            "node" => {
                let shape = if row.shape.is_empty() {
                    NodeShape::default()
                } else {
                    row.shape.parse().unwrap_or_else(|err: String| {
                        tracing::warn!(row = row_number, %err, "falling back to rect");
                        NodeShape::default()
                    })
                };
                let label = if row.label.is_empty() { &row.id } else { &row.label };
                builder.add_node(&row.id, label, shape)?;
            }
            _ => {
                let arrow = if row.arrow.is_empty() {
                    ArrowType::default()
                } else {
                    row.arrow.parse().map_err(invalid)?
                };
                let label = (!row.label.is_empty()).then_some(row.label.as_str());
                builder.connect_styled(&row.from, &row.to, arrow, label)?;
            }
        }
    }
    Ok(builder)
}

/// Serialise `diagram` in `format`.
///
/// # Errors
///
/// See [`to_json`], [`to_yaml`] and [`to_csv`].
pub fn export(diagram: &Diagram, format: ExchangeFormat) -> Result<String, InterchangeError> {
    match format {
        ExchangeFormat::Json => to_json(diagram),
        ExchangeFormat::Yaml => to_yaml(diagram),
        ExchangeFormat::Csv => to_csv(diagram),
    }
}

/// Parse `text` as `format` and replay it through a builder.
///
/// # Errors
///
/// See [`from_json`], [`from_yaml`] and [`from_csv`].
pub fn import(text: &str, format: ExchangeFormat) -> Result<FlowchartBuilder, InterchangeError> {
    match format {
        ExchangeFormat::Json => from_json(text),
        ExchangeFormat::Yaml => from_yaml(text),
        ExchangeFormat::Csv => from_csv(text),
    }
}

/// Write `diagram` to `path`, creating parent directories.
///
/// # Errors
///
/// Serialisation or filesystem failures.
pub fn export_file(
    diagram: &Diagram,
    path: &Path,
    format: ExchangeFormat,
) -> Result<(), InterchangeError> {
    let text = export(diagram, format)?;
    let io_err = |source| InterchangeError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(path, text).map_err(io_err)?;
    tracing::info!(path = %path.display(), %format, nodes = diagram.node_count(), "exported diagram");
    Ok(())
}

/// Read `path`, picking the format from its extension.
///
/// # Errors
///
/// [`InterchangeError::UnsupportedFormat`] for unknown extensions, plus any
/// read, parse or replay failure.
pub fn import_file(path: &Path) -> Result<FlowchartBuilder, InterchangeError> {
    let format = ExchangeFormat::from_path(path)?;
    let text = fs::read_to_string(path).map_err(|source| InterchangeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let builder = import(&text, format)?;
    tracing::info!(
        path = %path.display(),
        %format,
        nodes = builder.diagram().node_count(),
        "imported diagram"
    );
    Ok(builder)
}
