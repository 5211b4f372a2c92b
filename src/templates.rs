//! Template library.
//!
//! Two kinds of templates live here:
//! - example source text for every supported diagram type
//! - structured flowchart templates that instantiate a [`FlowchartBuilder`]

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::builder::{BuildError, FlowchartBuilder};
use crate::diagram::{ArrowType, Direction, NodeShape, NodeStyle};
use crate::validate::DiagramKind;

/// Example source for a diagram type.
pub const fn diagram_template(kind: DiagramKind) -> &'static str {
    match kind {
        DiagramKind::Flowchart => {
            "flowchart TD
    A[Start] --> B{Decision}
    B -->|Yes| C[Process]
    B -->|No| D[Alternative]
    C --> E[End]
    D --> E"
        }
        DiagramKind::Sequence => {
            "sequenceDiagram
    participant A as Alice
    participant B as Bob
    A->>B: Hello Bob, how are you?
    B-->>A: Great thanks!
    A-)B: See you later!"
        }
        DiagramKind::Class => {
            "classDiagram
    class Animal {
        +String name
        +int age
        +makeSound()
    }
    class Dog {
        +String breed
        +bark()
    }
    Animal <|-- Dog"
        }
        DiagramKind::State => {
            "stateDiagram-v2
    [*] --> Still
    Still --> [*]
    Still --> Moving
    Moving --> Still
    Moving --> Crash
    Crash --> [*]"
        }
        DiagramKind::Er => {
            "erDiagram
    CUSTOMER ||--o{ ORDER : places
    ORDER ||--|{ LINE-ITEM : contains
    CUSTOMER }|..|{ DELIVERY-ADDRESS : uses"
        }
        DiagramKind::Journey => {
            "journey
    title My working day
    section Go to work
      Make tea: 5: Me
      Go upstairs: 3: Me
      Do work: 1: Me, Cat
    section Go home
      Go downstairs: 5: Me
      Sit down: 5: Me"
        }
        DiagramKind::Gantt => {
            "gantt
    title A Gantt Diagram
    dateFormat  YYYY-MM-DD
    section Section
    A task           :a1, 2014-01-01, 30d
    Another task     :after a1, 20d"
        }
        DiagramKind::Pie => {
            "pie title Pets adopted by volunteers
    \"Dogs\" : 386
    \"Cats\" : 85
    \"Rats\" : 15"
        }
        DiagramKind::Quadrant => {
            "quadrantChart
    title Reach and influence
    x-axis Low Reach --> High Reach
    y-axis Low Influence --> High Influence
    quadrant-1 We should expand
    quadrant-2 Need to promote
    quadrant-3 Re-evaluate
    quadrant-4 May be improved
    Campaign A: [0.3, 0.6]
    Campaign B: [0.45, 0.23]
    Campaign C: [0.57, 0.69]"
        }
        DiagramKind::GitGraph => {
            "gitGraph
    commit
    commit
    branch develop
    checkout develop
    commit
    commit
    checkout main
    merge develop
    commit"
        }
        DiagramKind::Mindmap => {
            "mindmap
  root((mindmap))
    Origins
      Long history
    Research
      On effectiveness
    Tools
      Pen and paper
      Mermaid"
        }
    }
}

/// Look up example source by type name (`"sequence"`, `"erDiagram"`, ...).
/// Unknown names yield `None`.
pub fn find_diagram_template(name: &str) -> Option<&'static str> {
    name.parse::<DiagramKind>().ok().map(diagram_template)
}

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("template '{0}' not found")]
    NotFound(String),
    #[error("failed to access template {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid template {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("template '{name}' cannot be built: {source}")]
    Build {
        name: String,
        #[source]
        source: BuildError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateNode {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub shape: NodeShape,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateConnection {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub arrow: ArrowType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// A reusable flowchart skeleton, stored as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowchartTemplate {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub nodes: Vec<TemplateNode>,
    #[serde(default)]
    pub connections: Vec<TemplateConnection>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub styles: IndexMap<String, NodeStyle>,
}

impl FlowchartTemplate {
    /// Replay the template through a builder.
    ///
    /// # Errors
    ///
    /// Fails if the template repeats a node id or connects unknown nodes.
    pub fn to_builder(
        &self,
        title: Option<&str>,
        direction: Option<Direction>,
    ) -> Result<FlowchartBuilder, BuildError> {
        let mut builder = FlowchartBuilder::new();
        if let Some(title) = title {
            builder.set_title(title);
        }
        if let Some(direction) = direction {
            builder.set_direction(direction);
        }
        for node in &self.nodes {
            builder.add_node(&node.id, &node.label, node.shape)?;
        }
        for conn in &self.connections {
            builder.connect_styled(&conn.from, &conn.to, conn.arrow, conn.label.as_deref())?;
        }
        for (id, style) in &self.styles {
            builder.style_node(id, style.clone())?;
        }
        Ok(builder)
    }
}

fn node(id: &str, label: &str, shape: NodeShape) -> TemplateNode {
    TemplateNode {
        id: id.to_string(),
        label: label.to_string(),
        shape,
    }
}

fn link(from: &str, to: &str, label: Option<&str>) -> TemplateConnection {
    TemplateConnection {
        from: from.to_string(),
        to: to.to_string(),
        arrow: ArrowType::Arrow,
        label: label.map(ToString::to_string),
    }
}

fn builtin_templates() -> Vec<FlowchartTemplate> {
    vec![
        FlowchartTemplate {
            name: "simple_process".to_string(),
            description: "Simple linear process flow".to_string(),
            nodes: vec![
                node("start", "Start", NodeShape::Stadium),
                node("process1", "Process Step 1", NodeShape::Rect),
                node("process2", "Process Step 2", NodeShape::Rect),
                node("finish", "End", NodeShape::Stadium),
            ],
            connections: vec![
                link("start", "process1", None),
                link("process1", "process2", None),
                link("process2", "finish", None),
            ],
            styles: IndexMap::new(),
        },
        FlowchartTemplate {
            name: "decision_flow".to_string(),
            description: "Flow with decision points".to_string(),
            nodes: vec![
                node("start", "Start", NodeShape::Stadium),
                node("input", "Get Input", NodeShape::Rect),
                node("decision", "Valid Input?", NodeShape::Rhombus),
                node("process", "Process Data", NodeShape::Rect),
                node("error", "Show Error", NodeShape::Rect),
                node("finish", "End", NodeShape::Stadium),
            ],
            connections: vec![
                link("start", "input", None),
                link("input", "decision", None),
                link("decision", "process", Some("Yes")),
                link("decision", "error", Some("No")),
                link("process", "finish", None),
                link("error", "input", None),
            ],
            styles: IndexMap::from([
                (
                    "error".to_string(),
                    NodeStyle::default().fill("#ffcccc").stroke("#ff0000"),
                ),
                (
                    "process".to_string(),
                    NodeStyle::default().fill("#ccffcc").stroke("#00aa00"),
                ),
            ]),
        },
    ]
}

/// Built-in flowchart templates plus `*.json` files in a directory.
pub struct TemplateManager {
    dir: PathBuf,
    templates: IndexMap<String, FlowchartTemplate>,
}

impl TemplateManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let templates = builtin_templates()
            .into_iter()
            .map(|t| (t.name.clone(), t))
            .collect();
        Self {
            dir: dir.into(),
            templates,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Sorted names of every known template.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.templates.keys().cloned().collect();
        if let Ok(entries) = fs::read_dir(&self.dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "json")
                    && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
                    && !names.iter().any(|n| n == stem)
                {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        names
    }

    /// Load by template name or by path to a JSON file.
    ///
    /// # Errors
    ///
    /// [`TemplateError::NotFound`] if neither a known name nor an existing
    /// file matches, or a read/parse error for the file.
    pub fn load(&self, name_or_path: &str) -> Result<FlowchartTemplate, TemplateError> {
        if let Some(template) = self.templates.get(name_or_path) {
            return Ok(template.clone());
        }

        let candidate = Path::new(name_or_path);
        let path = if candidate.extension().is_some_and(|ext| ext == "json") {
            candidate.to_path_buf()
        } else {
            self.dir.join(format!("{name_or_path}.json"))
        };
        if !path.is_file() {
            return Err(TemplateError::NotFound(name_or_path.to_string()));
        }

        let text = fs::read_to_string(&path).map_err(|source| TemplateError::Io {
            path: path.clone(),
            source,
        })?;
        let template = serde_json::from_str(&text)
            .map_err(|source| TemplateError::Json { path: path.clone(), source })?;
        tracing::debug!(path = %path.display(), "loaded template");
        Ok(template)
    }

    /// Save as `<dir>/<name>.json` and register it.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save(&mut self, template: &FlowchartTemplate) -> Result<PathBuf, TemplateError> {
        let path = self.dir.join(format!("{}.json", template.name));
        let io_err = |source| TemplateError::Io {
            path: path.clone(),
            source,
        };
        fs::create_dir_all(&self.dir).map_err(io_err)?;
        let json = serde_json::to_string_pretty(template).map_err(|source| TemplateError::Json {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, json).map_err(io_err)?;
        self.templates
            .insert(template.name.clone(), template.clone());
        tracing::info!(path = %path.display(), "saved template");
        Ok(path)
    }

    /// Instantiate a template with optional title and direction overrides.
    ///
    /// # Errors
    ///
    /// Fails if the template cannot be loaded or replayed.
    pub fn create_flowchart(
        &self,
        name: &str,
        title: Option<&str>,
        direction: Option<Direction>,
    ) -> Result<FlowchartBuilder, TemplateError> {
        let template = self.load(name)?;
        template
            .to_builder(title, direction)
            .map_err(|source| TemplateError::Build {
                name: template.name.clone(),
                source,
            })
    }
}

impl Default for TemplateManager {
    fn default() -> Self {
        Self::new("templates")
    }
}
