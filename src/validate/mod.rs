//! Mermaid source validation.
//!
//! [`validate`] detects the diagram type from its header keyword and runs the
//! rule table registered for that type. Problems are returned as data in a
//! [`ValidationResult`]; validation itself never fails.

mod rules;
mod structure;
#[cfg(test)]
mod tests;

use std::fmt;
use std::str::FromStr;

pub use structure::validate_diagram;

/// The Mermaid dialects the validator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagramKind {
    Flowchart,
    Sequence,
    Class,
    State,
    Er,
    Journey,
    Gantt,
    Pie,
    Quadrant,
    GitGraph,
    Mindmap,
}

/// Header keywords, matched case-sensitively against the first token.
const KEYWORDS: &[(&str, DiagramKind)] = &[
    ("flowchart", DiagramKind::Flowchart),
    ("graph", DiagramKind::Flowchart),
    ("sequenceDiagram", DiagramKind::Sequence),
    ("classDiagram", DiagramKind::Class),
    ("classDiagram-v2", DiagramKind::Class),
    ("stateDiagram", DiagramKind::State),
    ("stateDiagram-v2", DiagramKind::State),
    ("erDiagram", DiagramKind::Er),
    ("journey", DiagramKind::Journey),
    ("gantt", DiagramKind::Gantt),
    ("pie", DiagramKind::Pie),
    ("quadrantChart", DiagramKind::Quadrant),
    ("gitGraph", DiagramKind::GitGraph),
    ("mindmap", DiagramKind::Mindmap),
];

impl DiagramKind {
    pub const ALL: [Self; 11] = [
        Self::Flowchart,
        Self::Sequence,
        Self::Class,
        Self::State,
        Self::Er,
        Self::Journey,
        Self::Gantt,
        Self::Pie,
        Self::Quadrant,
        Self::GitGraph,
        Self::Mindmap,
    ];

    pub fn from_keyword(token: &str) -> Option<Self> {
        KEYWORDS
            .iter()
            .find(|(keyword, _)| *keyword == token)
            .map(|(_, kind)| *kind)
    }

    /// Short name used by the CLI and the template library.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Flowchart => "flowchart",
            Self::Sequence => "sequence",
            Self::Class => "class",
            Self::State => "state",
            Self::Er => "er",
            Self::Journey => "journey",
            Self::Gantt => "gantt",
            Self::Pie => "pie",
            Self::Quadrant => "quadrant",
            Self::GitGraph => "gitgraph",
            Self::Mindmap => "mindmap",
        }
    }

    /// The header keyword written for this kind.
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Flowchart => "flowchart",
            Self::Sequence => "sequenceDiagram",
            Self::Class => "classDiagram",
            Self::State => "stateDiagram-v2",
            Self::Er => "erDiagram",
            Self::Journey => "journey",
            Self::Gantt => "gantt",
            Self::Pie => "pie",
            Self::Quadrant => "quadrantChart",
            Self::GitGraph => "gitGraph",
            Self::Mindmap => "mindmap",
        }
    }

    const fn rules(self) -> &'static [Rule] {
        match self {
            Self::Flowchart => rules::FLOWCHART,
            Self::Sequence => rules::SEQUENCE,
            Self::Class => rules::CLASS,
            Self::State => rules::STATE,
            Self::Er => rules::ER,
            Self::Journey => rules::JOURNEY,
            Self::Gantt => rules::GANTT,
            Self::Pie => rules::PIE,
            Self::Quadrant => rules::QUADRANT,
            Self::GitGraph => rules::GIT_GRAPH,
            Self::Mindmap => rules::MINDMAP,
        }
    }
}

impl fmt::Display for DiagramKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DiagramKind {
    type Err = String;

    /// Accepts short names and header keywords, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let alias = match lower.as_str() {
            "graph" => Some(Self::Flowchart),
            "erdiagram" | "entity" => Some(Self::Er),
            "git" => Some(Self::GitGraph),
            _ => None,
        };
        alias
            .or_else(|| {
                Self::ALL.into_iter().find(|kind| {
                    kind.name() == lower || kind.keyword().to_ascii_lowercase() == lower
                })
            })
            .ok_or_else(|| format!("unknown diagram type '{s}'"))
    }
}

/// A single error or warning, optionally tied to a 1-based source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub line: Option<usize>,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "Line {line}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    kind: Option<DiagramKind>,
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// The detected diagram type, if the header was recognised.
    pub const fn kind(&self) -> Option<DiagramKind> {
        self.kind
    }

    pub fn errors(&self) -> &[ValidationIssue] {
        &self.errors
    }

    pub fn warnings(&self) -> &[ValidationIssue] {
        &self.warnings
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Human readable summary used by the CLI.
    pub fn report(&self) -> String {
        let mut out = String::new();
        if self.is_valid() {
            out.push_str("Validation passed\n");
        } else {
            out.push_str("ERRORS:\n");
            for issue in &self.errors {
                out.push_str(&format!("  - {issue}\n"));
            }
        }
        if !self.warnings.is_empty() {
            out.push_str("WARNINGS:\n");
            for issue in &self.warnings {
                out.push_str(&format!("  - {issue}\n"));
            }
        }
        out
    }

    pub(crate) fn error(&mut self, line: Option<usize>, message: impl Into<String>) {
        self.errors.push(ValidationIssue {
            line,
            message: message.into(),
        });
    }

    pub(crate) fn warning(&mut self, line: Option<usize>, message: impl Into<String>) {
        self.warnings.push(ValidationIssue {
            line,
            message: message.into(),
        });
    }

    pub(crate) const fn set_kind(&mut self, kind: DiagramKind) {
        self.kind = Some(kind);
    }
}

/// A significant (non-blank, non-comment) source line.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SourceLine<'a> {
    pub number: usize,
    pub text: &'a str,
    pub indent: usize,
}

/// Source text split into its header line and the statements after it.
#[derive(Debug)]
pub(crate) struct Source<'a> {
    pub header: SourceLine<'a>,
    pub keyword: &'a str,
    pub lines: Vec<SourceLine<'a>>,
}

impl<'a> Source<'a> {
    /// Skips blank lines, `%%` comments/directives and a leading `---`
    /// front-matter block. Returns `None` when nothing is left.
    fn parse(text: &'a str) -> Option<Self> {
        let mut significant = text.lines().enumerate().filter_map(|(idx, raw)| {
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with("%%") {
                return None;
            }
            Some(SourceLine {
                number: idx + 1,
                text: trimmed,
                indent: raw.len() - raw.trim_start().len(),
            })
        });

        let mut header = significant.next()?;
        if header.text == "---" {
            for line in significant.by_ref() {
                if line.text == "---" {
                    break;
                }
            }
            header = significant.next()?;
        }

        let keyword = header
            .text
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .trim_end_matches([':', ';']);
        Some(Self {
            header,
            keyword,
            lines: significant.collect(),
        })
    }
}

/// A structural check run against one diagram type.
pub(crate) type Rule = fn(&Source<'_>, &mut ValidationResult);

/// Validate Mermaid source text of any supported diagram type.
pub fn validate(text: &str) -> ValidationResult {
    let mut result = ValidationResult::default();

    let Some(source) = Source::parse(text) else {
        result.error(None, "unrecognized diagram type: input is empty");
        return result;
    };
    let Some(kind) = DiagramKind::from_keyword(source.keyword) else {
        result.error(
            Some(source.header.number),
            format!("unrecognized diagram type '{}'", source.keyword),
        );
        return result;
    };

    result.set_kind(kind);
    for rule in kind.rules() {
        rule(&source, &mut result);
    }

    tracing::debug!(
        kind = %kind,
        errors = result.errors.len(),
        warnings = result.warnings.len(),
        "validated diagram"
    );
    result
}
