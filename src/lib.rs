// Only allow lints that are either transitive-dependency noise or
// genuinely opinionated style choices that don't indicate real issues.
#![allow(
    // Transitive dependency version mismatches we can't control
    clippy::multiple_crate_versions,
    // module_name_repetitions is pure style preference (e.g. validate::ValidationResult)
    clippy::module_name_repetitions
)]

//! # mermaidview
//!
//! Build, validate and render Mermaid diagrams.
//!
//! - Flowcharts are modelled as typed [`diagram::Diagram`] values, built
//!   with [`builder::FlowchartBuilder`] and parsed back from text.
//! - Diagram text of eleven Mermaid types is checked by
//!   [`validate::validate`], which reports line-numbered errors and warnings.
//! - Images are produced by [`generate::Generator`], which delegates to a
//!   pluggable [`generate::Renderer`] (the Mermaid CLI or a mermaid.ink style
//!   service) under a per-attempt timeout with one retry.
//!
//! ## Modules
//!
//! - [`diagram`]: Flowchart model and parser
//! - [`builder`]: Fluent flowchart construction
//! - [`validate`]: Multi-type syntax validation
//! - [`generate`]: Rendering configuration, renderers and the generator
//! - [`templates`]: Example diagrams and flowchart templates
//! - [`interchange`]: JSON, YAML and CSV import/export
//! - [`enhance`]: Optional LLM-assisted rewriting
//! - [`config`]: Persisted CLI defaults

pub mod builder;
pub mod config;
pub mod diagram;
pub mod enhance;
pub mod generate;
pub mod interchange;
pub mod templates;
pub mod validate;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::builder::{BuildError, FlowchartBuilder, quick_flowchart};
    pub use crate::diagram::{ArrowType, Diagram, Direction, NodeShape, NodeStyle};
    pub use crate::generate::{GenerateError, GenerationConfig, Generator, Renderer};
    pub use crate::validate::{DiagramKind, ValidationResult, validate};
}
