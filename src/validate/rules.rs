//! Per-type rule tables.
//!
//! Each diagram kind maps to a slice of [`Rule`]s. Adding a dialect means
//! writing its checks and adding one arm to `DiagramKind::rules`.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use super::{Rule, Source, SourceLine, ValidationResult};
use crate::diagram::syntax::{NodeRef, is_valid_id, split_chain, split_group};

pub(super) const FLOWCHART: &[Rule] =
    &[flowchart_direction, flowchart_statements, flowchart_subgraphs];
pub(super) const SEQUENCE: &[Rule] = &[sequence_messages, sequence_blocks];
pub(super) const CLASS: &[Rule] = &[class_braces, class_declarations];
pub(super) const STATE: &[Rule] = &[state_braces, state_transitions];
pub(super) const ER: &[Rule] = &[er_structure];
pub(super) const JOURNEY: &[Rule] = &[journey_title, journey_tasks];
pub(super) const GANTT: &[Rule] = &[gantt_date_format, gantt_tasks];
pub(super) const PIE: &[Rule] = &[pie_entries, pie_title];
pub(super) const QUADRANT: &[Rule] = &[quadrant_axes, quadrant_points];
pub(super) const GIT_GRAPH: &[Rule] = &[git_commands];
pub(super) const MINDMAP: &[Rule] = &[mindmap_root];

static PIE_ENTRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^"(?P<label>[^"]*)"\s*:\s*(?P<value>.*)$"#).expect("pie entry regex")
});

static SEQ_MESSAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<from>[^<>:\-=~]+?)\s*(?P<arrow>[<>)\-.=~]*[\-=~>][<>)\-.=~]*x?)\s*(?P<mark>[+]?)\s*(?P<to>[^:]*?)\s*(?::(?P<message>.*))?$",
    )
    .expect("sequence message regex")
});

static ER_CARDINALITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\|o|\|\||\}o|\}\|)(?:--|\.\.)(?:o\||\|\||o\{|\|\{)$")
        .expect("cardinality regex")
});

static QUADRANT_POINT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>.+?)(?::::[\w-]+)?\s*:\s*\[(?P<x>[^,\]]*),(?P<y>[^\]]*)\]")
        .expect("quadrant point regex")
});

const FLOW_KEYWORDS: &[&str] = &[
    "subgraph",
    "end",
    "style",
    "classDef",
    "class",
    "click",
    "linkStyle",
    "direction",
];

const DIRECTIONS: &[&str] = &["TD", "TB", "BT", "LR", "RL"];

const SEQ_ARROWS: &[&str] = &[
    "->>", "-->>", "->", "-->", "-x", "--x", "-)", "--)", "<<->>", "<<-->>",
];

const SEQ_BLOCKS: &[&str] = &["loop", "alt", "opt", "par", "critical", "break", "rect", "box"];

const SEQ_KEYWORDS: &[&str] = &[
    "participant",
    "actor",
    "autonumber",
    "activate",
    "deactivate",
    "note",
    "Note",
    "else",
    "and",
    "option",
    "end",
    "title",
    "create",
    "destroy",
    "link",
    "links",
    "properties",
    "details",
    "accTitle",
    "accDescr",
];

const GANTT_KEYWORDS: &[&str] = &[
    "title",
    "dateFormat",
    "axisFormat",
    "tickInterval",
    "excludes",
    "includes",
    "todayMarker",
    "weekday",
    "weekend",
    "section",
    "displayMode",
    "inclusiveEndDates",
    "topAxis",
    "click",
    "accTitle",
    "accDescr",
];

const QUADRANT_KEYWORDS: &[&str] = &[
    "title",
    "x-axis",
    "y-axis",
    "quadrant-1",
    "quadrant-2",
    "quadrant-3",
    "quadrant-4",
    "classDef",
    "accTitle",
    "accDescr",
];

/// First whitespace token, without a trailing `:`.
fn keyword(text: &str) -> &str {
    text.split_whitespace()
        .next()
        .unwrap_or_default()
        .trim_end_matches(':')
}

// ---------------------------------------------------------------------------
// flowchart / graph

fn flowchart_direction(source: &Source<'_>, result: &mut ValidationResult) {
    let header = &source.header;
    match header.text.split_whitespace().nth(1).map(|d| d.trim_end_matches(';')) {
        None => result.error(
            Some(header.number),
            "missing direction (expected TD, TB, BT, LR or RL)",
        ),
        Some(direction) if !DIRECTIONS.contains(&direction) => result.error(
            Some(header.number),
            format!("invalid direction '{direction}' (expected TD, TB, BT, LR or RL)"),
        ),
        Some(_) => {}
    }
}

fn check_node_ref(node: &NodeRef, line: &SourceLine<'_>, result: &mut ValidationResult) {
    if let Some(rest) = &node.unparsed {
        result.error(
            Some(line.number),
            format!("malformed node declaration '{}{rest}'", node.id),
        );
    } else if !is_valid_id(&node.id) {
        result.warning(
            Some(line.number),
            format!("possibly malformed node id '{}'", node.id),
        );
    }
}

fn flowchart_statements(source: &Source<'_>, result: &mut ValidationResult) {
    let mut declared: Vec<(String, usize)> = Vec::new();
    let mut connected: HashSet<String> = HashSet::new();

    for line in &source.lines {
        if FLOW_KEYWORDS.contains(&keyword(line.text)) {
            continue;
        }

        if let Some(chain) = split_chain(line.text) {
            for node in chain.groups.iter().flatten() {
                if node.id.is_empty() {
                    result.error(Some(line.number), "connection is missing a node");
                    continue;
                }
                check_node_ref(node, line, result);
                connected.insert(node.id.clone());
            }
            continue;
        }

        for node in split_group(line.text) {
            if node.id.is_empty() {
                result.error(
                    Some(line.number),
                    format!("unrecognized statement '{}'", line.text),
                );
                continue;
            }
            check_node_ref(&node, line, result);
            if !declared.iter().any(|(id, _)| *id == node.id) {
                declared.push((node.id, line.number));
            }
        }
    }

    if declared.is_empty() && connected.is_empty() {
        result.warning(None, "flowchart has no nodes");
    }
    for (id, number) in declared {
        if !connected.contains(&id) {
            result.warning(
                Some(number),
                format!("node '{id}' is declared but not connected"),
            );
        }
    }
}

fn flowchart_subgraphs(source: &Source<'_>, result: &mut ValidationResult) {
    let mut open = Vec::new();
    for line in &source.lines {
        match keyword(line.text) {
            "subgraph" => open.push(line.number),
            "end" if line.text == "end" => {
                if open.pop().is_none() {
                    result.error(Some(line.number), "'end' without a matching 'subgraph'");
                }
            }
            _ => {}
        }
    }
    for number in open {
        result.error(Some(number), "subgraph is never closed with 'end'");
    }
}

// ---------------------------------------------------------------------------
// sequenceDiagram

fn known_sequence_arrow(arrow: &str) -> bool {
    if SEQ_ARROWS.contains(&arrow) {
        return true;
    }
    // Deactivation marker (`->>-B`) or a participant name starting with `x`.
    arrow
        .strip_suffix('-')
        .or_else(|| arrow.strip_suffix('x'))
        .is_some_and(|base| SEQ_ARROWS.contains(&base))
}

fn sequence_messages(source: &Source<'_>, result: &mut ValidationResult) {
    let mut messages = 0;
    for line in &source.lines {
        let token = keyword(line.text);
        if SEQ_KEYWORDS.contains(&token) || SEQ_BLOCKS.contains(&token) {
            continue;
        }

        let Some(caps) = SEQ_MESSAGE_RE.captures(line.text) else {
            result.warning(
                Some(line.number),
                format!("unrecognized statement '{}'", line.text),
            );
            continue;
        };

        let arrow = &caps["arrow"];
        if !known_sequence_arrow(arrow) {
            result.error(
                Some(line.number),
                format!("unknown arrow '{arrow}' (expected one of {})", SEQ_ARROWS.join(" ")),
            );
            continue;
        }
        let from = caps["from"].trim();
        let to = caps.name("to").map_or("", |m| m.as_str().trim());
        if to.is_empty() {
            result.error(Some(line.number), "message is missing a target participant");
            continue;
        }
        if caps.name("message").is_none() {
            result.error(
                Some(line.number),
                format!("message from '{from}' to '{to}' is missing ': text'"),
            );
            continue;
        }
        messages += 1;
    }

    if messages == 0 {
        result.warning(None, "sequence diagram has no messages");
    }
}

fn sequence_blocks(source: &Source<'_>, result: &mut ValidationResult) {
    let mut open: Vec<(&str, usize)> = Vec::new();
    for line in &source.lines {
        let token = keyword(line.text);
        if SEQ_BLOCKS.contains(&token) {
            open.push((token, line.number));
        } else if line.text == "end" && open.pop().is_none() {
            result.error(Some(line.number), "'end' without an open block");
        }
    }
    for (block, number) in open {
        result.error(Some(number), format!("'{block}' block is never closed with 'end'"));
    }
}

// ---------------------------------------------------------------------------
// classDiagram / stateDiagram

fn check_braces(source: &Source<'_>, result: &mut ValidationResult, what: &str) {
    let mut open = Vec::new();
    for line in &source.lines {
        for ch in line.text.chars() {
            match ch {
                '{' => open.push(line.number),
                '}' if open.pop().is_none() => {
                    result.error(Some(line.number), "unexpected '}'");
                }
                _ => {}
            }
        }
    }
    for number in open {
        result.error(Some(number), format!("unclosed {what} body, missing '}}'"));
    }
}

fn class_braces(source: &Source<'_>, result: &mut ValidationResult) {
    check_braces(source, result, "class");
}

fn state_braces(source: &Source<'_>, result: &mut ValidationResult) {
    check_braces(source, result, "composite state");
}

fn class_declarations(source: &Source<'_>, result: &mut ValidationResult) {
    let mut classes = 0;
    for line in &source.lines {
        if keyword(line.text) == "class" {
            let name = line
                .text
                .split_whitespace()
                .nth(1)
                .map(|n| n.trim_end_matches('{'))
                .unwrap_or_default();
            if name.is_empty() {
                result.error(Some(line.number), "class declaration is missing a name");
                continue;
            }
            classes += 1;
        } else if line.text.contains("--") || line.text.contains("..") || line.text.contains(" : ")
        {
            classes += 1;
        }
    }
    if classes == 0 {
        result.warning(None, "class diagram defines no classes");
    }
}

fn state_transitions(source: &Source<'_>, result: &mut ValidationResult) {
    let mut transitions = 0;
    let mut has_start = false;
    for line in &source.lines {
        let Some((from, rest)) = line.text.split_once("-->") else {
            continue;
        };
        let to = rest.split_once(':').map_or(rest, |(to, _)| to);
        if from.trim().is_empty() || to.trim().is_empty() {
            result.error(Some(line.number), "transition is missing a state");
            continue;
        }
        transitions += 1;
        has_start |= from.trim() == "[*]";
    }
    if transitions == 0 {
        result.warning(None, "state diagram has no transitions");
    } else if !has_start {
        result.warning(None, "state diagram has no start transition from [*]");
    }
}

// ---------------------------------------------------------------------------
// erDiagram

fn er_structure(source: &Source<'_>, result: &mut ValidationResult) {
    let mut entities: HashSet<&str> = HashSet::new();
    let mut block: Option<usize> = None;

    for line in &source.lines {
        if block.is_some() {
            if line.text == "}" {
                block = None;
            } else if line.text.split_whitespace().count() < 2 {
                result.error(
                    Some(line.number),
                    format!("attribute '{}' needs a type and a name", line.text),
                );
            }
            continue;
        }

        if let Some(name) = line.text.strip_suffix('{') {
            entities.insert(name.trim());
            block = Some(line.number);
            continue;
        }
        if line.text == "}" {
            result.error(Some(line.number), "unexpected '}'");
            continue;
        }

        let (relation, label) = match line.text.split_once(':') {
            Some((relation, label)) => (relation, Some(label.trim())),
            None => (line.text, None),
        };
        let tokens: Vec<&str> = relation.split_whitespace().collect();
        if tokens.len() == 1 && label.is_none() {
            entities.insert(tokens[0]);
            continue;
        }
        let [left, cardinality, right] = tokens.as_slice() else {
            result.error(
                Some(line.number),
                format!("malformed relationship '{}'", line.text),
            );
            continue;
        };
        if !ER_CARDINALITY_RE.is_match(cardinality) {
            result.error(
                Some(line.number),
                format!("invalid cardinality '{cardinality}'"),
            );
        }
        if label.is_none_or(|l| l.trim_matches('"').is_empty()) {
            result.error(Some(line.number), "relationship is missing ': label'");
        }
        entities.insert(*left);
        entities.insert(*right);
    }

    if let Some(number) = block {
        result.error(Some(number), "unclosed entity block, missing '}'");
    }
    if entities.is_empty() {
        result.warning(None, "ER diagram defines no entities");
    }
}

// ---------------------------------------------------------------------------
// journey

fn journey_title(source: &Source<'_>, result: &mut ValidationResult) {
    if !source.lines.iter().any(|l| keyword(l.text) == "title") {
        result.warning(None, "journey has no title");
    }
}

fn journey_tasks(source: &Source<'_>, result: &mut ValidationResult) {
    let mut tasks = 0;
    for line in &source.lines {
        if matches!(keyword(line.text), "title" | "section" | "accTitle" | "accDescr") {
            continue;
        }
        let mut parts = line.text.splitn(3, ':');
        let name = parts.next().unwrap_or_default().trim();
        let Some(score) = parts.next().map(str::trim) else {
            result.error(
                Some(line.number),
                format!("task '{name}' is missing ': score'"),
            );
            continue;
        };
        match score.parse::<u8>() {
            Ok(1..=5) => tasks += 1,
            _ => result.error(
                Some(line.number),
                format!("score '{score}' for task '{name}' must be an integer between 1 and 5"),
            ),
        }
    }
    if tasks == 0 {
        result.warning(None, "journey has no tasks");
    }
}

// ---------------------------------------------------------------------------
// gantt

fn gantt_date_format(source: &Source<'_>, result: &mut ValidationResult) {
    if !source.lines.iter().any(|l| keyword(l.text) == "dateFormat") {
        result.error(
            Some(source.header.number),
            "gantt chart is missing a 'dateFormat' line",
        );
    }
}

fn gantt_tasks(source: &Source<'_>, result: &mut ValidationResult) {
    let mut tasks = 0;
    for line in &source.lines {
        if GANTT_KEYWORDS.contains(&keyword(line.text)) {
            continue;
        }
        match line.text.split_once(':') {
            Some((name, timing)) if timing.trim().is_empty() => result.error(
                Some(line.number),
                format!("task '{}' has no timing after ':'", name.trim()),
            ),
            Some(_) => tasks += 1,
            None => result.error(
                Some(line.number),
                format!("task '{}' is missing ': timing'", line.text),
            ),
        }
    }
    if tasks == 0 {
        result.warning(None, "gantt chart has no tasks");
    }
}

// ---------------------------------------------------------------------------
// pie

fn pie_title(source: &Source<'_>, result: &mut ValidationResult) {
    let on_header = source.header.text.split_whitespace().any(|t| t == "title");
    if !on_header && !source.lines.iter().any(|l| keyword(l.text) == "title") {
        result.warning(None, "pie chart has no title");
    }
}

fn pie_entries(source: &Source<'_>, result: &mut ValidationResult) {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut entries = 0;

    for line in &source.lines {
        if matches!(
            keyword(line.text),
            "title" | "showData" | "accTitle" | "accDescr"
        ) {
            continue;
        }
        let Some(caps) = PIE_ENTRY_RE.captures(line.text) else {
            result.error(
                Some(line.number),
                format!("invalid pie entry '{}' (expected \"label\" : value)", line.text),
            );
            continue;
        };
        entries += 1;

        let label = caps.name("label").map_or("", |m| m.as_str());
        let value = caps["value"].trim();
        match value.parse::<f64>() {
            Ok(v) if v.is_finite() && v >= 0.0 => {}
            _ => result.error(
                Some(line.number),
                format!("invalid value '{value}' for slice \"{label}\" (expected a non-negative number)"),
            ),
        }
        if let Some(first) = seen.insert(label, line.number) {
            result.warning(
                Some(line.number),
                format!("duplicate label \"{label}\" (first used on line {first})"),
            );
        }
    }

    if entries == 0 {
        result.error(Some(source.header.number), "pie chart has no data entries");
    }
}

// ---------------------------------------------------------------------------
// quadrantChart

fn quadrant_axes(source: &Source<'_>, result: &mut ValidationResult) {
    let has = |name: &str| source.lines.iter().any(|l| keyword(l.text) == name);
    if !has("x-axis") {
        result.error(Some(source.header.number), "quadrant chart is missing an 'x-axis' line");
    }
    if !has("y-axis") {
        result.error(Some(source.header.number), "quadrant chart is missing a 'y-axis' line");
    }
    if !has("title") {
        result.warning(None, "quadrant chart has no title");
    }
    let missing: Vec<&str> = ["quadrant-1", "quadrant-2", "quadrant-3", "quadrant-4"]
        .into_iter()
        .filter(|q| !has(*q))
        .collect();
    if !missing.is_empty() {
        result.warning(
            None,
            format!("quadrant labels missing: {}", missing.join(", ")),
        );
    }
}

fn quadrant_points(source: &Source<'_>, result: &mut ValidationResult) {
    let mut points = 0;
    for line in &source.lines {
        if QUADRANT_KEYWORDS.contains(&keyword(line.text)) {
            continue;
        }
        let Some(caps) = QUADRANT_POINT_RE.captures(line.text) else {
            result.error(
                Some(line.number),
                format!("invalid point '{}' (expected Name: [x, y])", line.text),
            );
            continue;
        };
        let name = caps["name"].trim();
        let coords = [caps["x"].trim(), caps["y"].trim()];
        let in_range = coords
            .iter()
            .all(|c| c.parse::<f64>().is_ok_and(|v| (0.0..=1.0).contains(&v)));
        if in_range {
            points += 1;
        } else {
            result.error(
                Some(line.number),
                format!(
                    "point '{name}' coordinates [{}, {}] must be numbers between 0 and 1",
                    coords[0], coords[1]
                ),
            );
        }
    }
    if points == 0 {
        result.warning(None, "quadrant chart has no data points");
    }
}

// ---------------------------------------------------------------------------
// gitGraph

fn git_commands(source: &Source<'_>, result: &mut ValidationResult) {
    let mut branches: HashSet<String> = HashSet::from(["main".to_string()]);
    let mut current = "main".to_string();
    let mut commits = 0;

    for line in &source.lines {
        let mut tokens = line.text.split_whitespace();
        let command = tokens.next().unwrap_or_default();
        let name = tokens.next().map(|n| n.trim_matches('"').to_string());

        match command {
            "commit" => commits += 1,
            "branch" | "checkout" | "switch" | "merge" => {
                let Some(name) = name else {
                    result.error(
                        Some(line.number),
                        format!("'{command}' needs a branch name"),
                    );
                    continue;
                };
                match command {
                    "branch" => {
                        if !branches.insert(name.clone()) {
                            result.error(
                                Some(line.number),
                                format!("branch '{name}' already exists"),
                            );
                        }
                        current = name;
                    }
                    "merge" => {
                        if !branches.contains(&name) {
                            result.error(
                                Some(line.number),
                                format!("cannot merge unknown branch '{name}'"),
                            );
                        } else if name == current {
                            result.error(
                                Some(line.number),
                                format!("cannot merge branch '{name}' into itself"),
                            );
                        } else {
                            commits += 1;
                        }
                    }
                    _ => {
                        if branches.contains(&name) {
                            current = name;
                        } else {
                            result.error(
                                Some(line.number),
                                format!("cannot checkout unknown branch '{name}'"),
                            );
                        }
                    }
                }
            }
            "cherry-pick" => {
                if !line.text.contains("id:") {
                    result.error(Some(line.number), "'cherry-pick' needs an id: \"...\"");
                }
            }
            other => result.error(
                Some(line.number),
                format!("unknown gitGraph command '{other}'"),
            ),
        }
    }

    if commits == 0 {
        result.warning(None, "gitGraph has no commits");
    }
}

// ---------------------------------------------------------------------------
// mindmap

fn mindmap_root(source: &Source<'_>, result: &mut ValidationResult) {
    let mut nodes = source
        .lines
        .iter()
        .filter(|l| !l.text.starts_with("::icon(") && !l.text.starts_with(":::"));
    let Some(root) = nodes.next() else {
        result.error(Some(source.header.number), "mindmap has no root node");
        return;
    };
    for line in nodes {
        if line.indent <= root.indent {
            result.error(
                Some(line.number),
                format!(
                    "multiple root nodes: '{}' is not indented under '{}'",
                    line.text, root.text
                ),
            );
        }
    }
}
