//! Flowchart statement lexing shared by the parser and the validator.
//!
//! Statements are split on link tokens that sit outside node brackets and
//! quoted labels, so `A[a --> b] --> B` yields a single link.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::types::{ArrowType, NodeShape};

static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<link>-\.+->|-\.+-|={2,}>|={3,}|-{2,}>|-{3,}|~{3,})\s*(?:\|(?P<label>[^|]*)\|)?")
        .expect("link regex")
});

// `A -- text --> B` and `A-- text -->B` labels, rewritten to the pipe form before splitting.
static TEXT_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<pre>^|[\s\w\])}])(?P<open>--|-\.|==)\s+(?P<text>[^|>\-=.][^|>]*?)\s*(?P<close>-{2,}>|-{3,}|\.-+>|\.-+|={2,}>|={3,})")
        .expect("text label regex")
});

static VALID_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("id regex"));

static INVALID_ID_CHARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]").expect("id char regex"));

/// A node reference as written in a statement: `id`, `id[label]`, `id:::cls`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRef {
    pub id: String,
    pub shape: Option<(NodeShape, String)>,
    pub class: Option<String>,
    /// Trailing text after the id that did not match any known shape.
    pub unparsed: Option<String>,
}

/// A link between two endpoint groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub arrow: ArrowType,
    pub token: String,
    pub label: Option<String>,
}

/// A chained connection statement: `groups[i] --links[i]--> groups[i + 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    pub groups: Vec<Vec<NodeRef>>,
    pub links: Vec<Link>,
}

/// Returns true when `id` uses only ASCII letters, digits and underscores.
pub fn is_valid_id(id: &str) -> bool {
    VALID_ID_RE.is_match(id)
}

/// Coerce an arbitrary string into a Mermaid-safe node id.
///
/// Ids that are already valid, including all-digit ones, come back unchanged,
/// so the parser and the builder agree on every id.
pub fn sanitize_id(raw: &str) -> String {
    let raw = raw.trim();
    if is_valid_id(raw) {
        return raw.to_string();
    }
    let mut id = INVALID_ID_CHARS_RE.replace_all(raw, "_").into_owned();
    if id.is_empty() {
        id.push_str("node");
    }
    id
}

/// Quote a label when it contains characters Mermaid treats as delimiters.
pub fn quote_label(label: &str) -> String {
    let needs_quotes = label
        .chars()
        .any(|c| matches!(c, '[' | ']' | '(' | ')' | '{' | '}' | '<' | '>' | '|' | '"'))
        || label.starts_with(' ')
        || label.ends_with(' ');
    if needs_quotes {
        format!("\"{}\"", label.replace('"', "#quot;"))
    } else {
        label.to_string()
    }
}

fn unquote_label(label: &str) -> String {
    let trimmed = label.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].replace("#quot;", "\"")
    } else {
        trimmed.to_string()
    }
}

/// Render a node declaration such as `id([label])`.
pub fn node_declaration(id: &str, label: &str, shape: NodeShape) -> String {
    let (open, close) = shape.delimiters();
    format!("{id}{open}{}{close}", quote_label(label))
}

/// Parse a single node reference.
pub fn parse_node_ref(text: &str) -> NodeRef {
    let text = text.trim().trim_end_matches(';').trim();
    let (body, class) = match text.rsplit_once(":::") {
        Some((body, class))
            if !class.is_empty() && !class.contains(|c: char| c.is_whitespace() || "[](){}".contains(c)) =>
        {
            (body.trim(), Some(class.to_string()))
        }
        _ => (text, None),
    };

    let split = body.find(['[', '(', '{', '>']).unwrap_or(body.len());
    let id = body[..split].trim().to_string();
    let rest = body[split..].trim();
    if rest.is_empty() {
        return NodeRef {
            id,
            shape: None,
            class,
            unparsed: None,
        };
    }
    match parse_shape(rest) {
        Some(shape) => NodeRef {
            id,
            shape: Some(shape),
            class,
            unparsed: None,
        },
        None => NodeRef {
            id,
            shape: None,
            class,
            unparsed: Some(rest.to_string()),
        },
    }
}

fn parse_shape(text: &str) -> Option<(NodeShape, String)> {
    NodeShape::ALL
        .into_iter()
        .filter(|shape| {
            let (open, close) = shape.delimiters();
            text.len() >= open.len() + close.len()
                && text.starts_with(open)
                && text.ends_with(close)
        })
        .max_by_key(|shape| {
            let (open, close) = shape.delimiters();
            open.len() + close.len()
        })
        .map(|shape| {
            let (open, close) = shape.delimiters();
            (shape, unquote_label(&text[open.len()..text.len() - close.len()]))
        })
}

fn normalize_text_labels(line: &str) -> String {
    TEXT_LABEL_RE
        .replace_all(line, |caps: &Captures<'_>| {
            let head = caps["close"].ends_with('>');
            let arrow = match (&caps["open"], head) {
                ("-.", true) => ArrowType::DottedArrow,
                ("-.", false) => ArrowType::DottedOpen,
                ("==", true) => ArrowType::ThickArrow,
                ("==", false) => ArrowType::ThickOpen,
                (_, true) => ArrowType::Arrow,
                (_, false) => ArrowType::Open,
            };
            format!("{}{}|{}|", &caps["pre"], arrow.token(), caps["text"].trim())
        })
        .into_owned()
}

/// Byte offsets that sit at bracket depth zero and outside quotes.
fn top_level_mask(line: &str) -> Vec<bool> {
    let mut mask = vec![false; line.len() + 1];
    let mut depth = 0usize;
    let mut in_quotes = false;
    for (idx, ch) in line.char_indices() {
        let top = depth == 0 && !in_quotes;
        match ch {
            '"' => in_quotes = !in_quotes,
            '[' | '(' | '{' if !in_quotes => depth += 1,
            ']' | ')' | '}' if !in_quotes => depth = depth.saturating_sub(1),
            _ => {}
        }
        mask[idx] = top;
    }
    mask[line.len()] = depth == 0 && !in_quotes;
    mask
}

/// Split an `&`-joined endpoint group into node references.
pub fn split_group(text: &str) -> Vec<NodeRef> {
    let mask = top_level_mask(text);
    let mut refs = Vec::new();
    let mut start = 0;
    for (idx, ch) in text.char_indices() {
        if ch == '&' && mask[idx] {
            refs.push(parse_node_ref(&text[start..idx]));
            start = idx + 1;
        }
    }
    refs.push(parse_node_ref(&text[start..]));
    refs
}

/// Split a connection statement into endpoint groups and links.
///
/// Returns `None` when the statement contains no top-level link token.
pub fn split_chain(line: &str) -> Option<Chain> {
    let line = normalize_text_labels(line.trim().trim_end_matches(';'));
    let mask = top_level_mask(&line);
    let mut groups = Vec::new();
    let mut links = Vec::new();
    let mut cursor = 0;

    for caps in LINK_RE.captures_iter(&line) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if whole.start() < cursor || !mask[whole.start()] {
            continue;
        }
        let token = &caps["link"];
        let Some(arrow) = ArrowType::from_link_token(token) else {
            continue;
        };
        groups.push(split_group(&line[cursor..whole.start()]));
        links.push(Link {
            arrow,
            token: token.to_string(),
            label: caps
                .name("label")
                .map(|m| m.as_str().trim().to_string())
                .filter(|label| !label.is_empty()),
        });
        cursor = whole.end();
    }

    if links.is_empty() {
        return None;
    }
    groups.push(split_group(&line[cursor..]));
    Some(Chain { groups, links })
}
