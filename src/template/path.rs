//! Template paths address values inside the JSON payload.
//!
//! Grammar:
//!
//! ```text
//! path    := segment ("." segment)*
//! segment := key ("[" index "]")*  |  index
//! key     := one or more chars other than '.', '[' and ']'
//! index   := decimal digits
//! ```
//!
//! A bare numeric segment (`reviewers.0.name`) indexes arrays as well as
//! `reviewers[0].name` does. Anything that does not resolve yields `None`;
//! callers render that as empty text.

use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment<'a> {
    Key(&'a str),
    Index(usize),
}

/// Parse a path into segments. Returns `None` for malformed paths
/// (empty segments, unbalanced brackets, non-numeric indices).
pub fn parse(path: &str) -> Option<Vec<Segment<'_>>> {
    let path = path.trim();
    if path.is_empty() {
        return None;
    }
    let mut segments = Vec::new();
    for part in path.split('.') {
        let (key, mut rest) = match part.find('[') {
            Some(i) => (&part[..i], &part[i..]),
            None => (part, ""),
        };
        if key.contains(']') {
            return None;
        }
        if key.is_empty() {
            if rest.is_empty() {
                return None;
            }
        } else {
            segments.push(Segment::Key(key));
        }
        while !rest.is_empty() {
            let close = rest.find(']')?;
            if !rest.starts_with('[') {
                return None;
            }
            let idx: usize = rest[1..close].parse().ok()?;
            segments.push(Segment::Index(idx));
            rest = &rest[close + 1..];
        }
    }
    Some(segments)
}

/// Resolve `path` against `root`.
pub fn lookup<'v>(root: &'v Value, path: &str) -> Option<&'v Value> {
    let segments = parse(path)?;
    let mut current = root;
    for seg in segments {
        current = match (seg, current) {
            (Segment::Key(k), Value::Object(map)) => map.get(k)?,
            (Segment::Key(k), Value::Array(arr)) => arr.get(k.parse::<usize>().ok()?)?,
            (Segment::Index(i), Value::Array(arr)) => arr.get(i)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Render a resolved value as cell text. Null, objects and unresolved
/// values become empty; arrays of scalars are joined with ", ".
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null | Value::Object(_) => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .filter(|v| !matches!(v, Value::Array(_) | Value::Object(_)))
            .map(value_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
    }
}

/// True when `text` contains at least one `{{...}}` placeholder.
pub fn has_placeholder(text: &str) -> bool {
    text.find("{{")
        .is_some_and(|open| text[open + 2..].contains("}}"))
}

/// True when the whole of `text` is a single placeholder.
pub fn is_placeholder(text: &str) -> bool {
    let t = text.trim();
    t.starts_with("{{") && t.ends_with("}}") && t[2..].find("{{").is_none()
}

/// A stack of values searched innermost-first. Dynamic rows push their data
/// entry over the payload; footers push page and stamp variables.
#[derive(Clone, Debug)]
pub struct Scope<'a> {
    layers: Vec<&'a Value>,
    index: Option<usize>,
}

impl<'a> Scope<'a> {
    pub fn new(root: &'a Value) -> Self {
        Self {
            layers: vec![root],
            index: None,
        }
    }

    /// A scope with nothing in it: every path resolves to empty text.
    pub fn empty() -> Self {
        Self {
            layers: Vec::new(),
            index: None,
        }
    }

    pub fn with_layer(&self, layer: &'a Value) -> Self {
        let mut layers = Vec::with_capacity(self.layers.len() + 1);
        layers.push(layer);
        layers.extend(self.layers.iter().copied());
        Self {
            layers,
            index: self.index,
        }
    }

    /// Attach a 1-based row number, reachable through the `$index` path.
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    pub fn resolve(&self, path: &str) -> Option<&'a Value> {
        self.layers.iter().find_map(|layer| lookup(layer, path))
    }

    /// Resolve a path to display text. Missing values and values that are
    /// themselves still placeholders render as empty.
    pub fn text(&self, path: &str) -> String {
        if path.trim() == "$index" {
            return self.index.map(|i| i.to_string()).unwrap_or_default();
        }
        let text = self.resolve(path).map(value_text).unwrap_or_default();
        if is_placeholder(&text) {
            String::new()
        } else {
            text
        }
    }

    /// Replace every `{{path}}` in `template` with its resolved text.
    pub fn interpolate(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(open) = rest.find("{{") {
            let Some(close) = rest[open + 2..].find("}}") else {
                break;
            };
            out.push_str(&rest[..open]);
            out.push_str(&self.text(&rest[open + 2..open + 2 + close]));
            rest = &rest[open + 2 + close + 2..];
        }
        out.push_str(rest);
        out
    }
}
