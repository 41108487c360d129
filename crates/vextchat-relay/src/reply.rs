// Reply extraction: an ordered list of extractors tried against the parsed
// success body. The first one that yields a value wins.

use serde_json::Value;

/// One step of the extraction policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyExtractor {
    /// Top-level object field with a truthy value.
    Field(String),
    /// Render the entire body. Always yields.
    WholeBody,
}

impl ReplyExtractor {
    fn extract(&self, body: &Value) -> Option<String> {
        match self {
            ReplyExtractor::Field(name) => body.as_object()?.get(name).and_then(render_truthy),
            ReplyExtractor::WholeBody => Some(render_whole(body)),
        }
    }
}

/// Ordered extractor list. `WholeBody` is implicitly appended if absent so
/// extraction always produces text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyPolicy {
    extractors: Vec<ReplyExtractor>,
}

impl Default for ReplyPolicy {
    /// `response`, then `message`, then `text`, then the whole body.
    fn default() -> Self {
        Self::from_fields(["response", "message", "text"])
    }
}

impl ReplyPolicy {
    pub fn new(mut extractors: Vec<ReplyExtractor>) -> Self {
        if extractors.last() != Some(&ReplyExtractor::WholeBody) {
            extractors.retain(|e| *e != ReplyExtractor::WholeBody);
            extractors.push(ReplyExtractor::WholeBody);
        }
        ReplyPolicy { extractors }
    }

    /// Try the named fields in order, then fall back to the whole body.
    pub fn from_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            fields
                .into_iter()
                .map(|f| ReplyExtractor::Field(f.into()))
                .collect(),
        )
    }

    pub fn extractors(&self) -> &[ReplyExtractor] {
        &self.extractors
    }

    /// Apply the policy to an already-parsed body.
    pub fn extract(&self, body: &Value) -> String {
        self.extractors
            .iter()
            .find_map(|e| e.extract(body))
            .unwrap_or_else(|| render_whole(body))
    }
}

/// Render a value if it is truthy: non-empty strings verbatim, `true` and
/// numbers as text, non-empty containers as compact JSON.
pub(crate) fn render_truthy(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(false) => None,
        Value::Bool(true) => Some("true".to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(a) if a.is_empty() => None,
        Value::Object(o) if o.is_empty() => None,
        other => Some(other.to_string()),
    }
}

fn render_whole(body: &Value) -> String {
    match body {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
