//! Compiled path matching.
//!
//! # Responsibilities
//! - Lower a `PathTemplate` into a flat op sequence at startup
//! - Tokenize request paths once per request
//! - Match tokens against a compiled template and extract bindings
//!
//! # Design Decisions
//! - Segment count must match exactly unless the template ends in a
//!   multi segment
//! - Captures never bind an empty single segment: `/echo/` does not match
//!   `/echo/{id}`
//! - No regex, no backtracking: O(path length) per template

use std::borrow::Cow;

use crate::error::GatewayError;
use crate::routing::template::{PathTemplate, Segment};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    /// Compare with `literals[idx]`.
    Literal(usize),
    /// Bind one segment to `names[idx]`.
    Capture(usize),
    /// Consume one non-empty segment.
    Skip,
    /// Bind the remainder to `names[idx]`.
    CaptureRest(usize),
    /// Consume the remainder.
    SkipRest,
}

/// Name → raw value bindings produced by a successful match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestBindings {
    values: Vec<(String, String)>,
}

impl RequestBindings {
    /// Look up a capture by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate bindings in template order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn push(&mut self, name: &str, value: String) {
        self.values.push((name.to_string(), value));
    }
}

/// A request path split into percent-decoded segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTokens {
    segments: Vec<String>,
}

impl PathTokens {
    /// Tokenize a request path. Returns `None` for paths that cannot match
    /// any template (no leading `/`, invalid UTF-8 after decoding).
    pub fn parse(path: &str) -> Option<Self> {
        let rest = path.strip_prefix('/')?;
        if rest.is_empty() {
            return Some(Self { segments: Vec::new() });
        }
        let segments = rest
            .split('/')
            .map(|raw| urlencoding::decode(raw).ok().map(Cow::into_owned))
            .collect::<Option<Vec<_>>>()?;
        Some(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

/// A template compiled into a flat op sequence.
#[derive(Debug, Clone)]
pub struct CompiledMatcher {
    template: PathTemplate,
    ops: Vec<Op>,
    literals: Vec<String>,
    names: Vec<String>,
    verb_suffix: Option<String>,
}

impl CompiledMatcher {
    /// Parse and compile a pattern.
    pub fn compile(pattern: &str) -> Result<Self, GatewayError> {
        Ok(Self::from_template(PathTemplate::parse(pattern)?))
    }

    /// Compile an already parsed template.
    pub fn from_template(template: PathTemplate) -> Self {
        let mut ops = Vec::with_capacity(template.segments().len());
        let mut literals = Vec::new();
        let mut names = Vec::new();

        for segment in template.segments() {
            let op = match segment {
                Segment::Literal(lit) => {
                    literals.push(lit.clone());
                    Op::Literal(literals.len() - 1)
                }
                Segment::Capture(name) => {
                    names.push(name.clone());
                    Op::Capture(names.len() - 1)
                }
                Segment::MultiCapture(name) => {
                    names.push(name.clone());
                    Op::CaptureRest(names.len() - 1)
                }
                Segment::Wildcard => Op::Skip,
                Segment::MultiWildcard => Op::SkipRest,
            };
            ops.push(op);
        }

        let verb_suffix = template.verb().map(|v| format!(":{v}"));
        Self {
            template,
            ops,
            literals,
            names,
            verb_suffix,
        }
    }

    pub fn template(&self) -> &PathTemplate {
        &self.template
    }

    /// Capture names in template order.
    pub fn capture_names(&self) -> &[String] {
        &self.names
    }

    /// Tokenize and match a raw request path.
    pub fn matches(&self, path: &str) -> Option<RequestBindings> {
        self.match_tokens(&PathTokens::parse(path)?)
    }

    /// Match pre-tokenized path segments.
    pub fn match_tokens(&self, tokens: &PathTokens) -> Option<RequestBindings> {
        let mut segments: Vec<&str> = tokens.segments().iter().map(String::as_str).collect();

        if let Some(suffix) = &self.verb_suffix {
            let last = segments.pop()?;
            let stripped = last.strip_suffix(suffix.as_str())?;
            // `/v1:verb` leaves nothing to push back.
            if !(stripped.is_empty() && self.ops.is_empty()) {
                segments.push(stripped);
            }
        }

        let mut bindings = RequestBindings::default();
        let mut pos = 0usize;

        for op in &self.ops {
            match *op {
                Op::Literal(idx) => {
                    if *segments.get(pos)? != self.literals[idx] {
                        return None;
                    }
                    pos += 1;
                }
                Op::Capture(idx) => {
                    let value = segments.get(pos).filter(|s| !s.is_empty())?;
                    bindings.push(&self.names[idx], (*value).to_string());
                    pos += 1;
                }
                Op::Skip => {
                    segments.get(pos).filter(|s| !s.is_empty())?;
                    pos += 1;
                }
                Op::CaptureRest(idx) => {
                    let rest = segments.get(pos..).unwrap_or_default().join("/");
                    bindings.push(&self.names[idx], rest);
                    pos = segments.len();
                }
                Op::SkipRest => pos = segments.len(),
            }
        }

        (pos == segments.len()).then_some(bindings)
    }
}
