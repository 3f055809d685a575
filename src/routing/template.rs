//! Path template parsing.
//!
//! # Responsibilities
//! - Parse declarative patterns (`/v1/example/echo/{id}`) into segments
//! - Reject malformed syntax at startup
//!
//! # Grammar
//! ```text
//! Template = "/" [ Segments ] [ ":" Verb ]
//! Segments = Segment { "/" Segment }
//! Segment  = "*" | "**" | LITERAL | "{" Name [ "=" ( "*" | "**" ) ] "}"
//! Name     = IDENT { "." IDENT }
//! ```
//!
//! # Design Decisions
//! - At most one multi segment (`**` or `{name=**}`), and only in last position,
//!   so matching never backtracks
//! - Capture names are unique within a template

use std::collections::HashSet;
use std::fmt;

use crate::error::GatewayError;

/// One parsed segment of a path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Exact string match.
    Literal(String),
    /// `{name}` or `{name=*}`: exactly one segment, bound to `name`.
    Capture(String),
    /// `{name=**}`: the rest of the path, bound to `name`.
    MultiCapture(String),
    /// `*`: exactly one segment, unbound.
    Wildcard,
    /// `**`: the rest of the path, unbound.
    MultiWildcard,
}

impl Segment {
    fn is_multi(&self) -> bool {
        matches!(self, Segment::MultiCapture(_) | Segment::MultiWildcard)
    }

    /// Capture name, if this segment binds a value.
    pub fn capture_name(&self) -> Option<&str> {
        match self {
            Segment::Capture(name) | Segment::MultiCapture(name) => Some(name),
            _ => None,
        }
    }
}

/// A parsed, validated path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    pattern: String,
    segments: Vec<Segment>,
    verb: Option<String>,
}

impl PathTemplate {
    /// Parse a pattern, failing with `MalformedPattern` on invalid syntax.
    pub fn parse(pattern: &str) -> Result<Self, GatewayError> {
        let malformed = |reason: &str| GatewayError::MalformedPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        let rest = pattern
            .strip_prefix('/')
            .ok_or_else(|| malformed("must start with '/'"))?;

        let (body, verb) = split_verb(rest).map_err(|reason| malformed(reason))?;

        let mut segments = Vec::new();
        if !body.is_empty() {
            for raw in split_segments(body).map_err(|reason| malformed(reason))? {
                segments.push(parse_segment(raw).map_err(|reason| malformed(&reason))?);
            }
        }

        let mut names = HashSet::new();
        for (i, segment) in segments.iter().enumerate() {
            if segment.is_multi() && i + 1 != segments.len() {
                return Err(malformed("multi-segment match must be the final segment"));
            }
            if let Some(name) = segment.capture_name() {
                if !names.insert(name) {
                    return Err(malformed(&format!("duplicate capture name {name:?}")));
                }
            }
        }

        Ok(Self {
            pattern: pattern.to_string(),
            segments,
            verb,
        })
    }

    /// The original pattern string.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Parsed segments in order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Custom verb suffix (`/v1/{name}:cancel` → `cancel`).
    pub fn verb(&self) -> Option<&str> {
        self.verb.as_deref()
    }

    /// Capture names in template order.
    pub fn capture_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(Segment::capture_name)
    }

    /// Canonical form used to detect duplicate registrations.
    ///
    /// Capture names are erased, so `/a/{x}` and `/a/{y}` are the same shape.
    pub fn shape(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            out.push('/');
            match segment {
                Segment::Literal(lit) => out.push_str(lit),
                Segment::Capture(_) | Segment::Wildcard => out.push('*'),
                Segment::MultiCapture(_) | Segment::MultiWildcard => out.push_str("**"),
            }
        }
        if let Some(verb) = &self.verb {
            out.push(':');
            out.push_str(verb);
        }
        out
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

/// Split off a `:verb` suffix that sits outside any braces in the last segment.
fn split_verb(rest: &str) -> Result<(&str, Option<String>), &'static str> {
    let mut depth = 0usize;
    let mut colon = None;
    for (i, c) in rest.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            '/' if depth == 0 => colon = None,
            ':' if depth == 0 => colon = Some(i),
            _ => {}
        }
    }
    match colon {
        Some(i) => {
            let verb = &rest[i + 1..];
            if verb.is_empty() {
                return Err("empty verb");
            }
            Ok((&rest[..i], Some(verb.to_string())))
        }
        None => Ok((rest, None)),
    }
}

/// Split on `/` outside braces, checking brace balance.
fn split_segments(body: &str) -> Result<Vec<&str>, &'static str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in body.char_indices() {
        match c {
            '{' => {
                if depth > 0 {
                    return Err("nested braces");
                }
                depth += 1;
            }
            '}' => {
                if depth == 0 {
                    return Err("unbalanced braces");
                }
                depth -= 1;
            }
            '/' if depth == 0 => {
                out.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err("unbalanced braces");
    }
    out.push(&body[start..]);
    if out.iter().any(|s| s.is_empty()) {
        return Err("empty segment");
    }
    Ok(out)
}

fn parse_segment(raw: &str) -> Result<Segment, String> {
    match raw {
        "*" => return Ok(Segment::Wildcard),
        "**" => return Ok(Segment::MultiWildcard),
        _ => {}
    }

    if let Some(inner) = raw.strip_prefix('{') {
        let inner = inner
            .strip_suffix('}')
            .ok_or_else(|| format!("segment {raw:?} has trailing characters after '}}'"))?;
        let (name, sub) = match inner.split_once('=') {
            Some((name, sub)) => (name, Some(sub)),
            None => (inner, None),
        };
        validate_name(name)?;
        return match sub {
            None | Some("*") => Ok(Segment::Capture(name.to_string())),
            Some("**") => Ok(Segment::MultiCapture(name.to_string())),
            Some(other) => Err(format!("unsupported capture pattern {other:?}")),
        };
    }

    if raw.contains(['{', '}', '*']) {
        return Err(format!("invalid literal segment {raw:?}"));
    }
    Ok(Segment::Literal(raw.to_string()))
}

fn validate_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("empty capture name".to_string());
    }
    for part in name.split('.') {
        let mut chars = part.chars();
        let valid = match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        };
        if !valid {
            return Err(format!("invalid capture name {name:?}"));
        }
    }
    Ok(())
}
