//! Path and query parameter binding.
//!
//! # Responsibilities
//! - Coerce captured path values into typed request fields
//! - Apply query parameters to fields not claimed by the path or body
//! - Merge the bound fields with a decoded body into one request value
//!
//! # Design Decisions
//! - The exclusion filter is computed once per route at registration
//! - Path values always win over query values and body values
//! - Unknown query keys are ignored; for scalar fields the last value wins

use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::binding::schema::{find_field, FieldDescriptor};
use crate::error::GatewayError;
use crate::routing::matcher::RequestBindings;

/// Where the HTTP body lands in the request message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BodyRule {
    /// The route carries no body.
    #[default]
    None,
    /// The whole body is the request message (`body: "*"`).
    Whole,
    /// The body is decoded into a single field.
    Field(String),
}

/// Set of field paths query parameters may not touch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryFilter {
    excluded: HashSet<String>,
    all: bool,
}

impl QueryFilter {
    /// Build the filter for a route from its captures and body rule.
    pub fn for_route<'a>(captures: impl IntoIterator<Item = &'a str>, body: &BodyRule) -> Self {
        let mut excluded: HashSet<String> = captures.into_iter().map(str::to_string).collect();
        let all = match body {
            BodyRule::Whole => true,
            BodyRule::Field(field) => {
                excluded.insert(field.clone());
                false
            }
            BodyRule::None => false,
        };
        Self { excluded, all }
    }

    /// True if `field` or any parent of it is excluded.
    pub fn excludes(&self, field: &str) -> bool {
        if self.all {
            return true;
        }
        if self.excluded.contains(field) {
            return true;
        }
        field
            .match_indices('.')
            .any(|(i, _)| self.excluded.contains(&field[..i]))
    }

    /// True if no query parameter can ever be bound.
    pub fn excludes_all(&self) -> bool {
        self.all
    }
}

/// Fields bound from the URL, as a JSON object tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundFields {
    fields: Map<String, Value>,
}

impl BoundFields {
    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.fields.get(parts.next()?)?;
        for part in parts {
            current = current.get(part)?;
        }
        Some(current)
    }
}

/// Per-route binder, precomputed at registration.
#[derive(Debug, Clone)]
pub struct ParamBinder {
    captures: Vec<FieldDescriptor>,
    schema: &'static [FieldDescriptor],
    filter: QueryFilter,
    body: BodyRule,
}

impl ParamBinder {
    /// Build a binder, checking that every capture and the body field name a
    /// field of the request message.
    pub fn new(
        pattern: &str,
        captures: &[String],
        schema: &'static [FieldDescriptor],
        body: BodyRule,
    ) -> Result<Self, GatewayError> {
        let malformed = |reason: String| GatewayError::MalformedPattern {
            pattern: pattern.to_string(),
            reason,
        };

        let mut bound = Vec::with_capacity(captures.len());
        for name in captures {
            let field = find_field(schema, name)
                .ok_or_else(|| malformed(format!("capture {name:?} names no request field")))?;
            bound.push(field);
        }

        if let BodyRule::Field(field) = &body {
            if captures.iter().any(|c| c == field) {
                return Err(malformed(format!("body field {field:?} is also a path capture")));
            }
        }

        let filter = QueryFilter::for_route(captures.iter().map(String::as_str), &body);
        Ok(Self {
            captures: bound,
            schema,
            filter,
            body,
        })
    }

    pub fn body_rule(&self) -> &BodyRule {
        &self.body
    }

    pub fn filter(&self) -> &QueryFilter {
        &self.filter
    }

    /// Bind path captures, then query parameters.
    pub fn bind(
        &self,
        bindings: &RequestBindings,
        query: Option<&str>,
    ) -> Result<BoundFields, GatewayError> {
        let mut fields = Map::new();

        for field in &self.captures {
            let raw = bindings
                .get(field.name)
                .ok_or_else(|| GatewayError::MissingParameter {
                    name: field.name.to_string(),
                })?;
            let value = coerce(field, raw)?;
            let value = if field.repeated {
                Value::Array(vec![value])
            } else {
                value
            };
            set_path(&mut fields, field.name, value);
        }

        if let Some(query) = query.filter(|_| !self.filter.excludes_all()) {
            for (key, values) in group_query(query) {
                if self.filter.excludes(&key) {
                    tracing::trace!(parameter = %key, "Query parameter shadowed by path or body");
                    continue;
                }
                let Some(field) = find_field(self.schema, &key) else {
                    tracing::debug!(parameter = %key, "Ignoring unknown query parameter");
                    continue;
                };
                if field.repeated {
                    let items = values
                        .iter()
                        .map(|raw| coerce(&field, raw))
                        .collect::<Result<Vec<_>, _>>()?;
                    set_path(&mut fields, field.name, Value::Array(items));
                } else if let Some(raw) = values.last() {
                    // Last value wins for scalars.
                    set_path(&mut fields, field.name, coerce(&field, raw)?);
                }
            }
        }

        Ok(BoundFields { fields })
    }

    /// Combine bound fields with the decoded body into the request value.
    pub fn assemble(&self, bound: BoundFields, body: Option<Value>) -> Result<Value, GatewayError> {
        match (&self.body, body) {
            (BodyRule::Whole, Some(Value::Object(mut base))) => {
                merge_objects(&mut base, bound.fields);
                Ok(Value::Object(base))
            }
            (BodyRule::Whole, Some(Value::Null)) | (_, None) => Ok(bound.into_value()),
            (BodyRule::Whole, Some(other)) => Err(GatewayError::MalformedBody(format!(
                "expected a JSON object, got {}",
                type_name(&other)
            ))),
            (BodyRule::Field(field), Some(value)) => {
                let mut fields = bound.fields;
                set_path(&mut fields, field, value);
                Ok(Value::Object(fields))
            }
            (BodyRule::None, Some(_)) => Ok(bound.into_value()),
        }
    }
}

fn coerce(field: &FieldDescriptor, raw: &str) -> Result<Value, GatewayError> {
    field.kind.parse(raw).map_err(|cause| GatewayError::TypeMismatch {
        field: field.name.to_string(),
        value: raw.to_string(),
        cause,
    })
}

/// Group `k=v` pairs by key, keeping first-seen key order and value order.
fn group_query(query: &str) -> IndexMap<String, Vec<String>> {
    let mut grouped: IndexMap<String, Vec<String>> = IndexMap::new();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        grouped
            .entry(key.into_owned())
            .or_default()
            .push(value.into_owned());
    }
    grouped
}

/// Set a dotted path inside a JSON object, creating parents as needed.
pub(crate) fn set_path(root: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            root.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = root
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(map) = child {
                set_path(map, rest, value);
            }
        }
    }
}

/// Deep-merge `overlay` into `base`; overlay wins on conflicts.
fn merge_objects(base: &mut Map<String, Value>, overlay: Map<String, Value>) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_objects(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
