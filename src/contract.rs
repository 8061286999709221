//! OpenAPI contract used to check traffic on the `/data` routes.
//!
//! The contract is kept as plain JSON so that a document loaded from disk
//! and the one generated from [`ApiDoc`] are handled the same way. Only
//! the subset of JSON Schema the service's own schemas use is enforced;
//! unknown keywords are ignored.

use anyhow::{bail, Context, Result};
use axum::http::{Method, StatusCode};
use percent_encoding::percent_decode_str;
use serde_json::Value as JsonValue;
use std::path::Path;
use utoipa::OpenApi;

use crate::api_doc::ApiDoc;
use crate::error::Violation;

const MAX_SCHEMA_DEPTH: usize = 32;

static NULL: JsonValue = JsonValue::Null;

const METHODS: [&str; 8] = ["get", "put", "post", "delete", "patch", "head", "options", "trace"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

#[derive(Debug)]
struct PathTemplate {
    template: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    fn parse(template: &str) -> Self {
        let segments = split_path(template)
            .map(|segment| match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Literal(segment.to_string()),
            })
            .collect();
        PathTemplate {
            template: template.to_string(),
            segments,
        }
    }

    /// Path parameter values when `path` fits this template
    fn capture(&self, path: &str) -> Option<Vec<(String, String)>> {
        let parts: Vec<&str> = split_path(path).collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = Vec::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(_) if part.is_empty() => return None,
                Segment::Param(name) => params.push((name.clone(), part.to_string())),
            }
        }
        Some(params)
    }

    fn literal_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count()
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.strip_prefix('/').unwrap_or(path).split('/')
}

/// Parsed API contract. Immutable after construction.
#[derive(Debug)]
pub struct Contract {
    document: JsonValue,
    templates: Vec<PathTemplate>,
}

impl Contract {
    /// Contract generated from the service's own route annotations
    pub fn builtin() -> Result<Self> {
        let document = serde_json::to_value(ApiDoc::openapi())
            .context("Failed to serialize built-in OpenAPI document")?;
        Self::from_document(document)
    }

    /// Load from `path` when given, otherwise use the built-in contract
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Self::builtin();
        };

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read contract file {}", path.display()))?;
        let document: JsonValue = serde_json::from_str(&raw)
            .with_context(|| format!("Contract file {} is not valid JSON", path.display()))?;
        Self::from_document(document)
    }

    pub fn from_document(document: JsonValue) -> Result<Self> {
        let Some(paths) = document.get("paths").and_then(JsonValue::as_object) else {
            bail!("Contract has no 'paths' object");
        };

        let mut templates: Vec<PathTemplate> = paths.keys().map(|k| PathTemplate::parse(k)).collect();
        // Literal routes win over templated ones
        templates.sort_by(|a, b| b.literal_count().cmp(&a.literal_count()));

        tracing::debug!("Loaded contract with {} paths", templates.len());
        Ok(Contract {
            document,
            templates,
        })
    }

    pub fn document(&self) -> &JsonValue {
        &self.document
    }

    /// Find the operation declared for `method` on `path`
    pub fn match_request(&self, method: &Method, path: &str) -> Result<Operation<'_>, Vec<Violation>> {
        let method_key = method.as_str().to_ascii_lowercase();
        let mut path_known = false;

        for template in &self.templates {
            let Some(params) = template.capture(path) else {
                continue;
            };
            path_known = true;

            let item = self.resolve(&self.document["paths"][&template.template]);
            if let Some(operation) = item.get(&method_key) {
                let id = operation
                    .get("operationId")
                    .and_then(JsonValue::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{} {}", method, template.template));
                return Ok(Operation {
                    contract: self,
                    id,
                    item,
                    operation,
                    params,
                });
            }
        }

        let violation = if path_known {
            let declared: Vec<String> = self
                .templates
                .iter()
                .filter(|t| t.capture(path).is_some())
                .flat_map(|t| {
                    let item = self.resolve(&self.document["paths"][&t.template]);
                    METHODS
                        .iter()
                        .filter(|m| item.get(**m).is_some())
                        .map(|m| m.to_ascii_uppercase())
                        .collect::<Vec<_>>()
                })
                .collect();
            Violation::new(
                "method",
                format!("method {} not allowed, expected one of: {}", method, declared.join(", ")),
            )
        } else {
            Violation::new("path", format!("no operation declared for path {}", path))
        };
        Err(vec![violation])
    }

    /// Follow a local `$ref` chain
    fn resolve<'a>(&'a self, mut node: &'a JsonValue) -> &'a JsonValue {
        for _ in 0..MAX_SCHEMA_DEPTH {
            match node.get("$ref").and_then(JsonValue::as_str) {
                Some(reference) => match reference
                    .strip_prefix('#')
                    .and_then(|pointer| self.document.pointer(pointer))
                {
                    Some(target) => node = target,
                    None => return &NULL,
                },
                None => return node,
            }
        }
        &NULL
    }

    fn check_schema(
        &self,
        schema: &JsonValue,
        value: &JsonValue,
        location: &str,
        depth: usize,
        out: &mut Vec<Violation>,
    ) {
        if depth > MAX_SCHEMA_DEPTH {
            out.push(Violation::new(location, "schema nesting too deep"));
            return;
        }
        if let Some(reference) = schema.get("$ref").and_then(JsonValue::as_str) {
            let target = self.resolve(schema);
            if target.is_null() {
                out.push(Violation::new(location, format!("unresolvable schema reference {}", reference)));
            } else {
                self.check_schema(target, value, location, depth + 1, out);
            }
            return;
        }
        // `true` / `{}` accept anything, `false` rejects everything
        if let Some(accept) = schema.as_bool() {
            if !accept {
                out.push(Violation::new(location, "no value is allowed here"));
            }
            return;
        }

        if let Some(expected) = schema.get("type") {
            let nullable = schema.get("nullable").and_then(JsonValue::as_bool) == Some(true);
            if !(nullable && value.is_null()) && !type_allows(expected, value) {
                out.push(Violation::new(
                    location,
                    format!("expected {}, found {}", describe_type(expected), json_type(value)),
                ));
                return;
            }
        }

        if let Some(allowed) = schema.get("enum").and_then(JsonValue::as_array) {
            if !allowed.contains(value) {
                out.push(Violation::new(location, format!("value {} is not one of the allowed values", value)));
            }
        }

        match value {
            JsonValue::String(s) => check_string(schema, s, location, out),
            JsonValue::Number(n) => check_number(schema, n.as_f64().unwrap_or(f64::NAN), location, out),
            JsonValue::Array(items) => {
                if let Some(item_schema) = schema.get("items") {
                    for (index, item) in items.iter().enumerate() {
                        self.check_schema(item_schema, item, &format!("{}[{}]", location, index), depth + 1, out);
                    }
                }
            }
            JsonValue::Object(map) => {
                if let Some(required) = schema.get("required").and_then(JsonValue::as_array) {
                    for name in required.iter().filter_map(JsonValue::as_str) {
                        if !map.contains_key(name) {
                            out.push(Violation::new(
                                format!("{}.{}", location, name),
                                "missing required property",
                            ));
                        }
                    }
                }

                let properties = schema.get("properties").and_then(JsonValue::as_object);
                for (name, member) in map {
                    let member_location = format!("{}.{}", location, name);
                    match properties.and_then(|p| p.get(name)) {
                        Some(property_schema) => {
                            self.check_schema(property_schema, member, &member_location, depth + 1, out)
                        }
                        None => match schema.get("additionalProperties") {
                            Some(JsonValue::Bool(false)) => {
                                out.push(Violation::new(member_location, "unexpected property"))
                            }
                            Some(extra) if extra.is_object() => {
                                self.check_schema(extra, member, &member_location, depth + 1, out)
                            }
                            _ => {}
                        },
                    }
                }
            }
            _ => {}
        }
    }

    /// Validate a body against the `content` map of a request or response
    fn check_content(
        &self,
        content: Option<&JsonValue>,
        content_type: Option<&str>,
        body: &[u8],
        location: &str,
        out: &mut Vec<Violation>,
    ) {
        let declared = content.and_then(JsonValue::as_object).filter(|c| !c.is_empty());
        let Some(declared) = declared else {
            if !body.is_empty() {
                out.push(Violation::new(location, "no body is declared for this message"));
            }
            return;
        };

        let Some(media_type) = content_type.map(media_type) else {
            out.push(Violation::new(
                "header.content-type",
                format!("missing content type, expected one of: {}", join_keys(declared)),
            ));
            return;
        };

        let entry = declared.get(&media_type).or_else(|| {
            let family = format!("{}/*", media_type.split('/').next().unwrap_or_default());
            declared.get(&family).or_else(|| declared.get("*/*"))
        });
        let Some(entry) = entry else {
            out.push(Violation::new(
                "header.content-type",
                format!("content type {} not allowed, expected one of: {}", media_type, join_keys(declared)),
            ));
            return;
        };

        if !is_json(&media_type) {
            return;
        }
        let value: JsonValue = match serde_json::from_slice(body) {
            Ok(value) => value,
            Err(e) => {
                out.push(Violation::new(location, format!("invalid JSON: {}", e)));
                return;
            }
        };
        if let Some(schema) = entry.get("schema") {
            self.check_schema(schema, &value, location, 0, out);
        }
    }
}

/// An operation of the contract matched against a concrete request
#[derive(Debug)]
pub struct Operation<'a> {
    contract: &'a Contract,
    id: String,
    item: &'a JsonValue,
    operation: &'a JsonValue,
    params: Vec<(String, String)>,
}

impl Operation<'_> {
    /// `operationId` of the matched operation
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn validate_request(&self, content_type: Option<&str>, body: &[u8]) -> Vec<Violation> {
        let mut out = Vec::new();
        self.check_path_params(&mut out);

        match self.operation.get("requestBody").map(|b| self.contract.resolve(b)) {
            Some(request_body) => {
                let optional = request_body.get("required").and_then(JsonValue::as_bool) == Some(false);
                if body.is_empty() && !optional {
                    out.push(Violation::new("body", "request body is required"));
                } else if !body.is_empty() {
                    self.contract
                        .check_content(request_body.get("content"), content_type, body, "body", &mut out);
                }
            }
            None if !body.is_empty() => {
                out.push(Violation::new("body", "this operation does not accept a request body"))
            }
            None => {}
        }
        out
    }

    pub fn validate_response(&self, status: StatusCode, content_type: Option<&str>, body: &[u8]) -> Vec<Violation> {
        let mut out = Vec::new();
        let responses = self.operation.get("responses").and_then(JsonValue::as_object);
        let code = status.as_str();
        let range = format!("{}XX", &code[..1]);

        let declared = responses.and_then(|r| {
            r.get(code)
                .or_else(|| r.get(&range))
                .or_else(|| r.get(&range.to_ascii_lowercase()))
                .or_else(|| r.get("default"))
        });
        let Some(declared) = declared else {
            out.push(Violation::new("status", format!("status {} is not declared for {}", code, self.id)));
            return out;
        };

        let declared = self.contract.resolve(declared);
        self.contract
            .check_content(declared.get("content"), content_type, body, "body", &mut out);
        out
    }

    fn check_path_params(&self, out: &mut Vec<Violation>) {
        let declared = self
            .item
            .get("parameters")
            .and_then(JsonValue::as_array)
            .into_iter()
            .flatten()
            .chain(self.operation.get("parameters").and_then(JsonValue::as_array).into_iter().flatten())
            .map(|p| self.contract.resolve(p))
            .filter(|p| p.get("in").and_then(JsonValue::as_str) == Some("path"));

        for parameter in declared {
            let Some(name) = parameter.get("name").and_then(JsonValue::as_str) else {
                continue;
            };
            let location = format!("path.{}", name);
            let Some((_, raw)) = self.params.iter().find(|(n, _)| n == name) else {
                out.push(Violation::new(location, "missing path parameter"));
                continue;
            };
            // Handlers see the decoded segment
            let Ok(decoded) = percent_decode_str(raw).decode_utf8() else {
                out.push(Violation::new(location, "percent-decoded segment is not valid UTF-8"));
                continue;
            };
            if let Some(schema) = parameter.get("schema") {
                let value = path_value(self.contract.resolve(schema), &decoded);
                self.contract.check_schema(schema, &value, &location, 0, out);
            }
        }
    }
}

/// Path segments arrive as text; coerce them to the schema's scalar type
fn path_value(schema: &JsonValue, raw: &str) -> JsonValue {
    let wants = |ty: &str| match schema.get("type") {
        Some(JsonValue::String(s)) => s == ty,
        Some(JsonValue::Array(types)) => types.iter().any(|t| t == ty),
        _ => false,
    };
    if wants("integer") || wants("number") {
        if let Ok(number) = serde_json::from_str::<serde_json::Number>(raw) {
            return JsonValue::Number(number);
        }
    }
    if wants("boolean") {
        if let Ok(flag) = raw.parse::<bool>() {
            return JsonValue::Bool(flag);
        }
    }
    JsonValue::String(raw.to_string())
}

fn check_string(schema: &JsonValue, s: &str, location: &str, out: &mut Vec<Violation>) {
    let length = s.chars().count() as u64;
    if let Some(min) = schema.get("minLength").and_then(JsonValue::as_u64) {
        if length < min {
            out.push(Violation::new(location, format!("string shorter than {} characters", min)));
        }
    }
    if let Some(max) = schema.get("maxLength").and_then(JsonValue::as_u64) {
        if length > max {
            out.push(Violation::new(location, format!("string longer than {} characters", max)));
        }
    }
}

fn check_number(schema: &JsonValue, n: f64, location: &str, out: &mut Vec<Violation>) {
    if let Some(min) = schema.get("minimum").and_then(JsonValue::as_f64) {
        if n < min {
            out.push(Violation::new(location, format!("value below minimum {}", min)));
        }
    }
    if let Some(max) = schema.get("maximum").and_then(JsonValue::as_f64) {
        if n > max {
            out.push(Violation::new(location, format!("value above maximum {}", max)));
        }
    }
}

fn type_allows(expected: &JsonValue, value: &JsonValue) -> bool {
    match expected {
        JsonValue::String(ty) => type_name_allows(ty, value),
        JsonValue::Array(types) => types
            .iter()
            .filter_map(JsonValue::as_str)
            .any(|ty| type_name_allows(ty, value)),
        _ => true,
    }
}

fn type_name_allows(ty: &str, value: &JsonValue) -> bool {
    match ty {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64() || value.as_f64().is_some_and(|f| f.fract() == 0.0),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn describe_type(expected: &JsonValue) -> String {
    match expected {
        JsonValue::Array(types) => types
            .iter()
            .filter_map(JsonValue::as_str)
            .collect::<Vec<_>>()
            .join(" or "),
        JsonValue::String(ty) => ty.clone(),
        other => other.to_string(),
    }
}

fn json_type(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// Lowercased media type without parameters
fn media_type(header: &str) -> String {
    header
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn is_json(media_type: &str) -> bool {
    media_type == "application/json" || media_type.ends_with("+json")
}

fn join_keys(map: &serde_json::Map<String, JsonValue>) -> String {
    map.keys().cloned().collect::<Vec<_>>().join(", ")
}
