// Path template compilation and matching.
//
// Templates mix literal text with typed parameter placeholders:
//
//   /users/{id:int}/posts/{slug}
//   /files/{rest:path}
//
// The default converter is `str`, which matches a single path segment.
// The `path` converter is greedy, matches across slashes, and must be the
// final token of the template.

use crate::error::Error;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// A converted path-parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Float(f64),
    Uuid(Uuid),
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            ParamValue::Uuid(v) => Some(*v),
            _ => None,
        }
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Str(s) => f.write_str(s),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Uuid(v) => write!(f, "{}", v),
        }
    }
}

/// Ordered map of captured path parameters.
#[derive(Debug, Clone, Default)]
pub struct PathParams {
    items: Vec<(String, ParamValue)>,
}

impl PathParams {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) {
        self.items.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.items
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Append all entries of `other`, keeping insertion order.
    pub fn merge(&mut self, other: PathParams) {
        self.items.extend(other.items);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.items.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A path-parameter type converter.
///
/// Converters contribute a regex fragment used during pattern compilation
/// and a fallible conversion applied to the raw capture. A failed
/// conversion is a no-match, never an error.
pub trait Converter: Send + Sync {
    /// Regex fragment (no capture groups) this converter matches.
    fn fragment(&self) -> &'static str;

    /// Convert a raw capture into a typed value; `None` means no-match.
    fn convert(&self, raw: &str) -> Option<ParamValue>;

    /// Whether a stringified value is acceptable for URL reversal.
    fn accepts(&self, raw: &str) -> bool {
        self.convert(raw).is_some()
    }
}

struct StrConverter;

impl Converter for StrConverter {
    fn fragment(&self) -> &'static str {
        "[^/]+"
    }

    fn convert(&self, raw: &str) -> Option<ParamValue> {
        if raw.is_empty() || raw.contains('/') {
            return None;
        }
        Some(ParamValue::Str(raw.to_string()))
    }
}

struct IntConverter;

impl Converter for IntConverter {
    fn fragment(&self) -> &'static str {
        "-?[0-9]+"
    }

    fn convert(&self, raw: &str) -> Option<ParamValue> {
        raw.parse::<i64>().ok().map(ParamValue::Int)
    }
}

struct FloatConverter;

impl Converter for FloatConverter {
    fn fragment(&self) -> &'static str {
        r"-?[0-9]*\.?[0-9]+"
    }

    fn convert(&self, raw: &str) -> Option<ParamValue> {
        raw.parse::<f64>().ok().map(ParamValue::Float)
    }
}

struct UuidConverter;

impl Converter for UuidConverter {
    fn fragment(&self) -> &'static str {
        "[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}"
    }

    fn convert(&self, raw: &str) -> Option<ParamValue> {
        Uuid::parse_str(raw).ok().map(ParamValue::Uuid)
    }
}

struct GreedyPathConverter;

impl Converter for GreedyPathConverter {
    fn fragment(&self) -> &'static str {
        ".+"
    }

    fn convert(&self, raw: &str) -> Option<ParamValue> {
        if raw.is_empty() {
            return None;
        }
        Some(ParamValue::Str(raw.to_string()))
    }
}

/// Extensible registry of parameter converters keyed by type tag.
#[derive(Clone)]
pub struct ConverterRegistry {
    map: HashMap<String, Arc<dyn Converter>>,
}

impl ConverterRegistry {
    /// Registry with the built-in converters: `str`, `int`, `float`,
    /// `uuid`, `path`.
    pub fn builtin() -> Self {
        let mut map: HashMap<String, Arc<dyn Converter>> = HashMap::new();
        map.insert("str".to_string(), Arc::new(StrConverter));
        map.insert("int".to_string(), Arc::new(IntConverter));
        map.insert("float".to_string(), Arc::new(FloatConverter));
        map.insert("uuid".to_string(), Arc::new(UuidConverter));
        map.insert("path".to_string(), Arc::new(GreedyPathConverter));
        Self { map }
    }

    pub fn register(&mut self, tag: impl Into<String>, converter: Arc<dyn Converter>) {
        self.map.insert(tag.into(), converter);
    }

    pub fn get(&self, tag: &str) -> Option<Arc<dyn Converter>> {
        self.map.get(tag).cloned()
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Descriptor for one parameter placeholder in a template.
#[derive(Clone)]
pub struct ParamDescriptor {
    pub name: String,
    pub tag: String,
    pub converter: Arc<dyn Converter>,
}

impl std::fmt::Debug for ParamDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParamDescriptor")
            .field("name", &self.name)
            .field("tag", &self.tag)
            .finish()
    }
}

/// Classification of a compiled pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    /// Literal segments only.
    Static,
    /// Parameter segments only.
    Dynamic,
    /// Both literal and parameter segments.
    Mixed,
}

#[derive(Clone)]
enum PatternPart {
    Literal(String),
    Param(usize),
}

/// A compiled path template.
///
/// Immutable; compiling the same template twice yields matchers that
/// accept identical path sets.
#[derive(Clone)]
pub struct PathPattern {
    raw_template: String,
    template: String,
    params: Vec<ParamDescriptor>,
    regex: Arc<Regex>,
    prefix_regex: Arc<Regex>,
    kind: PatternKind,
}

/// Strip a single trailing slash so `/api/test` and `/api/test/` are
/// equivalent. The root path is left untouched.
pub fn normalize_path(path: &str) -> &str {
    if path.len() > 1 && path.ends_with('/') {
        &path[..path.len() - 1]
    } else {
        path
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl PathPattern {
    /// Compile a template with the built-in converters.
    pub fn compile(template: &str) -> Result<Self, Error> {
        Self::compile_with(template, &ConverterRegistry::builtin())
    }

    /// Compile a template against an explicit converter registry.
    pub fn compile_with(template: &str, registry: &ConverterRegistry) -> Result<Self, Error> {
        let raw_template = template.to_string();
        let template = normalize_path(template).to_string();

        let fail = |reason: String| Error::PatternCompile {
            template: raw_template.clone(),
            reason,
        };

        let mut parts = Vec::new();
        let mut params: Vec<ParamDescriptor> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut literal = String::new();
        let mut chars = template.char_indices().peekable();

        while let Some((idx, c)) = chars.next() {
            if c != '{' {
                literal.push(c);
                continue;
            }
            if !literal.is_empty() {
                parts.push(PatternPart::Literal(std::mem::take(&mut literal)));
            }
            let rest = &template[idx + 1..];
            let close = rest
                .find('}')
                .ok_or_else(|| fail("unterminated '{' placeholder".to_string()))?;
            let token = &rest[..close];
            // Skip past the token and the closing brace.
            for _ in 0..=close {
                chars.next();
            }

            let (name, tag) = match token.split_once(':') {
                Some((n, t)) => (n.trim(), t.trim()),
                None => (token.trim(), "str"),
            };
            if !is_identifier(name) {
                return Err(fail(format!("invalid parameter name '{}'", name)));
            }
            if !seen.insert(name.to_string()) {
                return Err(fail(format!("duplicate parameter name '{}'", name)));
            }
            let converter = registry
                .get(tag)
                .ok_or_else(|| fail(format!("unknown converter type '{}'", tag)))?;
            params.push(ParamDescriptor {
                name: name.to_string(),
                tag: tag.to_string(),
                converter,
            });
            parts.push(PatternPart::Param(params.len() - 1));
        }
        if !literal.is_empty() {
            parts.push(PatternPart::Literal(literal));
        }

        // The greedy `path` converter swallows everything to the end of the
        // request path, so it only makes sense as the final token.
        for (i, part) in parts.iter().enumerate() {
            if let PatternPart::Param(p) = part {
                if params[*p].tag == "path" && i + 1 != parts.len() {
                    return Err(fail(
                        "'path' converter must be the final segment of the template".to_string(),
                    ));
                }
            }
        }

        let mut body = String::new();
        for part in &parts {
            match part {
                PatternPart::Literal(text) => body.push_str(&regex::escape(text)),
                PatternPart::Param(p) => {
                    let d = &params[*p];
                    body.push_str(&format!("(?P<{}>{})", d.name, d.converter.fragment()));
                }
            }
        }

        let regex = Regex::new(&format!("^{}$", body))
            .map_err(|e| fail(format!("regex compilation failed: {}", e)))?;
        let prefix_regex = Regex::new(&format!("^{}", body))
            .map_err(|e| fail(format!("regex compilation failed: {}", e)))?;

        let kind = Self::classify(&template);

        Ok(Self {
            raw_template,
            template,
            params,
            regex: Arc::new(regex),
            prefix_regex: Arc::new(prefix_regex),
            kind,
        })
    }

    fn classify(template: &str) -> PatternKind {
        let segments: Vec<&str> = template.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return PatternKind::Static;
        }
        let dynamic = segments.iter().filter(|s| s.contains('{')).count();
        if dynamic == 0 {
            PatternKind::Static
        } else if dynamic == segments.len() {
            PatternKind::Dynamic
        } else {
            PatternKind::Mixed
        }
    }

    /// The template as registered, before trailing-slash normalization.
    pub fn raw_template(&self) -> &str {
        &self.raw_template
    }

    /// The normalized template.
    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn kind(&self) -> PatternKind {
        self.kind
    }

    pub fn descriptors(&self) -> &[ParamDescriptor] {
        &self.params
    }

    pub fn param_names(&self) -> Vec<&str> {
        self.params.iter().map(|d| d.name.as_str()).collect()
    }

    /// Match a full request path, returning converted captures.
    ///
    /// A raw capture that fails its converter yields `None`: routing
    /// treats a type mismatch as route-not-found, not as an error.
    pub fn match_path(&self, path: &str) -> Option<PathParams> {
        let path = normalize_path(path);
        let caps = self.regex.captures(path)?;
        let mut out = PathParams::new();
        for d in &self.params {
            let raw = caps.name(&d.name)?.as_str();
            let value = d.converter.convert(raw)?;
            out.insert(d.name.clone(), value);
        }
        Some(out)
    }

    /// Match this pattern as a path prefix at a segment boundary.
    ///
    /// Returns the converted prefix captures and the remainder path
    /// (always `/`-leading; an exact prefix match leaves `/`).
    pub fn match_prefix(&self, path: &str) -> Option<(PathParams, String)> {
        let caps = self.prefix_regex.captures(path)?;
        let end = caps.get(0)?.end();
        let rest = &path[end..];
        if !rest.is_empty() && !rest.starts_with('/') {
            return None;
        }
        let mut out = PathParams::new();
        for d in &self.params {
            let raw = caps.name(&d.name)?.as_str();
            let value = d.converter.convert(raw)?;
            out.insert(d.name.clone(), value);
        }
        let remainder = if rest.is_empty() {
            "/".to_string()
        } else {
            rest.to_string()
        };
        Some((out, remainder))
    }

    /// Substitute parameters into the template for URL reversal.
    ///
    /// The provided set must exactly equal the required set, and each
    /// value must satisfy its parameter's converter.
    pub fn format_path(&self, values: &[(&str, &str)]) -> Result<String, Error> {
        format_template(&self.template, &self.params, values)
    }
}

/// Substitute parameter values into a template given its descriptors.
///
/// Used both for single patterns and for group-composed templates where
/// the descriptor list spans multiple compiled patterns. The provided set
/// must exactly equal the required set; each value is re-validated against
/// its parameter's converter before substitution.
pub fn format_template(
    template: &str,
    descriptors: &[ParamDescriptor],
    values: &[(&str, &str)],
) -> Result<String, Error> {
    let provided: HashMap<&str, &str> = values.iter().copied().collect();
    let required: HashSet<&str> = descriptors.iter().map(|d| d.name.as_str()).collect();

    let mut missing: Vec<String> = required
        .iter()
        .filter(|n| !provided.contains_key(**n))
        .map(|n| n.to_string())
        .collect();
    let mut extra: Vec<String> = provided
        .keys()
        .filter(|n| !required.contains(**n))
        .map(|n| n.to_string())
        .collect();
    if !missing.is_empty() || !extra.is_empty() {
        missing.sort();
        extra.sort();
        return Err(Error::ParameterMismatch { missing, extra });
    }

    let mut out = template.to_string();
    for d in descriptors {
        let value = provided[d.name.as_str()];
        if !d.converter.accepts(value) {
            return Err(Error::ReversalValueInvalid {
                name: d.name.clone(),
                value: value.to_string(),
            });
        }
        out = substitute_token(&out, &d.name, value);
    }
    Ok(out)
}

fn substitute_token(template: &str, name: &str, value: &str) -> String {
    let plain = format!("{{{}}}", name);
    if let Some(idx) = template.find(&plain) {
        let mut out = String::with_capacity(template.len());
        out.push_str(&template[..idx]);
        out.push_str(value);
        out.push_str(&template[idx + plain.len()..]);
        return out;
    }
    let tagged = format!("{{{}:", name);
    if let Some(idx) = template.find(&tagged) {
        if let Some(close) = template[idx..].find('}') {
            let mut out = String::with_capacity(template.len());
            out.push_str(&template[..idx]);
            out.push_str(value);
            out.push_str(&template[idx + close + 1..]);
            return out;
        }
    }
    template.to_string()
}

impl std::fmt::Debug for PathPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathPattern")
            .field("template", &self.template)
            .field("params", &self.params)
            .field("kind", &self.kind)
            .finish()
    }
}
