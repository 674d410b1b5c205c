//! URI Templates
//!
//! RFC 6570 style templates: expansion into concrete urls and the reverse
//! direction, recovering variable bindings from a concrete url.
//!
//! ```text
//! /users{/username}{?query*}
//!   expand {username: "foobar", query: {recent_posts: "true"}}
//!     -> /users/foobar?recent_posts=true
//!   extract "/users/foobar?recent_posts=true"
//!     -> {username: "foobar", recent_posts: "true"}
//! ```

use crate::result::{PrismError, PrismResult};
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

/// Variable bindings recovered from a url
pub type Mappings = BTreeMap<String, String>;

/// Build a [`Mappings`] from any pairs whose values render as strings.
///
/// Expected mappings compare by string form, so `("id", 28)` matches a
/// captured `"28"`.
pub fn mappings<I, K, V>(pairs: I) -> Mappings
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: ToString,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.to_string()))
        .collect()
}

// =============================================================================
// VALUES
// =============================================================================

/// A value bound to a template variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateValue {
    /// Plain string
    String(String),
    /// Ordered list of strings
    List(Vec<String>),
    /// Ordered key/value pairs, rendered in insertion order
    Map(Vec<(String, String)>),
}

impl TemplateValue {
    /// Build a map value from key/value pairs
    pub fn map<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build a list value
    pub fn list<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// Empty lists and maps count as undefined
    fn is_undefined(&self) -> bool {
        match self {
            Self::String(_) => false,
            Self::List(items) => items.is_empty(),
            Self::Map(pairs) => pairs.is_empty(),
        }
    }
}

impl From<&str> for TemplateValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for TemplateValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<u64> for TemplateValue {
    fn from(value: u64) -> Self {
        Self::String(value.to_string())
    }
}

impl From<i64> for TemplateValue {
    fn from(value: i64) -> Self {
        Self::String(value.to_string())
    }
}

impl From<Vec<String>> for TemplateValue {
    fn from(items: Vec<String>) -> Self {
        Self::List(items)
    }
}

impl From<Vec<(String, String)>> for TemplateValue {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self::Map(pairs)
    }
}

/// Named values used to expand a template
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Variables {
    values: BTreeMap<String, TemplateValue>,
}

impl Variables {
    /// Create an empty variable set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a variable
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<TemplateValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Bind a variable in place
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<TemplateValue>) {
        self.values.insert(name.into(), value.into());
    }

    /// Look up a variable
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TemplateValue> {
        self.values.get(name)
    }

    /// Whether no variables are bound
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<TemplateValue>> FromIterator<(K, V)> for Variables {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut vars = Self::new();
        for (k, v) in iter {
            vars.insert(k, v);
        }
        vars
    }
}

// =============================================================================
// TEMPLATE AST
// =============================================================================

/// Expression operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Simple,
    Reserved,
    Fragment,
    Label,
    Path,
    PathParam,
    Query,
    QueryContinuation,
}

impl Operator {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Self::Reserved),
            '#' => Some(Self::Fragment),
            '.' => Some(Self::Label),
            '/' => Some(Self::Path),
            ';' => Some(Self::PathParam),
            '?' => Some(Self::Query),
            '&' => Some(Self::QueryContinuation),
            _ => None,
        }
    }

    const fn first(self) -> &'static str {
        match self {
            Self::Simple | Self::Reserved => "",
            Self::Fragment => "#",
            Self::Label => ".",
            Self::Path => "/",
            Self::PathParam => ";",
            Self::Query => "?",
            Self::QueryContinuation => "&",
        }
    }

    const fn separator(self) -> &'static str {
        match self {
            Self::Simple | Self::Reserved | Self::Fragment => ",",
            Self::Label => ".",
            Self::Path => "/",
            Self::PathParam => ";",
            Self::Query | Self::QueryContinuation => "&",
        }
    }

    const fn named(self) -> bool {
        matches!(self, Self::PathParam | Self::Query | Self::QueryContinuation)
    }

    const fn if_empty(self) -> &'static str {
        match self {
            Self::Query | Self::QueryContinuation => "=",
            _ => "",
        }
    }

    const fn allows_reserved(self) -> bool {
        matches!(self, Self::Reserved | Self::Fragment)
    }

    const fn is_query(self) -> bool {
        matches!(self, Self::Query | Self::QueryContinuation)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct VarSpec {
    name: String,
    explode: bool,
    prefix: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Expression {
    operator: Operator,
    vars: Vec<VarSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Expression(Expression),
}

/// How a regex group maps back onto variables
#[derive(Debug, Clone)]
enum Capture {
    /// One variable, one percent-encoded value
    Single { group: String, var: String },
    /// Exploded path-like list, split on the operator separator
    Exploded {
        group: String,
        var: String,
        separator: &'static str,
    },
    /// Raw query string, parsed into pairs independently of order
    Query { group: String, explode: bool },
}

// =============================================================================
// URI TEMPLATE
// =============================================================================

/// An immutable, parsed URI template
#[derive(Clone)]
pub struct UriTemplate {
    source: String,
    parts: Vec<Part>,
    matcher: Regex,
    captures: Vec<Capture>,
    query_names: Vec<String>,
}

impl fmt::Debug for UriTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UriTemplate")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for UriTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl PartialEq for UriTemplate {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl UriTemplate {
    /// Parse a template
    ///
    /// # Errors
    /// Returns [`PrismError::InvalidTemplate`] for unclosed or malformed
    /// expressions.
    pub fn new(source: impl Into<String>) -> PrismResult<Self> {
        let source = source.into();
        let parts = parse(&source)?;
        let (pattern, captures) = build_pattern(&parts);
        let matcher = Regex::new(&pattern)?;
        let query_names = parts
            .iter()
            .filter_map(|p| match p {
                Part::Expression(e) if e.operator.is_query() => Some(e),
                _ => None,
            })
            .flat_map(|e| e.vars.iter().map(|v| v.name.clone()))
            .collect();

        Ok(Self {
            source,
            parts,
            matcher,
            captures,
            query_names,
        })
    }

    /// Whether a string contains template expressions at all
    #[must_use]
    pub fn is_templated(source: &str) -> bool {
        source.contains('{')
    }

    /// Template source
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Declared variable names, in template order
    #[must_use]
    pub fn variables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for part in &self.parts {
            if let Part::Expression(expr) = part {
                for var in &expr.vars {
                    if !names.contains(&var.name.as_str()) {
                        names.push(&var.name);
                    }
                }
            }
        }
        names
    }

    /// Expand the template. Missing variables expand to nothing.
    #[must_use]
    pub fn expand(&self, vars: &Variables) -> String {
        let mut out = String::with_capacity(self.source.len());
        for part in &self.parts {
            match part {
                Part::Literal(lit) => out.push_str(lit),
                Part::Expression(expr) => expand_expression(expr, vars, &mut out),
            }
        }
        out
    }

    /// Reverse-match a concrete url against the template.
    ///
    /// Returns `None` when the url does not match, or when a captured value
    /// does not percent-decode to UTF-8. Variables that did not
    /// participate in the match (an absent `{/id}`) are left out; exploded
    /// query maps are flattened to one entry per key.
    #[must_use]
    pub fn extract_mapping(&self, candidate: &str) -> Option<Mappings> {
        if let Some(found) = self.extract_exact(candidate) {
            return Some(found);
        }
        // relative template against an absolute url: use path + query
        if !self.is_relative() {
            return None;
        }
        let url = Url::parse(candidate).ok()?;
        let mut relative = url.path().to_string();
        if let Some(query) = url.query() {
            relative.push('?');
            relative.push_str(query);
        }
        self.extract_exact(&relative)
    }

    fn is_relative(&self) -> bool {
        match self.parts.first() {
            Some(Part::Literal(lit)) => lit.starts_with('/'),
            Some(Part::Expression(expr)) => expr.operator == Operator::Path,
            None => false,
        }
    }

    fn extract_exact(&self, candidate: &str) -> Option<Mappings> {
        let caps = self.matcher.captures(candidate)?;
        let mut found = Mappings::new();

        for capture in &self.captures {
            match capture {
                Capture::Single { group, var } => {
                    if let Some(m) = caps.name(group) {
                        found.insert(var.clone(), decode(m.as_str())?);
                    }
                }
                Capture::Exploded {
                    group,
                    var,
                    separator,
                } => {
                    if let Some(m) = caps.name(group) {
                        if m.as_str().is_empty() {
                            continue;
                        }
                        let items: Vec<String> = m
                            .as_str()
                            .split(separator)
                            .skip(1)
                            .map(decode)
                            .collect::<Option<_>>()?;
                        found.insert(var.clone(), items.join(","));
                    }
                }
                Capture::Query { group, explode } => {
                    let Some(m) = caps.name(group) else {
                        continue;
                    };
                    for (key, value) in url::form_urlencoded::parse(m.as_str().as_bytes()) {
                        let known = self.query_names.iter().any(|n| *n == key);
                        if !known && !explode {
                            return None;
                        }
                        found.entry(key.into_owned()).or_insert(value.into_owned());
                    }
                }
            }
        }

        Some(found)
    }
}

impl std::str::FromStr for UriTemplate {
    type Err = PrismError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// =============================================================================
// PARSING
// =============================================================================

fn parse(source: &str) -> PrismResult<Vec<Part>> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut rest = source;

    while let Some(open) = rest.find('{') {
        literal.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| PrismError::invalid_template(source, "unclosed expression"))?;
        let body = &after[..close];
        if body.contains('{') {
            return Err(PrismError::invalid_template(source, "nested expression"));
        }
        if !literal.is_empty() {
            parts.push(Part::Literal(std::mem::take(&mut literal)));
        }
        parts.push(Part::Expression(parse_expression(source, body)?));
        rest = &after[close + 1..];
    }
    literal.push_str(rest);
    if !literal.is_empty() {
        parts.push(Part::Literal(literal));
    }

    Ok(parts)
}

fn parse_expression(source: &str, body: &str) -> PrismResult<Expression> {
    let mut chars = body.chars();
    let (operator, list) = match chars.next() {
        None => return Err(PrismError::invalid_template(source, "empty expression")),
        Some(c) => match Operator::from_char(c) {
            Some(op) => (op, chars.as_str()),
            None if "=,!@|".contains(c) => {
                return Err(PrismError::invalid_template(
                    source,
                    format!("reserved operator {c:?}"),
                ))
            }
            None => (Operator::Simple, body),
        },
    };

    let vars = list
        .split(',')
        .map(|spec| parse_varspec(source, spec))
        .collect::<PrismResult<Vec<_>>>()?;

    Ok(Expression { operator, vars })
}

fn parse_varspec(source: &str, spec: &str) -> PrismResult<VarSpec> {
    let (name, explode, prefix) = if let Some(name) = spec.strip_suffix('*') {
        (name, true, None)
    } else if let Some((name, len)) = spec.split_once(':') {
        let len: usize = len
            .parse()
            .ok()
            .filter(|n| (1..10_000).contains(n))
            .ok_or_else(|| PrismError::invalid_template(source, format!("bad prefix {len:?}")))?;
        (name, false, Some(len))
    } else {
        (spec, false, None)
    };

    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '%');
    if !valid {
        return Err(PrismError::invalid_template(
            source,
            format!("bad variable name {name:?}"),
        ));
    }

    Ok(VarSpec {
        name: name.to_string(),
        explode,
        prefix,
    })
}

// =============================================================================
// EXPANSION
// =============================================================================

fn expand_expression(expr: &Expression, vars: &Variables, out: &mut String) {
    let op = expr.operator;
    let reserved = op.allows_reserved();
    let mut first = true;

    for spec in &expr.vars {
        let Some(value) = vars.get(&spec.name) else {
            continue;
        };
        if value.is_undefined() {
            continue;
        }
        out.push_str(if first { op.first() } else { op.separator() });
        first = false;

        match value {
            TemplateValue::String(s) => {
                let s: String = match spec.prefix {
                    Some(n) => s.chars().take(n).collect(),
                    None => s.clone(),
                };
                if op.named() {
                    out.push_str(&spec.name);
                    if s.is_empty() {
                        out.push_str(op.if_empty());
                        continue;
                    }
                    out.push('=');
                }
                out.push_str(&encode(&s, reserved));
            }
            TemplateValue::List(items) => {
                if spec.explode {
                    for (i, item) in items.iter().enumerate() {
                        if i > 0 {
                            out.push_str(op.separator());
                        }
                        if op.named() {
                            out.push_str(&spec.name);
                            if item.is_empty() {
                                out.push_str(op.if_empty());
                                continue;
                            }
                            out.push('=');
                        }
                        out.push_str(&encode(item, reserved));
                    }
                } else {
                    if op.named() {
                        out.push_str(&spec.name);
                        out.push('=');
                    }
                    let joined: Vec<String> = items.iter().map(|i| encode(i, reserved)).collect();
                    out.push_str(&joined.join(","));
                }
            }
            TemplateValue::Map(pairs) => {
                if spec.explode {
                    for (i, (k, v)) in pairs.iter().enumerate() {
                        if i > 0 {
                            out.push_str(op.separator());
                        }
                        out.push_str(&encode(k, reserved));
                        if v.is_empty() && op.named() {
                            out.push_str(op.if_empty());
                        } else {
                            out.push('=');
                            out.push_str(&encode(v, reserved));
                        }
                    }
                } else {
                    if op.named() {
                        out.push_str(&spec.name);
                        out.push('=');
                    }
                    let joined: Vec<String> = pairs
                        .iter()
                        .map(|(k, v)| format!("{},{}", encode(k, reserved), encode(v, reserved)))
                        .collect();
                    out.push_str(&joined.join(","));
                }
            }
        }
    }
}

const fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~')
}

const fn is_reserved(b: u8) -> bool {
    matches!(
        b,
        b':' | b'/'
            | b'?'
            | b'#'
            | b'['
            | b']'
            | b'@'
            | b'!'
            | b'$'
            | b'&'
            | b'\''
            | b'('
            | b')'
            | b'*'
            | b'+'
            | b','
            | b';'
            | b'='
    )
}

fn encode(value: &str, allow_reserved: bool) -> String {
    let bytes = value.as_bytes();
    let mut out = String::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        let pct_triplet = allow_reserved
            && b == b'%'
            && bytes.len() > i + 2
            && bytes[i + 1].is_ascii_hexdigit()
            && bytes[i + 2].is_ascii_hexdigit();
        if is_unreserved(b) || (allow_reserved && is_reserved(b)) || pct_triplet {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
        i += 1;
    }
    out
}

/// Percent-decode a captured value; `None` when the bytes are not UTF-8
fn decode(value: &str) -> Option<String> {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(b) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(out).ok()
}

// =============================================================================
// REVERSE MATCHING
// =============================================================================

fn build_pattern(parts: &[Part]) -> (String, Vec<Capture>) {
    let mut pattern = String::from("^");
    let mut captures = Vec::new();
    let mut next_group = 0usize;
    let mut group = || {
        let name = format!("g{next_group}");
        next_group += 1;
        name
    };

    for part in parts {
        let expr = match part {
            Part::Literal(lit) => {
                pattern.push_str(&regex::escape(lit));
                continue;
            }
            Part::Expression(expr) => expr,
        };
        let op = expr.operator;
        let single = expr.vars.len() == 1;

        match op {
            Operator::Simple | Operator::Reserved => {
                let class = match (op, single) {
                    (Operator::Simple, true) => "[^/?#]*",
                    (Operator::Simple, false) => "[^/?#,]*",
                    (_, true) => "[^?#]*",
                    (_, false) => "[^?#,]*",
                };
                for (i, var) in expr.vars.iter().enumerate() {
                    let g = group();
                    if i == 0 {
                        pattern.push_str(&format!("(?P<{g}>{class})"));
                    } else {
                        pattern.push_str(&format!("(?:,(?P<{g}>{class}))?"));
                    }
                    captures.push(Capture::Single {
                        group: g,
                        var: var.name.clone(),
                    });
                }
            }
            Operator::Fragment => {
                let class = if single { ".*" } else { "[^,]*" };
                pattern.push_str("(?:#");
                for (i, var) in expr.vars.iter().enumerate() {
                    let g = group();
                    if i == 0 {
                        pattern.push_str(&format!("(?P<{g}>{class})"));
                    } else {
                        pattern.push_str(&format!("(?:,(?P<{g}>{class}))?"));
                    }
                    captures.push(Capture::Single {
                        group: g,
                        var: var.name.clone(),
                    });
                }
                pattern.push_str(")?");
            }
            Operator::Label | Operator::Path => {
                let (lead, class) = if op == Operator::Path {
                    ("/", "[^/?#]*")
                } else {
                    (r"\.", "[^/?#.]*")
                };
                for var in &expr.vars {
                    let g = group();
                    if var.explode {
                        pattern.push_str(&format!("(?P<{g}>(?:{lead}{class})*)"));
                        captures.push(Capture::Exploded {
                            group: g,
                            var: var.name.clone(),
                            separator: op.separator(),
                        });
                    } else {
                        pattern.push_str(&format!("(?:{lead}(?P<{g}>{class}))?"));
                        captures.push(Capture::Single {
                            group: g,
                            var: var.name.clone(),
                        });
                    }
                }
            }
            Operator::PathParam => {
                for var in &expr.vars {
                    let g = group();
                    pattern.push_str(&format!(
                        "(?:;{}(?:=(?P<{g}>[^/?#;]*))?)?",
                        regex::escape(&var.name)
                    ));
                    captures.push(Capture::Single {
                        group: g,
                        var: var.name.clone(),
                    });
                }
            }
            Operator::Query | Operator::QueryContinuation => {
                let g = group();
                let lead = if op == Operator::Query { r"\?" } else { "&" };
                pattern.push_str(&format!("(?:{lead}(?P<{g}>[^#]*))?"));
                captures.push(Capture::Query {
                    group: g,
                    explode: expr.vars.iter().any(|v| v.explode),
                });
            }
        }
    }

    pattern.push('$');
    (pattern, captures)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn template(source: &str) -> UriTemplate {
        UriTemplate::new(source).unwrap()
    }

    mod parse_tests {
        use super::*;

        #[test]
        fn test_rejects_unclosed_expression() {
            let err = UriTemplate::new("/users{/id").unwrap_err();
            assert!(matches!(err, PrismError::InvalidTemplate { .. }));
        }

        #[test]
        fn test_rejects_empty_expression() {
            assert!(UriTemplate::new("/users{}").is_err());
        }

        #[test]
        fn test_rejects_reserved_operator() {
            assert!(UriTemplate::new("/users{=id}").is_err());
        }

        #[test]
        fn test_rejects_bad_prefix() {
            assert!(UriTemplate::new("{var:0}").is_err());
            assert!(UriTemplate::new("{var:abc}").is_err());
        }

        #[test]
        fn test_variables_in_order() {
            let t = template("{scheme}://{host}/users{/id}{?query*}");
            assert_eq!(t.variables(), vec!["scheme", "host", "id", "query"]);
        }

        #[test]
        fn test_is_templated() {
            assert!(UriTemplate::is_templated("/foos{/id}"));
            assert!(!UriTemplate::is_templated("/foos"));
        }
    }

    mod expand_tests {
        use super::*;

        #[test]
        fn test_users_template() {
            let t = template("/users{/username}{?query*}");
            let vars = Variables::new()
                .with("username", "foobar")
                .with("query", TemplateValue::map([("recent_posts", "true")]));
            assert_eq!(t.expand(&vars), "/users/foobar?recent_posts=true");

            let vars = Variables::new().with("username", "foobar");
            assert_eq!(t.expand(&vars), "/users/foobar");

            assert_eq!(t.expand(&Variables::new()), "/users");
        }

        #[test]
        fn test_missing_simple_variable_is_empty() {
            let t = template("/a/{missing}/b");
            assert_eq!(t.expand(&Variables::new()), "/a//b");
        }

        #[test]
        fn test_query_pairs_keep_insertion_order() {
            let t = template("/search{?query*}");
            let vars = Variables::new().with(
                "query",
                TemplateValue::map([("z", "1"), ("a", "2"), ("m", "3")]),
            );
            assert_eq!(t.expand(&vars), "/search?z=1&a=2&m=3");
        }

        #[test]
        fn test_empty_map_omits_query() {
            let t = template("/search{?query*}");
            let vars = Variables::new().with("query", TemplateValue::Map(vec![]));
            assert_eq!(t.expand(&vars), "/search");
        }

        #[test]
        fn test_values_are_percent_encoded() {
            let t = template("/users/{name}{?query*}");
            let vars = Variables::new()
                .with("name", "john doe/x")
                .with("query", TemplateValue::map([("q&a", "a b")]));
            assert_eq!(t.expand(&vars), "/users/john%20doe%2Fx?q%26a=a%20b");
        }

        #[test]
        fn test_reserved_expansion_keeps_slashes() {
            let t = template("{+base}/index");
            let vars = Variables::new().with("base", "http://example.com/home");
            assert_eq!(t.expand(&vars), "http://example.com/home/index");
        }

        #[test]
        fn test_rfc_level_three_examples() {
            let vars = Variables::new()
                .with("var", "value")
                .with("hello", "Hello World!")
                .with("x", "1024")
                .with("y", "768")
                .with("empty", "");
            assert_eq!(template("{x,y}").expand(&vars), "1024,768");
            assert_eq!(template("{#hello}").expand(&vars), "#Hello%20World!");
            assert_eq!(template("X{.var}").expand(&vars), "X.value");
            assert_eq!(template("{/var,x}/here").expand(&vars), "/value/1024/here");
            assert_eq!(template("{;x,y,empty}").expand(&vars), ";x=1024;y=768;empty");
            assert_eq!(template("{?x,y,empty}").expand(&vars), "?x=1024&y=768&empty=");
            assert_eq!(template("?fixed=yes{&x}").expand(&vars), "?fixed=yes&x=1024");
            assert_eq!(template("{var:3}").expand(&vars), "val");
        }

        #[test]
        fn test_list_expansion() {
            let vars = Variables::new().with("list", TemplateValue::list(["red", "green"]));
            assert_eq!(template("{list}").expand(&vars), "red,green");
            assert_eq!(template("{/list*}").expand(&vars), "/red/green");
            assert_eq!(template("{?list*}").expand(&vars), "?list=red&list=green");
        }

        #[test]
        fn test_numeric_values() {
            let t = template("/foos{/id}");
            assert_eq!(t.expand(&Variables::new().with("id", 28u64)), "/foos/28");
        }
    }

    mod extract_tests {
        use super::*;

        #[test]
        fn test_extracts_path_and_query() {
            let t = template("/users{/username}{?query*}");
            let found = t
                .extract_mapping("/users/foobar?recent_posts=true")
                .unwrap();
            assert_eq!(
                found,
                mappings([("username", "foobar"), ("recent_posts", "true")])
            );
        }

        #[test]
        fn test_optional_segments_may_be_absent() {
            let t = template("/users{/username}{?query*}");
            assert_eq!(t.extract_mapping("/users").unwrap(), Mappings::new());
        }

        #[test]
        fn test_query_order_is_irrelevant() {
            let t = template("/search{?q,page}");
            let a = t.extract_mapping("/search?q=rust&page=2").unwrap();
            let b = t.extract_mapping("/search?page=2&q=rust").unwrap();
            assert_eq!(a, b);
            assert_eq!(a.get("page").map(String::as_str), Some("2"));
        }

        #[test]
        fn test_undeclared_query_key_rejected_without_explode() {
            let t = template("/search{?q}");
            assert!(t.extract_mapping("/search?other=1").is_none());
        }

        #[test]
        fn test_no_match() {
            let t = template("/foos{/id}");
            assert!(t.extract_mapping("/bars/15").is_none());
            assert!(t.extract_mapping("/foos/15/extra").is_none());
        }

        #[test]
        fn test_decodes_values() {
            let t = template("/users/{name}");
            let found = t.extract_mapping("/users/john%20doe").unwrap();
            assert_eq!(found["name"], "john doe");
            let found = t.extract_mapping("/users/caf%C3%A9").unwrap();
            assert_eq!(found["name"], "café");
        }

        #[test]
        fn test_invalid_utf8_escape_does_not_match() {
            let t = template("/u/{name}");
            assert!(t.extract_mapping("/u/%FF").is_none());
            assert!(template("/files{/path*}").extract_mapping("/files/a/%C3").is_none());
        }

        #[test]
        fn test_relative_template_against_absolute_url() {
            let t = template("/foos{/id}");
            let found = t
                .extract_mapping("http://localhost:3000/foos/28")
                .unwrap();
            assert_eq!(found, mappings([("id", "28")]));
        }

        #[test]
        fn test_exploded_path_list() {
            let t = template("/files{/path*}");
            let found = t.extract_mapping("/files/a/b/c").unwrap();
            assert_eq!(found["path"], "a,b,c");
        }

        #[test]
        fn test_literal_regex_characters_are_escaped() {
            let t = template("/a.b+c{/id}");
            assert!(t.extract_mapping("/a.b+c/1").is_some());
            assert!(t.extract_mapping("/aXbbc/1").is_none());
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_expand_then_extract_recovers_bindings(
                username in "[a-zA-Z0-9_-]{1,12}",
                query in prop::collection::btree_map("[a-z]{1,6}", "[a-z0-9 ]{1,8}", 0..4)
            ) {
                let t = template("/users{/username}{?query*}");
                let vars = Variables::new()
                    .with("username", username.as_str())
                    .with("query", TemplateValue::map(query.clone()));

                let expanded = t.expand(&vars);
                let found = t.extract_mapping(&expanded);
                prop_assert!(found.is_some());

                let mut expected = query;
                expected.insert("username".to_string(), username);
                prop_assert_eq!(found.unwrap(), expected);
            }

            #[test]
            fn prop_path_params_round_trip(
                x in "[a-zA-Z0-9 é~_-]{1,8}",
                y in "[a-zA-Z0-9 é~_-]{1,8}"
            ) {
                let t = template("/map{;x,y}");
                let vars = Variables::new().with("x", x.as_str()).with("y", y.as_str());
                let found = t.extract_mapping(&t.expand(&vars));
                prop_assert_eq!(found, Some(mappings([("x", x), ("y", y)])));
            }

            #[test]
            fn prop_labels_round_trip(ext in "[a-zA-Z0-9 é~_-]{1,8}") {
                let t = template("/report{.ext}");
                let found = t.extract_mapping(&t.expand(&Variables::new().with("ext", ext.as_str())));
                prop_assert_eq!(found, Some(mappings([("ext", ext)])));
            }

            #[test]
            fn prop_reserved_round_trip(base in "[a-z0-9/:@!$'()*+,;=_.~-]{1,16}") {
                let t = template("{+base}/index");
                let found = t.extract_mapping(&t.expand(&Variables::new().with("base", base.as_str())));
                prop_assert_eq!(found, Some(mappings([("base", base)])));
            }

            #[test]
            fn prop_query_continuation_round_trip(x in "[a-zA-Z0-9 é~_-]{1,8}") {
                let t = template("/search?fixed=yes{&x}");
                let found = t.extract_mapping(&t.expand(&Variables::new().with("x", x.as_str())));
                prop_assert_eq!(found, Some(mappings([("x", x)])));
            }

            #[test]
            fn prop_fragment_round_trip(section in "[a-zA-Z0-9 /?=é~_-]{1,12}") {
                let t = template("/page{#section}");
                let found = t.extract_mapping(&t.expand(&Variables::new().with("section", section.as_str())));
                prop_assert_eq!(found, Some(mappings([("section", section)])));
            }

            #[test]
            fn prop_exploded_path_list_round_trip(
                segments in prop::collection::vec("[a-zA-Z0-9 é~_-]{1,6}", 1..5)
            ) {
                let t = template("/files{/segments*}");
                let vars = Variables::new().with("segments", TemplateValue::list(segments.clone()));
                let found = t.extract_mapping(&t.expand(&vars));
                prop_assert_eq!(found, Some(mappings([("segments", segments.join(","))])));
            }

            #[test]
            fn prop_expansion_has_no_braces(id in "[ -~]{0,20}") {
                let t = template("/foos{/id}{?id}");
                let out = t.expand(&Variables::new().with("id", id.as_str()));
                prop_assert!(!out.contains('{'), "expansion contains a brace: {}", out);
                prop_assert!(!out.contains(' '));
            }
        }
    }
}
