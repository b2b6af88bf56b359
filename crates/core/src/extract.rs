//! Declarative extraction specs and their resolver.
//!
//! An [`Extract`] describes how to derive one value from a context node:
//! select a node (or all matching nodes), then optionally read an
//! attribute, its text, or a regex match from it. Specs are built bottom-up
//! through a fluent API and are immutable afterwards, so one spec can be
//! resolved against many documents concurrently.
//!
//! # Example
//!
//! ```rust
//! use glean_core::{Document, Extract, Value};
//!
//! let doc = Document::parse(r#"<a class="kata" href="/kata/42">Two Sum</a>"#);
//!
//! let href = Extract::one("a.kata").unwrap().attr("href");
//! assert_eq!(href.resolve(doc.root(), "href").unwrap(), Value::Text("/kata/42".into()));
//!
//! let id = Extract::one("a.kata").unwrap().attr("href").regex(r"/kata/(\d+)").unwrap();
//! assert_eq!(id.resolve(doc.root(), "id").unwrap(), Value::Text("42".into()));
//! ```

use std::fmt;
use std::sync::Arc;

use regex::{Captures, Regex, RegexBuilder};

use crate::document::{Node, Query};
use crate::record::Value;
use crate::schema::Target;
use crate::{GleanError, Result};

/// Turns a regex match into the final value of a field.
pub type PostProcess = Arc<dyn Fn(&Captures<'_>) -> Result<Value> + Send + Sync>;

/// How to compute one value from a context node.
///
/// `Select` and `SelectAll` are leaves and run against the context node
/// directly. Every other variant has exactly one parent spec and works on
/// what the parent resolved to.
#[derive(Clone)]
pub enum Extract {
    /// First descendant matching the selector. No match is an error.
    Select(Query),
    /// All descendants matching the selector. No match is an empty list.
    SelectAll(Query),
    /// Named attribute of the parent's node(s).
    Attribute { parent: Box<Extract>, name: String },
    /// Text content of the parent's node(s).
    Text { parent: Box<Extract> },
    /// First match of `pattern` against the string form of the parent.
    Regex { parent: Box<Extract>, pattern: Regex, post_process: Option<PostProcess> },
}

/// Intermediate result while walking a spec chain.
enum Resolved<'a> {
    Node(Node<'a>),
    Nodes(Vec<Node<'a>>),
    Value(Value),
}

impl Extract {
    /// `Select`: the first element matching `selector`.
    pub fn one(selector: &str) -> Result<Self> {
        Ok(Extract::Select(Query::new(selector)?))
    }

    /// `SelectAll`: every element matching `selector`.
    pub fn many(selector: &str) -> Result<Self> {
        Ok(Extract::SelectAll(Query::new(selector)?))
    }

    pub fn attr(self, name: &str) -> Self {
        Extract::Attribute { parent: Box::new(self), name: name.to_string() }
    }

    pub fn text(self) -> Self {
        Extract::Text { parent: Box::new(self) }
    }

    /// Searches `pattern` in the parent's string form.
    ///
    /// The value is the first capture group when the pattern declares one,
    /// otherwise the whole match. The pattern runs in multi-line mode.
    pub fn regex(self, pattern: &str) -> Result<Self> {
        Ok(Extract::Regex { parent: Box::new(self), pattern: compile(pattern)?, post_process: None })
    }

    /// Like [`Extract::regex`], but `post_process` turns the match into the value.
    ///
    /// Errors returned by `post_process` reach the caller unchanged.
    pub fn regex_with<F>(self, pattern: &str, post_process: F) -> Result<Self>
    where
        F: Fn(&Captures<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        let post_process: PostProcess = Arc::new(post_process);
        Ok(Extract::Regex { parent: Box::new(self), pattern: compile(pattern)?, post_process: Some(post_process) })
    }

    /// Resolves the spec against `node` as a scalar field.
    ///
    /// `field` only labels errors.
    pub fn resolve(&self, node: Node<'_>, field: &str) -> Result<Value> {
        self.resolve_as(node, field, &Target::Scalar)
    }

    /// Resolves the spec against `node`, shaping the result by `target`.
    ///
    /// Nodes left at the end of the chain become their outer HTML for
    /// scalar targets and full nested records for record targets.
    pub fn resolve_as(&self, node: Node<'_>, field: &str, target: &Target) -> Result<Value> {
        let resolved = self.eval(node, field)?;
        shape(resolved, field, target)
    }

    fn eval<'a>(&self, node: Node<'a>, field: &str) -> Result<Resolved<'a>> {
        match self {
            Extract::Select(query) => node.select_first(query).map(Resolved::Node).ok_or_else(|| {
                GleanError::ExtractionNotFound { selector: query.as_str().to_string(), field: field.to_string() }
            }),
            Extract::SelectAll(query) => Ok(Resolved::Nodes(node.select_all(query))),
            Extract::Attribute { parent, name } => {
                let read = |n: Node<'a>| {
                    n.attr(name)
                        .map(Value::from)
                        .ok_or_else(|| GleanError::AttributeMissing { attribute: name.clone(), field: field.to_string() })
                };
                match parent.eval(node, field)? {
                    Resolved::Node(n) => read(n).map(Resolved::Value),
                    Resolved::Nodes(nodes) => each(nodes, read),
                    Resolved::Value(_) => Err(element_expected(field)),
                }
            }
            Extract::Text { parent } => match parent.eval(node, field)? {
                Resolved::Node(n) => Ok(Resolved::Value(Value::Text(n.text()))),
                Resolved::Nodes(nodes) => each(nodes, |n| Ok(Value::Text(n.text()))),
                Resolved::Value(_) => Err(element_expected(field)),
            },
            Extract::Regex { parent, pattern, post_process } => {
                let search = |input: &str| apply_regex(pattern, post_process.as_ref(), input, field);
                match parent.eval(node, field)? {
                    Resolved::Node(n) => search(&n.outer_html()).map(Resolved::Value),
                    Resolved::Nodes(nodes) => each(nodes, |n| search(&n.outer_html())),
                    Resolved::Value(Value::List(items)) => items
                        .iter()
                        .map(|item| search(&string_form(item, field)?))
                        .collect::<Result<Vec<_>>>()
                        .map(|values| Resolved::Value(Value::List(values))),
                    Resolved::Value(value) => search(&string_form(&value, field)?).map(Resolved::Value),
                }
            }
        }
    }
}

impl fmt::Debug for Extract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Extract::Select(query) => f.debug_tuple("Select").field(&query.as_str()).finish(),
            Extract::SelectAll(query) => f.debug_tuple("SelectAll").field(&query.as_str()).finish(),
            Extract::Attribute { parent, name } => {
                f.debug_struct("Attribute").field("parent", parent).field("name", name).finish()
            }
            Extract::Text { parent } => f.debug_struct("Text").field("parent", parent).finish(),
            Extract::Regex { parent, pattern, post_process } => f
                .debug_struct("Regex")
                .field("parent", parent)
                .field("pattern", &pattern.as_str())
                .field("post_process", &post_process.is_some())
                .finish(),
        }
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Ok(RegexBuilder::new(pattern).multi_line(true).build()?)
}

fn each<'a, F>(nodes: Vec<Node<'a>>, f: F) -> Result<Resolved<'a>>
where
    F: Fn(Node<'a>) -> Result<Value>,
{
    nodes.into_iter().map(f).collect::<Result<Vec<_>>>().map(|values| Resolved::Value(Value::List(values)))
}

fn apply_regex(pattern: &Regex, post_process: Option<&PostProcess>, input: &str, field: &str) -> Result<Value> {
    let captures = pattern.captures(input).ok_or_else(|| GleanError::PatternNotMatched {
        pattern: pattern.as_str().to_string(),
        field: field.to_string(),
    })?;

    if let Some(post_process) = post_process {
        return post_process(&captures).map(Value::normalized);
    }

    let matched = captures.get(1).or_else(|| captures.get(0)).map_or("", |m| m.as_str());
    Ok(Value::Text(matched.to_string()))
}

fn string_form(value: &Value, field: &str) -> Result<String> {
    match value {
        Value::Text(s) => Ok(s.clone()),
        Value::Json(serde_json::Value::String(s)) => Ok(s.clone()),
        Value::Json(json) => Ok(json.to_string()),
        Value::List(_) | Value::Record(_) => {
            Err(GleanError::TargetMismatch { field: field.to_string(), expected: "text to search" })
        }
    }
}

fn element_expected(field: &str) -> GleanError {
    GleanError::TargetMismatch { field: field.to_string(), expected: "an element" }
}

fn shape(resolved: Resolved<'_>, field: &str, target: &Target) -> Result<Value> {
    match (resolved, target) {
        (Resolved::Node(n), Target::Scalar) => Ok(Value::Text(n.outer_html())),
        (Resolved::Nodes(nodes), Target::Scalar) => {
            Ok(Value::List(nodes.iter().map(|n| Value::Text(n.outer_html())).collect()))
        }
        (Resolved::Value(value), Target::Scalar) => Ok(value),
        (Resolved::Node(n), Target::Record(schema)) => schema.resolve(n).map(Value::Record),
        (_, Target::Record(_)) => {
            Err(GleanError::TargetMismatch { field: field.to_string(), expected: "a single element" })
        }
        (Resolved::Nodes(nodes), Target::SequenceOf(inner)) => nodes
            .into_iter()
            .map(|n| shape(Resolved::Node(n), field, inner))
            .collect::<Result<Vec<_>>>()
            .map(Value::List),
        (Resolved::Value(Value::List(items)), Target::SequenceOf(inner)) => items
            .into_iter()
            .map(|item| shape(Resolved::Value(item), field, inner))
            .collect::<Result<Vec<_>>>()
            .map(Value::List),
        (_, Target::SequenceOf(_)) => {
            Err(GleanError::TargetMismatch { field: field.to_string(), expected: "a sequence" })
        }
    }
}
