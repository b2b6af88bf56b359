//! Record schemas.
//!
//! A [`Schema`] is the ordered list of fields of one record kind, each with
//! an [`Extract`] spec and a [`Target`] saying what shape the value takes.
//! Schemas are built once through [`SchemaBuilder`] and shared read-only
//! afterwards.
//!
//! Typed record kinds implement [`Page`], which memoizes the schema in a
//! [`SchemaCell`] and converts resolved records into Rust structs.
//!
//! # Example
//!
//! ```rust
//! use glean_core::{Document, Extract, Schema};
//!
//! let schema = Schema::builder("article")
//!     .field("title", Extract::one(".title").unwrap().text())
//!     .field("tags", Extract::many(".tag").unwrap().text())
//!     .build()
//!     .unwrap();
//!
//! let doc = Document::parse(r#"<h1 class="title">Hello</h1><b class="tag">a</b><b class="tag">b</b>"#);
//! let record = schema.resolve(doc.root()).unwrap();
//! assert_eq!(record.text("title"), Some("Hello"));
//! assert_eq!(record.list("tags").map(|tags| tags.len()), Some(2));
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::document::{Document, Node};
use crate::extract::Extract;
use crate::record::Record;
use crate::{GleanError, Result};

/// What shape a field's value takes.
#[derive(Debug, Clone)]
pub enum Target {
    /// Text, JSON, or a list of those. Nodes become their outer HTML.
    Scalar,
    /// A nested record resolved against the selected node.
    Record(Arc<Schema>),
    /// One element of the inner target per matched node.
    SequenceOf(Box<Target>),
}

impl Target {
    /// Shorthand for `SequenceOf(Record(schema))`.
    pub fn records(schema: Arc<Schema>) -> Self {
        Target::SequenceOf(Box::new(Target::Record(schema)))
    }
}

/// One declared field.
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub target: Target,
    pub extract: Extract,
}

/// The ordered fields of one record kind.
#[derive(Debug, Clone)]
pub struct Schema {
    kind: String,
    fields: Vec<Field>,
}

impl Schema {
    /// Starts declaring a record kind.
    pub fn builder(kind: &str) -> SchemaBuilder {
        SchemaBuilder::new(kind)
    }

    /// Name of the record kind, used in logs.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Resolves every field against `node`, in declaration order.
    ///
    /// The first failing field aborts resolution; there are no partial records.
    pub fn resolve(&self, node: Node<'_>) -> Result<Record> {
        let mut record = Record::new();
        for field in &self.fields {
            let value = field.extract.resolve_as(node, &field.name, &field.target)?;
            record.insert(field.name.clone(), value);
        }
        Ok(record)
    }

    /// Parses `html` and resolves the schema against its root.
    pub fn resolve_html(&self, html: &str) -> Result<Record> {
        let doc = Document::parse(html);
        self.resolve(doc.root())
    }
}

/// Builder for [`Schema`].
///
/// Field specs are usually built inline with `Extract::one(..)?`; an
/// invalid selector therefore fails before the builder is ever reached.
pub struct SchemaBuilder {
    kind: String,
    fields: Vec<Field>,
}

impl SchemaBuilder {
    pub fn new(kind: &str) -> Self {
        Self { kind: kind.to_string(), fields: Vec::new() }
    }

    /// Declares a scalar field.
    pub fn field(self, name: &str, extract: Extract) -> Self {
        self.field_as(name, extract, Target::Scalar)
    }

    /// Declares a field holding one nested record.
    pub fn record(self, name: &str, extract: Extract, schema: Arc<Schema>) -> Self {
        self.field_as(name, extract, Target::Record(schema))
    }

    /// Declares a field holding one nested record per matched node.
    pub fn records(self, name: &str, extract: Extract, schema: Arc<Schema>) -> Self {
        self.field_as(name, extract, Target::records(schema))
    }

    /// Declares a field with an explicit target.
    pub fn field_as(mut self, name: &str, extract: Extract, target: Target) -> Self {
        self.fields.push(Field { name: name.to_string(), target, extract });
        self
    }

    /// Finishes the declaration.
    ///
    /// # Errors
    ///
    /// Returns [`GleanError::ConfigError`] if a field name is declared twice.
    pub fn build(self) -> Result<Schema> {
        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(GleanError::ConfigError(format!(
                    "field `{}` declared twice in schema `{}`",
                    field.name, self.kind
                )));
            }
        }

        Ok(Schema { kind: self.kind, fields: self.fields })
    }
}

/// Process-wide memo for a record kind's schema.
///
/// Only a successfully built schema is stored; a failed build is retried on
/// the next access. Threads racing on first access wait for a single build.
pub struct SchemaCell(OnceCell<Arc<Schema>>);

impl SchemaCell {
    pub const fn new() -> Self {
        Self(OnceCell::new())
    }

    /// Returns the stored schema, building it with `init` on first access.
    pub fn get_or_try_init<F>(&self, init: F) -> Result<Arc<Schema>>
    where
        F: FnOnce() -> Result<Schema>,
    {
        self.0.get_or_try_init(|| init().map(Arc::new)).map(Arc::clone)
    }
}

impl Default for SchemaCell {
    fn default() -> Self {
        Self::new()
    }
}

/// A typed record kind.
///
/// Implementors declare their schema once and convert the resolved
/// [`Record`] into themselves.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use glean_core::{Extract, Page, Record, Result, Schema, SchemaCell};
///
/// struct LoginPage {
///     token: String,
/// }
///
/// impl Page for LoginPage {
///     fn schema() -> Result<Arc<Schema>> {
///         static SCHEMA: SchemaCell = SchemaCell::new();
///         SCHEMA.get_or_try_init(|| {
///             Schema::builder("login")
///                 .field("token", Extract::one(r#"input[name="token"]"#)?.attr("value"))
///                 .build()
///         })
///     }
///
///     fn from_record(mut record: Record) -> Result<Self> {
///         Ok(Self { token: record.take_text("token")? })
///     }
/// }
///
/// let page = LoginPage::parse(r#"<form><input name="token" value="abc"></form>"#).unwrap();
/// assert_eq!(page.token, "abc");
/// ```
pub trait Page: Sized {
    /// The memoized schema of this record kind.
    fn schema() -> Result<Arc<Schema>>;

    /// Builds the typed value from a resolved record.
    fn from_record(record: Record) -> Result<Self>;

    /// Runs after declarative resolution with the same context node.
    ///
    /// For data that does not fit a declarative spec, such as
    /// interleaved headings and code blocks.
    fn post_init(&mut self, _context: Node<'_>) -> Result<()> {
        Ok(())
    }

    /// Resolves the page against `node`.
    fn from_node(node: Node<'_>) -> Result<Self> {
        let record = Self::schema()?.resolve(node)?;
        let mut page = Self::from_record(record)?;
        page.post_init(node)?;
        Ok(page)
    }

    /// Parses `html` and resolves the page against the document root.
    fn parse(html: &str) -> Result<Self> {
        let doc = Document::parse(html);
        Self::from_node(doc.root())
    }

    /// Parses a raw response body.
    fn parse_bytes(body: &[u8]) -> Result<Self> {
        let doc = Document::from_bytes(body);
        Self::from_node(doc.root())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const BOOK: &str = r#"
        <div class="book">
            <h1 class="title">Solutions</h1>
            <section class="chapter" data-level="easy">
                <h2>Easy</h2>
                <a class="task" href="/t/1">One</a>
                <a class="task" href="/t/2">Two</a>
            </section>
            <section class="chapter" data-level="hard">
                <h2>Hard</h2>
                <a class="task" href="/t/3">Three</a>
            </section>
        </div>
    "#;

    fn task_schema() -> Arc<Schema> {
        Arc::new(
            Schema::builder("task")
                .field("name", Extract::one("a").unwrap().text())
                .field("href", Extract::one("a").unwrap().attr("href"))
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_resolve_in_declaration_order() {
        let schema = Schema::builder("book")
            .field("title", Extract::one(".title").unwrap().text())
            .field("levels", Extract::many(".chapter").unwrap().attr("data-level"))
            .build()
            .unwrap();

        let record = schema.resolve_html(BOOK).unwrap();
        assert_eq!(record.names().collect::<Vec<_>>(), vec!["title", "levels"]);
        assert_eq!(record.list("levels").unwrap(), &[Value::from("easy"), Value::from("hard")]);
    }

    #[test]
    fn test_nested_records_in_document_order() {
        let chapter = Arc::new(
            Schema::builder("chapter")
                .field("name", Extract::one("h2").unwrap().text())
                .field("tasks", Extract::many(".task").unwrap().attr("href"))
                .build()
                .unwrap(),
        );
        let book = Schema::builder("book").records("chapters", Extract::many(".chapter").unwrap(), chapter).build().unwrap();

        let mut record = book.resolve_html(BOOK).unwrap();
        let chapters = record.take_records("chapters").unwrap();
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].text("name"), Some("Easy"));
        assert_eq!(chapters[0].list("tasks").unwrap().len(), 2);
        assert_eq!(chapters[1].list("tasks").unwrap(), &[Value::from("/t/3")]);
    }

    #[test]
    fn test_single_nested_record() {
        let schema = Schema::builder("book")
            .record("first", Extract::one(".chapter").unwrap(), task_schema())
            .build()
            .unwrap();

        let record = schema.resolve_html(BOOK).unwrap();
        let first = record.get("first").and_then(Value::as_record).unwrap();
        assert_eq!(first.text("name"), Some("One"));
        assert_eq!(first.text("href"), Some("/t/1"));
    }

    #[test]
    fn test_nested_failure_fails_whole_record() {
        let needs_footer = Arc::new(
            Schema::builder("chapter").field("footer", Extract::one("footer").unwrap().text()).build().unwrap(),
        );
        let schema =
            Schema::builder("book").records("chapters", Extract::many(".chapter").unwrap(), needs_footer).build().unwrap();

        let err = schema.resolve_html(BOOK).unwrap_err();
        assert!(matches!(err, GleanError::ExtractionNotFound { ref selector, .. } if selector == "footer"));
    }

    #[test]
    fn test_first_error_wins() {
        let schema = Schema::builder("book")
            .field("missing_a", Extract::one(".a").unwrap())
            .field("missing_b", Extract::one(".b").unwrap())
            .build()
            .unwrap();

        let err = schema.resolve_html(BOOK).unwrap_err();
        assert!(matches!(err, GleanError::ExtractionNotFound { ref field, .. } if field == "missing_a"));
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let result = Schema::builder("book")
            .field("title", Extract::one(".title").unwrap())
            .field("title", Extract::one("h1").unwrap())
            .build();
        assert!(matches!(result, Err(GleanError::ConfigError(_))));
    }

    #[test]
    fn test_record_target_on_list_is_mismatch() {
        let schema =
            Schema::builder("book").record("task", Extract::many(".task").unwrap(), task_schema()).build().unwrap();
        assert!(matches!(schema.resolve_html(BOOK), Err(GleanError::TargetMismatch { .. })));
    }

    #[test]
    fn test_schema_cell_builds_once() {
        static CELL: SchemaCell = SchemaCell::new();
        static BUILDS: AtomicUsize = AtomicUsize::new(0);

        let build = || {
            BUILDS.fetch_add(1, Ordering::SeqCst);
            Schema::builder("once").field("title", Extract::one(".title")?.text()).build()
        };

        let first = CELL.get_or_try_init(build).unwrap();
        let second = CELL.get_or_try_init(build).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(BUILDS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_schema_cell_racing_threads_build_once() {
        static CELL: SchemaCell = SchemaCell::new();
        static BUILDS: AtomicUsize = AtomicUsize::new(0);
        let barrier = Arc::new(std::sync::Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    CELL.get_or_try_init(|| {
                        BUILDS.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(std::time::Duration::from_millis(20));
                        Schema::builder("race").field("title", Extract::one(".title")?.text()).build()
                    })
                    .unwrap()
                })
            })
            .collect();

        let schemas: Vec<_> = handles.into_iter().map(|handle| handle.join().unwrap()).collect();
        assert!(schemas.iter().all(|schema| Arc::ptr_eq(schema, &schemas[0])));
        assert_eq!(BUILDS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_schema_cell_does_not_store_errors() {
        let cell = SchemaCell::new();
        assert!(cell.get_or_try_init(|| Schema::builder("bad").field("x", Extract::one("[[")?).build()).is_err());
        assert!(cell.get_or_try_init(|| Schema::builder("good").build()).is_ok());
    }
}
