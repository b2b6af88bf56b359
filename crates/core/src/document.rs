//! HTML parsing and read-only tree access.
//!
//! This module provides the [`Document`] and [`Node`] types the extraction
//! engine runs against, and [`Query`], a CSS selector compiled once when a
//! schema is declared.
//!
//! # Example
//!
//! ```rust
//! use glean_core::{Document, Query};
//!
//! let html = r#"
//!     <html>
//!         <body>
//!             <h1>Title</h1>
//!             <p class="content">Paragraph</p>
//!         </body>
//!     </html>
//! "#;
//!
//! let doc = Document::parse(html);
//! let query = Query::new("p.content").unwrap();
//! let paragraph = doc.root().select_first(&query).unwrap();
//! assert_eq!(paragraph.text(), "Paragraph");
//! ```

use std::fmt;

use scraper::{ElementRef, Html, Selector};

use crate::{GleanError, Result};

/// A CSS selector compiled together with its source text.
///
/// The source text is kept for error messages: a failed `Select` reports
/// the selector exactly as it was declared.
#[derive(Clone)]
pub struct Query {
    source: String,
    selector: Selector,
}

impl Query {
    /// Compiles a CSS selector.
    ///
    /// # Errors
    ///
    /// Returns [`GleanError::InvalidSelector`] if the selector does not parse.
    pub fn new(selector: &str) -> Result<Self> {
        let compiled = Selector::parse(selector).map_err(|e| GleanError::InvalidSelector {
            selector: selector.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self { source: selector.to_string(), selector: compiled })
    }

    /// The selector as it was written.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Query").field(&self.source).finish()
    }
}

/// A parsed HTML document.
///
/// Documents are never mutated after parsing; every [`Node`] borrowed from
/// one is a read-only view.
pub struct Document {
    html: Html,
}

impl Document {
    /// Parses HTML from a string.
    ///
    /// HTML parsing is error-tolerant, so this never fails: malformed markup
    /// is repaired the way a browser would repair it.
    pub fn parse(html: &str) -> Self {
        Self { html: Html::parse_document(html) }
    }

    /// Parses HTML from a raw response body.
    ///
    /// Invalid UTF-8 sequences are replaced rather than rejected.
    pub fn from_bytes(body: &[u8]) -> Self {
        Self::parse(&String::from_utf8_lossy(body))
    }

    /// The root element (`<html>`) of the document.
    pub fn root(&self) -> Node<'_> {
        Node { element: self.html.root_element() }
    }

    /// Gets the entire HTML as a string.
    pub fn as_string(&self) -> String {
        self.html.html()
    }
}

/// A read-only view of a single element.
#[derive(Clone, Copy, Debug)]
pub struct Node<'a> {
    element: ElementRef<'a>,
}

impl<'a> Node<'a> {
    /// First descendant matching `query`, in document order.
    pub fn select_first(&self, query: &Query) -> Option<Node<'a>> {
        self.element.select(&query.selector).next().map(|element| Node { element })
    }

    /// All descendants matching `query`, in document order.
    pub fn select_all(&self, query: &Query) -> Vec<Node<'a>> {
        self.element.select(&query.selector).map(|element| Node { element }).collect()
    }

    /// Gets the value of an attribute.
    ///
    /// Returns `None` if the attribute is not present.
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.element.value().attr(name)
    }

    /// All attributes as `(name, value)` pairs.
    pub fn attributes(&self) -> Vec<(&'a str, &'a str)> {
        self.element.value().attrs().collect()
    }

    /// Concatenation of all text nodes below this element.
    pub fn text(&self) -> String {
        self.element.text().collect()
    }

    /// Gets the outer HTML of this element.
    pub fn outer_html(&self) -> String {
        self.element.html()
    }

    /// Gets the inner HTML of this element.
    pub fn inner_html(&self) -> String {
        self.element.inner_html()
    }

    /// Lowercase tag name (e.g. "div", "a", "h6").
    pub fn tag_name(&self) -> String {
        self.element.value().name().to_lowercase()
    }
}
