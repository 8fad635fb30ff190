//! Minimal HTML document tree for diagram activation.
//!
//! Pages produced by a documentation build are parsed into an owned
//! [`Document`], queried with a small CSS-like [`Selector`], mutated by
//! replacing nodes in place, and serialized back to HTML.
//!
//! The parser is tolerant of the markup typical renderers emit: a doctype,
//! void elements with or without `/>`, valueless attributes, raw-text
//! `script`/`style` bodies, unquoted attribute values, a stray `<` in text,
//! every named HTML entity and unmatched end tags.
//!
//! # Example
//!
//! ```
//! use mmd_dom::{Document, Node, Selector};
//!
//! let mut doc = Document::parse(
//!     r#"<pre><code class="language-mermaid">graph TD; A--&gt;B;</code></pre>"#,
//! )
//! .unwrap();
//! let selector = Selector::parse("pre code.language-mermaid").unwrap();
//!
//! let paths = doc.select(&selector);
//! assert_eq!(paths.len(), 1);
//! assert_eq!(doc.get(&paths[0]).unwrap().text_content(), "graph TD; A-->B;");
//!
//! doc.replace(&paths[0], Node::text("replaced"));
//! assert_eq!(doc.to_html(), "<pre>replaced</pre>");
//! ```

mod document;
mod error;
mod node;
mod parser;
mod selector;
mod serializer;

pub use document::{Document, NodePath};
pub use error::{ParseError, SelectorError};
pub use node::{Element, Node};
pub use parser::HtmlParser;
pub use selector::Selector;
pub use serializer::HtmlSerializer;
