//! HTML serializer.

#![allow(clippy::unused_self)] // Unit struct methods have &self for API consistency

use crate::document::Document;
use crate::node::{Element, Node};

/// Serialize a [`Document`] back to HTML.
///
/// Void elements are written without an end tag, every other element gets
/// an explicit one. Text is escaped except inside `script` and `style`;
/// [`Node::Raw`] content is written unchanged.
pub struct HtmlSerializer;

impl HtmlSerializer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Serialize the whole document.
    pub fn serialize(&self, document: &Document) -> String {
        let mut out = String::with_capacity(4096);
        for node in &document.children {
            write_node(node, false, &mut out);
        }
        out
    }

    /// Serialize a single node and its subtree.
    pub fn serialize_node(&self, node: &Node) -> String {
        let mut out = String::new();
        write_node(node, false, &mut out);
        out
    }
}

impl Default for HtmlSerializer {
    fn default() -> Self {
        Self::new()
    }
}

fn write_node(node: &Node, raw_text: bool, out: &mut String) {
    match node {
        Node::Element(element) => write_element(element, out),
        Node::Text(text) if raw_text => out.push_str(text),
        Node::Text(text) => escape_into(text, false, out),
        Node::Comment(body) => {
            out.push_str("<!--");
            out.push_str(body);
            out.push_str("-->");
        }
        Node::Doctype(body) => {
            out.push_str("<!DOCTYPE ");
            out.push_str(body);
            out.push('>');
        }
        Node::Raw(markup) => out.push_str(markup),
    }
}

fn write_element(element: &Element, out: &mut String) {
    out.push('<');
    out.push_str(&element.tag);
    for (key, value) in &element.attrs {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        escape_into(value, true, out);
        out.push('"');
    }
    out.push('>');

    if element.is_void() && element.children.is_empty() {
        return;
    }

    let raw_text = element.is_raw_text();
    for child in &element.children {
        write_node(child, raw_text, out);
    }

    out.push_str("</");
    out.push_str(&element.tag);
    out.push('>');
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}
