//! Tolerant HTML parser built on `quick-xml`.

#![allow(clippy::unused_self)] // Unit struct methods have &self for API consistency

use std::collections::VecDeque;

use html_escape::decode_html_entities;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::document::Document;
use crate::error::ParseError;
use crate::node::{Element, Node, RAW_TEXT_ELEMENTS, is_void_tag};

/// Parse rendered HTML pages into a [`Document`].
///
/// Tag and attribute names are lowercased. End tags that close an open
/// ancestor implicitly close everything opened after it; end tags with no
/// open counterpart are dropped. Elements still open at the end of input are
/// closed.
pub struct HtmlParser;

impl HtmlParser {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Parse `html` into a document.
    ///
    /// # Errors
    ///
    /// Returns an error if the markup cannot be tokenized at all (for example
    /// an unterminated comment).
    pub fn parse(&self, html: &str) -> Result<Document, ParseError> {
        let (markup, mut raw_bodies) = split_raw_text(html);
        let markup = normalize_markup(&markup);
        let mut reader = Reader::from_str(&markup);
        let config = reader.config_mut();
        config.trim_text(false);
        config.check_end_names = false;
        config.allow_unmatched_ends = true;
        config.allow_dangling_amp = true;

        let mut tree = TreeBuilder::default();

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    let mut element = self.decode_element(&reader, &e);
                    if element.is_void() {
                        tree.append(Node::Element(element));
                    } else {
                        if element.is_raw_text()
                            && let Some(body) = raw_bodies.pop_front()
                            && !body.is_empty()
                        {
                            element.children.push(Node::Text(body));
                        }
                        tree.open(element);
                    }
                }
                Event::Empty(e) => {
                    let element = self.decode_element(&reader, &e);
                    tree.append(Node::Element(element));
                }
                Event::End(e) => {
                    let tag = self.decode_name(&reader, e.name().as_ref());
                    if !is_void_tag(&tag) {
                        tree.close(&tag);
                    }
                }
                Event::Text(e) => {
                    let text = reader.decoder().decode(&e)?;
                    tree.append(Node::Text(decode_html_entities(&text).into_owned()));
                }
                Event::GeneralRef(e) => {
                    let name = reader.decoder().decode(&e)?;
                    let reference = format!("&{name};");
                    tree.append(Node::Text(decode_html_entities(&reference).into_owned()));
                }
                Event::CData(e) => {
                    tree.append(Node::Text(String::from_utf8_lossy(&e).into_owned()));
                }
                Event::Comment(e) => {
                    let body = reader.decoder().decode(&e)?.into_owned();
                    tree.append(Node::Comment(body));
                }
                Event::DocType(e) => {
                    let body = reader.decoder().decode(&e)?;
                    tree.append(Node::Doctype(body.trim().to_owned()));
                }
                Event::Eof => break,
                Event::Decl(_) | Event::PI(_) => {}
            }
        }

        Ok(tree.finish())
    }

    fn decode_element<R>(&self, reader: &Reader<R>, e: &BytesStart) -> Element {
        Element {
            tag: self.decode_name(reader, e.name().as_ref()),
            attrs: self.decode_attrs(reader, e),
            children: Vec::new(),
        }
    }

    fn decode_name<R>(&self, reader: &Reader<R>, name: &[u8]) -> String {
        let name = reader
            .decoder()
            .decode(name)
            .unwrap_or_else(|_| String::from_utf8_lossy(name));
        name.to_ascii_lowercase()
    }

    fn decode_attrs<R>(&self, reader: &Reader<R>, e: &BytesStart) -> Vec<(String, String)> {
        let mut attrs: Vec<(String, String)> = Vec::new();
        for attr in e.html_attributes().flatten() {
            let key = self.decode_name(reader, attr.key.as_ref());
            if attrs.iter().any(|(existing, _)| *existing == key) {
                // First occurrence wins, as in browsers
                continue;
            }
            let raw = reader
                .decoder()
                .decode(&attr.value)
                .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value));
            let value = decode_html_entities(&raw).into_owned();
            attrs.push((key, value));
        }
        attrs
    }
}

impl Default for HtmlParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the tree from a flat event stream using a stack of open elements.
#[derive(Default)]
struct TreeBuilder {
    root: Vec<Node>,
    open: Vec<Element>,
}

impl TreeBuilder {
    /// Append a node to the innermost open element, merging adjacent text.
    fn append(&mut self, node: Node) {
        let children = match self.open.last_mut() {
            Some(parent) => &mut parent.children,
            None => &mut self.root,
        };
        if let (Node::Text(text), Some(Node::Text(previous))) = (&node, children.last_mut()) {
            previous.push_str(text);
            return;
        }
        children.push(node);
    }

    fn open(&mut self, element: Element) {
        self.open.push(element);
    }

    /// Close the innermost open element named `tag` and everything inside it.
    fn close(&mut self, tag: &str) {
        if let Some(pos) = self.open.iter().rposition(|element| element.tag == tag) {
            self.close_from(pos);
        }
    }

    fn close_from(&mut self, pos: usize) {
        let mut closed = self.open.split_off(pos);
        while let Some(element) = closed.pop() {
            match closed.last_mut() {
                Some(parent) => parent.children.push(Node::Element(element)),
                None => self.append(Node::Element(element)),
            }
        }
    }

    fn finish(mut self) -> Document {
        self.close_from(0);
        Document::new(self.root)
    }
}

/// Cut the bodies of `script` and `style` elements out of `html`.
///
/// Their content is not markup and must not be tokenized or entity-decoded.
/// Returns the remaining markup and the bodies in document order; the parser
/// reattaches them as it meets each raw-text start tag. Comments are skipped
/// so a commented-out `<script>` does not consume a body.
fn split_raw_text(html: &str) -> (String, VecDeque<String>) {
    let lower = html.to_ascii_lowercase();
    let mut markup = String::with_capacity(html.len());
    let mut bodies = VecDeque::new();
    let mut pos = 0;

    while let Some(offset) = lower[pos..].find('<') {
        let start = pos + offset;
        let rest = &lower[start..];

        if rest.starts_with("<!--") {
            let end = rest.find("-->").map_or(lower.len(), |i| start + i + 3);
            markup.push_str(&html[pos..end]);
            pos = end;
            continue;
        }

        let Some(tag) = RAW_TEXT_ELEMENTS.iter().find(|tag| opens_tag(rest, tag)) else {
            markup.push_str(&html[pos..=start]);
            pos = start + 1;
            continue;
        };
        let Some(open_end) = rest.find('>').map(|i| start + i + 1) else {
            break;
        };
        markup.push_str(&html[pos..open_end]);
        pos = open_end;
        if lower[..open_end].ends_with("/>") {
            continue;
        }

        let close = format!("</{tag}");
        let body_end = lower[open_end..]
            .find(&close)
            .map_or(lower.len(), |i| open_end + i);
        bodies.push_back(html[open_end..body_end].to_owned());
        pos = body_end;
    }

    markup.push_str(&html[pos..]);
    (markup, bodies)
}

/// Whether lowercased `rest` starts with an opening tag named `tag`.
fn opens_tag(rest: &str, tag: &str) -> bool {
    rest.strip_prefix('<')
        .and_then(|r| r.strip_prefix(tag))
        .is_some_and(|r| r.starts_with(|c: char| c.is_ascii_whitespace() || c == '>' || c == '/'))
}

/// Rewrite tag syntax that HTML allows but the XML tokenizer rejects.
///
/// Every attribute value is written double-quoted, so unquoted and
/// single-quoted values survive. A `<` that does not open a well-formed tag,
/// end tag, comment or declaration is text and becomes `&lt;`; this covers a
/// stray `a < b`, a tag that never closes, and diagram text like `x<y"`.
fn normalize_markup(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    let mut pos = 0;

    while let Some(offset) = markup[pos..].find('<') {
        let start = pos + offset;
        out.push_str(&markup[pos..start]);
        let rest = &markup[start..];

        let consumed = if rest.starts_with("<!--") {
            Some(copy_through(rest, "-->", &mut out))
        } else if rest.starts_with("<![CDATA[") {
            Some(copy_through(rest, "]]>", &mut out))
        } else if rest.starts_with("<!") || rest.starts_with("<?") {
            Some(copy_through(rest, ">", &mut out))
        } else {
            rewrite_tag(rest).map(|(tag, len)| {
                out.push_str(&tag);
                len
            })
        };

        match consumed {
            Some(len) => pos = start + len,
            None => {
                out.push_str("&lt;");
                pos = start + 1;
            }
        }
    }

    out.push_str(&markup[pos..]);
    out
}

/// Copy `rest` up to and including `terminator`, or all of it when the
/// terminator is missing (the tokenizer then reports the construct).
fn copy_through(rest: &str, terminator: &str, out: &mut String) -> usize {
    let len = rest
        .find(terminator)
        .map_or(rest.len(), |i| i + terminator.len());
    out.push_str(&rest[..len]);
    len
}

/// Rewrite the tag at the start of `rest` into canonical form.
///
/// Returns the rewritten tag and the number of bytes it consumed, or `None`
/// if `rest` does not start with a complete tag.
fn rewrite_tag(rest: &str) -> Option<(String, usize)> {
    let bytes = rest.as_bytes();
    let closing = bytes.get(1) == Some(&b'/');
    let name_start = if closing { 2 } else { 1 };
    if !bytes.get(name_start).is_some_and(u8::is_ascii_alphabetic) {
        return None;
    }
    let mut i = name_start;
    while bytes.get(i).is_some_and(|&b| is_name_byte(b)) {
        i += 1;
    }
    let name = &rest[name_start..i];
    if !bytes
        .get(i)
        .is_some_and(|&b| b.is_ascii_whitespace() || b == b'/' || b == b'>')
    {
        return None;
    }

    if closing {
        // Anything between the name and `>` is dropped, as browsers do
        let end = i + rest[i..].find('>')?;
        return Some((format!("</{name}>"), end + 1));
    }

    let mut tag = format!("<{name}");
    loop {
        while bytes.get(i).is_some_and(u8::is_ascii_whitespace) {
            i += 1;
        }
        match *bytes.get(i)? {
            b'>' => {
                tag.push('>');
                return Some((tag, i + 1));
            }
            b'/' if bytes.get(i + 1) == Some(&b'>') => {
                tag.push_str("/>");
                return Some((tag, i + 2));
            }
            b'/' | b'=' => {
                i += 1;
                continue;
            }
            _ => {}
        }

        let attr_start = i;
        while bytes
            .get(i)
            .is_some_and(|&b| !b.is_ascii_whitespace() && !matches!(b, b'=' | b'>' | b'/'))
        {
            i += 1;
        }
        let attr = &rest[attr_start..i];

        let mut j = i;
        while bytes.get(j).is_some_and(u8::is_ascii_whitespace) {
            j += 1;
        }
        let value = if bytes.get(j) == Some(&b'=') {
            j += 1;
            while bytes.get(j).is_some_and(u8::is_ascii_whitespace) {
                j += 1;
            }
            let value = match *bytes.get(j)? {
                quote @ (b'"' | b'\'') => {
                    let len = rest[j + 1..].find(char::from(quote))?;
                    let value = &rest[j + 1..j + 1 + len];
                    i = j + len + 2;
                    value
                }
                _ => {
                    let value_start = j;
                    while bytes
                        .get(j)
                        .is_some_and(|&b| !b.is_ascii_whitespace() && b != b'>')
                    {
                        j += 1;
                    }
                    i = j;
                    &rest[value_start..j]
                }
            };
            Some(value)
        } else {
            None
        };

        // Quotes in a name would reopen a quoted run inside the tag
        if attr.contains(['"', '\'', '<']) {
            continue;
        }
        tag.push(' ');
        tag.push_str(attr);
        if let Some(value) = value {
            tag.push_str("=\"");
            tag.push_str(&value.replace('"', "&quot;").replace('<', "&lt;"));
            tag.push('"');
        }
    }
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':' | b'.')
}
