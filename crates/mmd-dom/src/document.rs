//! Document root, node addressing and queries.

use std::fmt;

use crate::error::ParseError;
use crate::node::{Element, Node};
use crate::parser::HtmlParser;
use crate::selector::Selector;
use crate::serializer::HtmlSerializer;

/// Position of a node as child indices from the document root.
///
/// The last index is the node's position among its siblings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    /// Build a path from child indices.
    #[must_use]
    pub fn new(indices: Vec<usize>) -> Self {
        Self(indices)
    }

    /// Child indices from the root.
    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    /// Index among siblings, `None` for the empty path.
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        self.0.last().copied()
    }

    /// Path of the parent element, `None` for top-level nodes.
    #[must_use]
    pub fn parent(&self) -> Option<NodePath> {
        match self.0.split_last() {
            Some((_, rest)) if !rest.is_empty() => Some(Self(rest.to_vec())),
            _ => None,
        }
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "/{}", parts.join("/"))
    }
}

/// A parsed page.
///
/// A `Document` only exists once parsing has completed, so holding one means
/// the structural markup is fully available.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document {
    pub children: Vec<Node>,
}

impl Document {
    /// Create a document from top-level nodes.
    #[must_use]
    pub fn new(children: Vec<Node>) -> Self {
        Self { children }
    }

    /// Parse an HTML page or fragment.
    pub fn parse(html: &str) -> Result<Self, ParseError> {
        HtmlParser::new().parse(html)
    }

    /// Serialize back to HTML.
    #[must_use]
    pub fn to_html(&self) -> String {
        HtmlSerializer::new().serialize(self)
    }

    /// Node at `path`.
    #[must_use]
    pub fn get(&self, path: &NodePath) -> Option<&Node> {
        let (first, rest) = path.indices().split_first()?;
        let mut node = self.children.get(*first)?;
        for &index in rest {
            node = node.as_element()?.children.get(index)?;
        }
        Some(node)
    }

    /// Mutable node at `path`.
    pub fn get_mut(&mut self, path: &NodePath) -> Option<&mut Node> {
        let (first, rest) = path.0.split_first()?;
        let mut node = self.children.get_mut(*first)?;
        for &index in rest {
            node = node.as_element_mut()?.children.get_mut(index)?;
        }
        Some(node)
    }

    /// Element at `path`, `None` if the node is missing or not an element.
    #[must_use]
    pub fn element(&self, path: &NodePath) -> Option<&Element> {
        self.get(path).and_then(Node::as_element)
    }

    /// Mutable element at `path`.
    pub fn element_mut(&mut self, path: &NodePath) -> Option<&mut Element> {
        self.get_mut(path).and_then(Node::as_element_mut)
    }

    /// Substitute `node` for the node at `path`, returning the old node.
    ///
    /// The replacement takes the same position among its siblings. Returns
    /// `None` (and leaves the tree untouched) if `path` does not resolve.
    pub fn replace(&mut self, path: &NodePath, node: Node) -> Option<Node> {
        let slot = self.get_mut(path)?;
        Some(std::mem::replace(slot, node))
    }

    /// Paths of all elements matching `selector`, in document order.
    #[must_use]
    pub fn select(&self, selector: &Selector) -> Vec<NodePath> {
        self.collect(selector, false)
    }

    /// Like [`select`](Self::select), but does not descend into matches.
    ///
    /// Use this before replacing matches: every returned path stays valid
    /// while earlier matches are substituted one-for-one.
    #[must_use]
    pub fn select_outermost(&self, selector: &Selector) -> Vec<NodePath> {
        self.collect(selector, true)
    }

    /// Path of the first element with the given tag, in document order.
    #[must_use]
    pub fn find_first(&self, tag: &str) -> Option<NodePath> {
        let selector = Selector::tag(tag);
        self.select(&selector).into_iter().next()
    }

    fn collect(&self, selector: &Selector, outermost: bool) -> Vec<NodePath> {
        let mut walk = Walk {
            selector,
            outermost,
            path: Vec::new(),
            ancestors: Vec::new(),
            found: Vec::new(),
        };
        walk.visit(&self.children);
        walk.found
    }
}

/// Depth-first traversal state for selector queries.
struct Walk<'a, 's> {
    selector: &'s Selector,
    outermost: bool,
    path: Vec<usize>,
    ancestors: Vec<&'a Element>,
    found: Vec<NodePath>,
}

impl<'a> Walk<'a, '_> {
    fn visit(&mut self, nodes: &'a [Node]) {
        for (index, node) in nodes.iter().enumerate() {
            let Node::Element(element) = node else {
                continue;
            };
            self.path.push(index);

            let hit = self.selector.matches(element, &self.ancestors);
            if hit {
                self.found.push(NodePath(self.path.clone()));
            }
            if !(hit && self.outermost) {
                self.ancestors.push(element);
                self.visit(&element.children);
                self.ancestors.pop();
            }

            self.path.pop();
        }
    }
}
