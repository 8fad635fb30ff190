//! A small CSS selector subset.
//!
//! Supported: type selectors (`pre`, `*`), class selectors (`.language-mermaid`),
//! compounds of both (`code.a.b`), and the descendant (` `) and child (`>`)
//! combinators. That is enough to express markup conventions such as
//! `pre code.language-mermaid` or `pre > code.language-mermaid`.

use std::fmt;
use std::str::FromStr;

use crate::error::SelectorError;
use crate::node::Element;

/// Relation between a compound and the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

/// `tag.class1.class2`; `None` tag matches any element.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    classes: Vec<String>,
}

impl Compound {
    fn matches(&self, element: &Element) -> bool {
        self.tag.as_deref().is_none_or(|tag| element.tag == tag)
            && self.classes.iter().all(|class| element.has_class(class))
    }
}

impl fmt::Display for Compound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.tag, self.classes.is_empty()) {
            (Some(tag), _) => f.write_str(tag)?,
            (None, true) => f.write_str("*")?,
            (None, false) => {}
        }
        for class in &self.classes {
            write!(f, ".{class}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    /// Ignored for the first step.
    combinator: Combinator,
    compound: Compound,
}

/// A compiled selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    steps: Vec<Step>,
}

impl Selector {
    /// Compile selector text.
    pub fn parse(text: &str) -> Result<Self, SelectorError> {
        let error = |reason| SelectorError {
            selector: text.to_owned(),
            reason,
        };

        let spaced = text.replace('>', " > ");
        let mut steps = Vec::new();
        let mut pending = Combinator::Descendant;
        let mut saw_child = false;

        for token in spaced.split_whitespace() {
            if token == ">" {
                if steps.is_empty() {
                    return Err(error("leading `>` combinator"));
                }
                if saw_child {
                    return Err(error("repeated `>` combinator"));
                }
                pending = Combinator::Child;
                saw_child = true;
                continue;
            }
            steps.push(Step {
                combinator: pending,
                compound: parse_compound(token).map_err(error)?,
            });
            pending = Combinator::Descendant;
            saw_child = false;
        }

        if saw_child {
            return Err(error("trailing `>` combinator"));
        }
        if steps.is_empty() {
            return Err(error("empty selector"));
        }
        Ok(Self { steps })
    }

    /// Selector matching every element with the given tag.
    #[must_use]
    pub fn tag(tag: &str) -> Self {
        Self {
            steps: vec![Step {
                combinator: Combinator::Descendant,
                compound: Compound {
                    tag: Some(tag.to_ascii_lowercase()),
                    classes: Vec::new(),
                },
            }],
        }
    }

    /// Whether `element`, whose ancestors are `ancestors` (outermost first),
    /// matches this selector.
    #[must_use]
    pub fn matches(&self, element: &Element, ancestors: &[&Element]) -> bool {
        let Some((last, rest)) = self.steps.split_last() else {
            return false;
        };
        last.compound.matches(element) && match_ancestors(rest, last.combinator, ancestors)
    }
}

/// Match the remaining `steps` (right to left) against `ancestors`, where
/// `combinator` relates the last of `steps` to the element already matched.
fn match_ancestors(steps: &[Step], combinator: Combinator, ancestors: &[&Element]) -> bool {
    let Some((step, rest)) = steps.split_last() else {
        return true;
    };
    match combinator {
        Combinator::Child => {
            let Some((parent, above)) = ancestors.split_last() else {
                return false;
            };
            step.compound.matches(parent) && match_ancestors(rest, step.combinator, above)
        }
        Combinator::Descendant => (0..ancestors.len()).rev().any(|i| {
            step.compound.matches(ancestors[i])
                && match_ancestors(rest, step.combinator, &ancestors[..i])
        }),
    }
}

fn parse_compound(token: &str) -> Result<Compound, &'static str> {
    let mut parts = token.split('.');
    let tag = match parts.next() {
        Some("" | "*") => None,
        Some(tag) if is_identifier(tag) => Some(tag.to_ascii_lowercase()),
        _ => return Err("invalid tag name"),
    };

    let classes = parts
        .map(|class| {
            if is_identifier(class) {
                Ok(class.to_owned())
            } else {
                Err("invalid class name")
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    if tag.is_none() && classes.is_empty() && token != "*" {
        return Err("empty compound selector");
    }
    Ok(Compound { tag, classes })
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                match step.combinator {
                    Combinator::Descendant => f.write_str(" ")?,
                    Combinator::Child => f.write_str(" > ")?,
                }
            }
            write!(f, "{}", step.compound)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pre() -> Element {
        Element::new("pre")
    }

    fn mermaid_code() -> Element {
        Element::new("code").with_attr("class", "language-mermaid")
    }

    #[test]
    fn test_descendant_combinator() {
        let selector = Selector::parse("pre code.language-mermaid").unwrap();
        let div = Element::new("div");
        let pre = pre();
        let code = mermaid_code();

        assert!(selector.matches(&code, &[&pre]));
        assert!(selector.matches(&code, &[&pre, &div]));
        assert!(!selector.matches(&code, &[&div]));
        assert!(!selector.matches(&Element::new("code"), &[&pre]));
    }

    #[test]
    fn test_child_combinator() {
        let selector = Selector::parse("pre > code.language-mermaid").unwrap();
        let div = Element::new("div");
        let pre = pre();
        let code = mermaid_code();

        assert!(selector.matches(&code, &[&div, &pre]));
        assert!(!selector.matches(&code, &[&pre, &div]));
    }

    #[test]
    fn test_combinators_backtrack() {
        // `a > b c`: the first `b` ancestor has no `a` parent, the second does.
        let selector = Selector::parse("a > b c").unwrap();
        let a = Element::new("a");
        let b = Element::new("b");
        let x = Element::new("x");
        let c = Element::new("c");

        assert!(selector.matches(&c, &[&a, &b, &x, &b]));
        assert!(!selector.matches(&c, &[&x, &b]));
    }

    #[test]
    fn test_class_only_and_universal() {
        let by_class = Selector::parse(".mermaid").unwrap();
        let any = Selector::parse("*").unwrap();
        let div = Element::new("div").with_attr("class", "mermaid");

        assert!(by_class.matches(&div, &[]));
        assert!(any.matches(&div, &[]));
        assert!(!by_class.matches(&Element::new("div"), &[]));
    }

    #[test]
    fn test_multiple_classes_required() {
        let selector = Selector::parse("div.mermaid.ready").unwrap();
        let partial = Element::new("div").with_attr("class", "mermaid");
        let full = Element::new("div").with_attr("class", "ready mermaid");

        assert!(!selector.matches(&partial, &[]));
        assert!(selector.matches(&full, &[]));
    }

    #[test]
    fn test_tag_match_is_case_insensitive_on_selector() {
        let selector = Selector::parse("PRE CODE").unwrap();
        assert!(selector.matches(&Element::new("code"), &[&pre()]));
    }

    #[test]
    fn test_invalid_selectors() {
        for text in ["", "   ", "> code", "pre >", "pre > > code", "pre.", "pre..x", "p#id"] {
            assert!(Selector::parse(text).is_err(), "{text:?} should be rejected");
        }
    }

    #[test]
    fn test_display_normalizes() {
        let selector: Selector = "pre>code.language-mermaid".parse().unwrap();
        assert_eq!(selector.to_string(), "pre > code.language-mermaid");
    }
}
