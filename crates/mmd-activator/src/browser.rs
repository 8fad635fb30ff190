//! Library backend that defers rendering to the browser.
//!
//! The render pass does not draw anything itself. It makes sure a page with
//! diagram containers carries one module script that imports the library,
//! applies the stored configuration and runs the library over every
//! container once the page loads. Pages without containers are left alone.

use std::sync::{PoisonError, RwLock};

use mmd_dom::{Document, Element, Node, Selector};

use crate::activator::CONTAINER_SELECTOR;
use crate::config::LibraryConfig;
use crate::consts::{INJECTED_ATTR, INJECTED_SCRIPT, PROCESSED_ATTR};
use crate::library::{DiagramLibrary, RenderSummary};

/// [`DiagramLibrary`] rendered client-side from a module specifier.
#[derive(Debug)]
pub struct BrowserLibrary {
    specifier: String,
    digest: Option<String>,
    config: RwLock<LibraryConfig>,
}

impl BrowserLibrary {
    /// Library imported from `specifier` (URL or bare module name).
    pub fn new(specifier: impl Into<String>) -> Self {
        Self {
            specifier: specifier.into(),
            digest: None,
            config: RwLock::new(LibraryConfig::default()),
        }
    }

    /// Record the SHA-256 of the bundle that was verified at load time.
    #[must_use]
    pub fn with_digest(mut self, digest: impl Into<String>) -> Self {
        self.digest = Some(digest.into());
        self
    }

    #[must_use]
    pub fn specifier(&self) -> &str {
        &self.specifier
    }

    #[must_use]
    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    fn bootstrap_script(&self, config: &LibraryConfig) -> String {
        let specifier = serde_json::Value::from(self.specifier.as_str()).to_string();
        let script = format!(
            "import mermaid from {specifier};\nmermaid.initialize({});\nawait mermaid.run();\n",
            config.to_json()
        );
        // Keep the body from closing the script element early.
        script.replace("</", "<\\/")
    }
}

impl DiagramLibrary for BrowserLibrary {
    fn name(&self) -> &'static str {
        "browser"
    }

    fn initialize(&self, config: &LibraryConfig) {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = *config;
    }

    fn init(&self, document: &mut Document) -> RenderSummary {
        let containers = document.select_outermost(&CONTAINER_SELECTOR);
        let deferred = containers
            .iter()
            .filter_map(|path| document.element(path))
            .filter(|container| container.attr(PROCESSED_ATTR).is_none())
            .count();

        let config = *self.config.read().unwrap_or_else(PoisonError::into_inner);
        let script = self.bootstrap_script(&config);

        match injected_script(document) {
            None if containers.is_empty() => {
                tracing::debug!("no diagram containers, bootstrap script not needed");
            }
            Some(existing) => {
                existing.children = vec![Node::text(script)];
                tracing::debug!("bootstrap script already present, refreshed");
            }
            None => {
                let element = Element::new("script")
                    .with_attr("type", "module")
                    .with_attr(INJECTED_ATTR, INJECTED_SCRIPT)
                    .with_text(script);
                insert_into_head(document, element);
                tracing::debug!(specifier = %self.specifier, "bootstrap script injected");
            }
        }

        RenderSummary {
            deferred,
            ..RenderSummary::default()
        }
    }
}

/// The script this backend injected on an earlier pass, if any.
fn injected_script(document: &mut Document) -> Option<&mut Element> {
    let path = document
        .select(&Selector::tag("script"))
        .into_iter()
        .find(|path| {
            document
                .element(path)
                .is_some_and(|script| script.attr(INJECTED_ATTR) == Some(INJECTED_SCRIPT))
        })?;
    document.element_mut(&path)
}

/// Append to `<head>`, else `<body>`, else the end of the document.
fn insert_into_head(document: &mut Document, element: Element) {
    let target = document
        .find_first("head")
        .or_else(|| document.find_first("body"));
    if let Some(path) = target
        && let Some(parent) = document.element_mut(&path)
    {
        parent.children.push(element.into());
        return;
    }
    document.children.push(element.into());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Theme;
    use pretty_assertions::assert_eq;

    const PAGE: &str = concat!(
        "<html><head><title>Guide</title></head><body>",
        r#"<pre><div class="mermaid">graph TD; A-->B;</div></pre>"#,
        "</body></html>"
    );

    fn scripts(document: &Document) -> Vec<&Element> {
        document
            .select(&Selector::tag("script"))
            .iter()
            .filter_map(|path| document.element(path))
            .collect()
    }

    #[test]
    fn test_script_injected_into_head() {
        let library = BrowserLibrary::new("https://cdn.example/mermaid.esm.min.mjs");
        library.initialize(&LibraryConfig::default());
        let mut doc = Document::parse(PAGE).unwrap();

        let summary = library.init(&mut doc);

        assert_eq!(summary.deferred, 1);
        assert_eq!(summary.rendered, 0);
        let head = doc.element(&doc.find_first("head").unwrap()).unwrap();
        let script = head.children.last().unwrap().as_element().unwrap();
        assert_eq!(script.tag, "script");
        assert_eq!(script.attr("type"), Some("module"));
        assert_eq!(script.attr(INJECTED_ATTR), Some(INJECTED_SCRIPT));
        assert_eq!(
            script.text_content(),
            concat!(
                "import mermaid from \"https://cdn.example/mermaid.esm.min.mjs\";\n",
                "mermaid.initialize({\"startOnLoad\":true,\"theme\":\"default\"});\n",
                "await mermaid.run();\n",
            )
        );
    }

    #[test]
    fn test_repeated_init_keeps_single_script() {
        let library = BrowserLibrary::new("mermaid");
        let mut doc = Document::parse(PAGE).unwrap();

        library.init(&mut doc);
        library.init(&mut doc);

        assert_eq!(scripts(&doc).len(), 1);
    }

    #[test]
    fn test_reinitialize_refreshes_script() {
        let library = BrowserLibrary::new("mermaid");
        let mut doc = Document::parse(PAGE).unwrap();
        library.init(&mut doc);

        library.initialize(&LibraryConfig {
            start_on_load: true,
            theme: Theme::Forest,
        });
        library.init(&mut doc);

        let found = scripts(&doc);
        assert_eq!(found.len(), 1);
        assert!(found[0].text_content().contains(r#""theme":"forest""#));
    }

    #[test]
    fn test_no_head_falls_back_to_body_then_document() {
        let library = BrowserLibrary::new("mermaid");
        let container = r#"<div class="mermaid">graph TD; A-->B;</div>"#;

        let mut with_body = Document::parse(&format!("<body>{container}</body>")).unwrap();
        library.init(&mut with_body);
        let body = with_body
            .element(&with_body.find_first("body").unwrap())
            .unwrap();
        assert_eq!(body.children.len(), 2);

        let mut fragment = Document::parse(container).unwrap();
        library.init(&mut fragment);
        assert_eq!(fragment.children.len(), 2);
        assert_eq!(scripts(&fragment).len(), 1);
    }

    #[test]
    fn test_page_without_containers_untouched() {
        let library = BrowserLibrary::new("mermaid");
        let html = "<html><head><title>Plain</title></head><body><p>x</p></body></html>";
        let mut doc = Document::parse(html).unwrap();

        let summary = library.init(&mut doc);

        assert_eq!(summary, RenderSummary::default());
        assert!(scripts(&doc).is_empty());
        assert_eq!(doc.to_html(), html);
    }

    #[test]
    fn test_existing_script_refreshed_without_containers() {
        let library = BrowserLibrary::new("mermaid");
        let mut doc = Document::parse(PAGE).unwrap();
        library.init(&mut doc);
        let path = doc.select(&CONTAINER_SELECTOR)[0].clone();
        doc.replace(&path, Node::text("removed"));

        library.initialize(&LibraryConfig {
            start_on_load: true,
            theme: Theme::Dark,
        });
        library.init(&mut doc);

        let found = scripts(&doc);
        assert_eq!(found.len(), 1);
        assert!(found[0].text_content().contains(r#""theme":"dark""#));
    }

    #[test]
    fn test_specifier_cannot_close_script() {
        let library = BrowserLibrary::new("https://cdn.example/</script><b>.mjs");
        let mut doc = Document::parse(
            r#"<head></head><body><div class="mermaid">graph TD; A-->B;</div></body>"#,
        )
        .unwrap();

        library.init(&mut doc);

        let html = doc.to_html();
        assert_eq!(html.matches("</script>").count(), 1);
        assert!(html.contains(r"<\/script>"));
    }

    #[test]
    fn test_processed_containers_not_deferred() {
        let library = BrowserLibrary::new("mermaid");
        let mut doc = Document::parse(concat!(
            r#"<div class="mermaid" data-processed="true"><svg></svg></div>"#,
            r#"<div class="mermaid">graph LR; X-->Y;</div>"#,
        ))
        .unwrap();

        assert_eq!(library.init(&mut doc).deferred, 1);
    }

    #[test]
    fn test_digest_recorded() {
        let library = BrowserLibrary::new("https://cdn.example/m.mjs").with_digest("ab12");
        assert_eq!(library.digest(), Some("ab12"));
        assert_eq!(library.specifier(), "https://cdn.example/m.mjs");
    }
}
