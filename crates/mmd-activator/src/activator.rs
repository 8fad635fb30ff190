//! Page activation: acquire, configure, convert, render.
//!
//! Markdown renderers emit diagram sources as highlighted code blocks:
//!
//! ```html
//! <pre><code class="language-mermaid">graph TD; A--&gt;B;</code></pre>
//! ```
//!
//! Activation swaps each such `code` element for the container the library
//! scans for, keeping the source text and the sibling position:
//!
//! ```html
//! <pre><div class="mermaid">graph TD; A--&gt;B;</div></pre>
//! ```
//!
//! and then runs the library's render pass over the document.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use mmd_dom::{Document, Element, NodePath, Selector};

use crate::acquire::LibraryAcquirer;
use crate::config::LibraryConfig;
use crate::consts::{CONTAINER_CLASS, CONTAINER_TAG, SOURCE_SELECTOR};
use crate::library::{DiagramLibrary, RenderSummary};
use crate::loader::LibraryLoader;

pub(crate) static SOURCE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(SOURCE_SELECTOR).expect("invalid source selector"));

pub(crate) static CONTAINER_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(&format!("{CONTAINER_TAG}.{CONTAINER_CLASS}"))
        .expect("invalid container selector")
});

/// What one activation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    /// The library was available; sources were converted and rendered.
    Rendered {
        library: &'static str,
        converted: usize,
        render: RenderSummary,
    },
    /// The library could not be acquired; the document is unchanged.
    LibraryUnavailable { reason: String },
}

impl Activation {
    /// Source blocks converted into containers.
    #[must_use]
    pub fn converted(&self) -> usize {
        match self {
            Self::Rendered { converted, .. } => *converted,
            Self::LibraryUnavailable { .. } => 0,
        }
    }

    #[must_use]
    pub fn is_rendered(&self) -> bool {
        matches!(self, Self::Rendered { .. })
    }
}

/// Turns diagram source blocks into rendered diagrams.
///
/// One activator can serve any number of documents. The library is
/// acquired on first use and shared afterwards.
pub struct DiagramActivator {
    acquirer: LibraryAcquirer,
    config: LibraryConfig,
    source: Selector,
}

impl DiagramActivator {
    pub fn new(loader: impl LibraryLoader + 'static) -> Self {
        Self {
            acquirer: LibraryAcquirer::new(loader),
            config: LibraryConfig::default(),
            source: SOURCE.clone(),
        }
    }

    /// Configuration passed to the library before each render pass.
    #[must_use]
    pub fn with_config(mut self, config: LibraryConfig) -> Self {
        self.config = config;
        self
    }

    /// Treat a library load slower than `timeout` as failed.
    #[must_use]
    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.acquirer = self.acquirer.with_timeout(timeout);
        self
    }

    /// Match source blocks with `selector` instead of
    /// `pre code.language-mermaid`.
    #[must_use]
    pub fn with_source_selector(mut self, selector: Selector) -> Self {
        self.source = selector;
        self
    }

    #[must_use]
    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    /// Activate every diagram in `document`.
    ///
    /// Never fails. If the library cannot be acquired the document is left
    /// untouched and the reason is reported. Running this again on the same
    /// document converts nothing new and does not duplicate library markup.
    pub async fn activate(&self, document: &mut Document) -> Activation {
        let library = match self.acquirer.acquire().await {
            Ok(library) => library,
            Err(e) => {
                tracing::warn!("diagram library unavailable, page left unchanged: {e}");
                return Activation::LibraryUnavailable {
                    reason: e.to_string(),
                };
            }
        };

        library.initialize(&self.config);
        let converted = convert_sources(document, &self.source);
        let render = render_blocking(Arc::clone(&library), document, converted).await;

        tracing::debug!(
            library = library.name(),
            converted,
            rendered = render.rendered,
            failed = render.failed,
            deferred = render.deferred,
            "activation complete"
        );
        Activation::Rendered {
            library: library.name(),
            converted,
            render,
        }
    }
}

/// Run the library's render pass on the blocking pool.
///
/// A pass may wait on a render server or a thread pool, so it must not hold
/// an async worker. The document moves to the blocking thread and back. If
/// the pass panics the converted document is kept and every container
/// counts as failed.
async fn render_blocking(
    library: Arc<dyn DiagramLibrary>,
    document: &mut Document,
    converted: usize,
) -> RenderSummary {
    let converted_document = document.clone();
    let mut owned = std::mem::take(document);
    let result = tokio::task::spawn_blocking(move || {
        let render = library.init(&mut owned);
        (owned, render)
    })
    .await;

    match result {
        Ok((rendered, render)) => {
            *document = rendered;
            render
        }
        Err(e) => {
            tracing::warn!("render pass aborted: {e}");
            *document = converted_document;
            RenderSummary {
                failed: converted,
                ..RenderSummary::default()
            }
        }
    }
}

/// Paths of diagram source blocks in document order, outermost only.
#[must_use]
pub fn find_sources(document: &Document) -> Vec<NodePath> {
    document.select_outermost(&SOURCE)
}

/// Replace every element matching `selector` with a diagram container.
///
/// Each container takes the match's place among its siblings and holds the
/// match's text content verbatim. Matches nested in another match are
/// dropped with it. Returns the number of containers created.
pub fn convert_sources(document: &mut Document, selector: &Selector) -> usize {
    let paths = document.select_outermost(selector);
    let mut converted = 0;

    for path in &paths {
        let Some(source) = document.get(path).map(mmd_dom::Node::text_content) else {
            continue;
        };
        if document.replace(path, diagram_container(source).into()).is_some() {
            tracing::debug!(path = %path, "diagram source converted");
            converted += 1;
        }
    }

    converted
}

/// `<div class="mermaid">` holding `source` as its only text.
#[must_use]
pub fn diagram_container(source: impl Into<String>) -> Element {
    Element::new(CONTAINER_TAG)
        .with_attr("class", CONTAINER_CLASS)
        .with_text(source)
}
