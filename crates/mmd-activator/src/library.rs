//! The seam between activation and a concrete diagram library.

use mmd_dom::Document;

use crate::config::LibraryConfig;

/// A diagram library the activator can configure and ask to render.
///
/// Implementations are shared across activations through `Arc`, so
/// configuration is stored behind interior mutability.
pub trait DiagramLibrary: Send + Sync {
    /// Short identifier for logs and reports (e.g. `"browser"`, `"kroki"`).
    fn name(&self) -> &'static str;

    /// Store the configuration used by subsequent render passes.
    fn initialize(&self, config: &LibraryConfig);

    /// Render every diagram container present in `document`.
    ///
    /// Must be safe to call repeatedly on the same document: containers
    /// already handled are left alone.
    fn init(&self, document: &mut Document) -> RenderSummary;
}

/// Outcome of one render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderSummary {
    /// Containers rendered during this pass.
    pub rendered: usize,
    /// Containers the library failed to render; they keep their source.
    pub failed: usize,
    /// Containers left for the browser to render when the page loads.
    pub deferred: usize,
}

impl RenderSummary {
    /// Containers the pass looked at.
    #[must_use]
    pub fn total(&self) -> usize {
        self.rendered + self.failed + self.deferred
    }
}
