//! Markup conventions and defaults shared by the activator and backends.

/// Code blocks holding diagram source, as emitted by markdown renderers.
pub const SOURCE_SELECTOR: &str = "pre code.language-mermaid";

/// Tag of the container element the library renders.
pub const CONTAINER_TAG: &str = "div";

/// Class the library scans for.
pub const CONTAINER_CLASS: &str = "mermaid";

/// Attribute the library sets on containers it has rendered.
pub const PROCESSED_ATTR: &str = "data-processed";

/// Attribute marking markup injected by the activator.
pub const INJECTED_ATTR: &str = "data-mmd";

/// Value of [`INJECTED_ATTR`] on the bootstrap script.
pub const INJECTED_SCRIPT: &str = "activator";

/// Upper bound on a fetched library bundle.
pub const MAX_BUNDLE_BYTES: u64 = 32 * 1024 * 1024;

/// Cache bucket for fetched library bundles.
pub const LIBRARY_BUCKET: &str = "libraries";

/// Cache bucket for server-rendered diagrams.
pub const DIAGRAM_BUCKET: &str = "diagrams";
