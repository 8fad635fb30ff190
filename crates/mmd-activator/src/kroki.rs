//! Server-side rendering through a Kroki instance.
//!
//! Each unprocessed container's source is posted to `{server}/mermaid/svg`
//! with the theme passed as a Kroki diagram option. Requests run in
//! parallel on the rayon pool and results are cached by content hash.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use mmd_cache::{CacheBucket, CacheBucketExt};
use mmd_dom::{Document, Node, NodePath};
use rayon::prelude::*;
use ureq::Agent;

use crate::activator::CONTAINER_SELECTOR;
use crate::config::{LibraryConfig, Theme};
use crate::consts::PROCESSED_ATTR;
use crate::error::RenderError;
use crate::key::DiagramKey;
use crate::library::{DiagramLibrary, RenderSummary};

/// Header carrying the Mermaid `theme` diagram option.
const THEME_HEADER: &str = "Kroki-Diagram-Options-theme";

/// Create an HTTP agent with the given overall timeout.
///
/// Status codes are returned as responses rather than errors so callers can
/// read the server's error body.
pub fn create_agent(timeout: Duration) -> Agent {
    Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

/// Turns one diagram source into SVG markup.
pub trait SvgRenderer: Send + Sync {
    fn render_svg(&self, source: &str, theme: Theme) -> Result<String, RenderError>;
}

/// [`SvgRenderer`] backed by a Kroki server.
pub struct KrokiClient {
    server_url: String,
    agent: Agent,
}

impl KrokiClient {
    pub fn new(server_url: &str, agent: Agent) -> Self {
        Self {
            server_url: server_url.trim_end_matches('/').to_owned(),
            agent,
        }
    }

    #[must_use]
    pub fn server_url(&self) -> &str {
        &self.server_url
    }
}

impl SvgRenderer for KrokiClient {
    fn render_svg(&self, source: &str, theme: Theme) -> Result<String, RenderError> {
        let url = format!("{}/mermaid/svg", self.server_url);

        let response = self
            .agent
            .post(&url)
            .header("Content-Type", "text/plain")
            .header(THEME_HEADER, theme.as_str())
            .send(source.as_bytes())
            .map_err(|e| RenderError::Http(e.to_string()))?;

        let status = response.status().as_u16();
        let mut body = response.into_body();

        if status >= 400 {
            let message = body
                .read_to_string()
                .unwrap_or_else(|_| "(failed to read error body)".to_owned());
            return Err(RenderError::Status { status, message });
        }

        let svg = body
            .read_to_string()
            .map_err(|e| RenderError::Http(e.to_string()))?;
        extract_svg(&svg)
    }
}

/// The `<svg>` element of a response, without any XML prolog before it.
fn extract_svg(response: &str) -> Result<String, RenderError> {
    match response.find("<svg") {
        Some(start) => Ok(response[start..].trim_end().to_owned()),
        None => {
            let preview: String = response.chars().take(80).collect();
            Err(RenderError::InvalidSvg(preview))
        }
    }
}

/// [`DiagramLibrary`] that inlines server-rendered SVG into containers.
///
/// `start_on_load` has no server-side meaning and is ignored.
pub struct KrokiLibrary {
    renderer: Box<dyn SvgRenderer>,
    cache: Arc<dyn CacheBucket>,
    config: RwLock<LibraryConfig>,
}

impl KrokiLibrary {
    pub fn new(renderer: impl SvgRenderer + 'static, cache: Arc<dyn CacheBucket>) -> Self {
        Self {
            renderer: Box::new(renderer),
            cache,
            config: RwLock::new(LibraryConfig::default()),
        }
    }

    fn render_cached(&self, source: &str, theme: Theme) -> Result<String, RenderError> {
        let hash = DiagramKey { source, theme }.compute_hash();
        if let Some(svg) = self.cache.get_string(&hash) {
            tracing::debug!(hash = %hash, "diagram cache hit");
            return Ok(svg);
        }

        let svg = self.renderer.render_svg(source, theme)?;
        self.cache.set_string(&hash, &svg);
        Ok(svg)
    }
}

impl DiagramLibrary for KrokiLibrary {
    fn name(&self) -> &'static str {
        "kroki"
    }

    fn initialize(&self, config: &LibraryConfig) {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = *config;
    }

    fn init(&self, document: &mut Document) -> RenderSummary {
        let theme = self
            .config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .theme;

        let pending: Vec<(NodePath, String)> = document
            .select_outermost(&CONTAINER_SELECTOR)
            .into_iter()
            .filter_map(|path| {
                let container = document.element(&path)?;
                if container.attr(PROCESSED_ATTR).is_some() {
                    return None;
                }
                let source = container.text_content();
                Some((path, source))
            })
            .collect();

        let results: Vec<Result<String, RenderError>> = pending
            .par_iter()
            .map(|(_, source)| self.render_cached(source, theme))
            .collect();

        let mut summary = RenderSummary::default();
        for ((path, _), result) in pending.iter().zip(results) {
            match result {
                Ok(svg) => {
                    if let Some(container) = document.element_mut(path) {
                        container.children = vec![Node::Raw(svg)];
                        container.set_attr(PROCESSED_ATTR, "true");
                        summary.rendered += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(path = %path, "failed to render diagram: {e}");
                    summary.failed += 1;
                }
            }
        }

        tracing::debug!(
            rendered = summary.rendered,
            failed = summary.failed,
            "kroki render pass complete"
        );
        summary
    }
}
