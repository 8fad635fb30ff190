//! Mermaid diagram activation for rendered documentation pages.
//!
//! A [`DiagramActivator`] acquires a diagram library once through a
//! [`LibraryLoader`], then for each page converts
//! `pre code.language-mermaid` blocks into `div.mermaid` containers and runs
//! the library's render pass.
//!
//! # Backends
//!
//! - [`BrowserLibrary`]: injects a module script; the browser renders
//! - [`KrokiLibrary`]: renders SVG on a Kroki server and inlines it
//!
//! # Example
//!
//! ```
//! use mmd_activator::{DiagramActivator, ModuleLoader};
//! use mmd_dom::Document;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let activator = DiagramActivator::new(ModuleLoader::new("mermaid"));
//! let mut page = Document::parse(
//!     r#"<head></head><pre><code class="language-mermaid">graph TD; A--&gt;B;</code></pre>"#,
//! )
//! .unwrap();
//!
//! let activation = activator.activate(&mut page).await;
//!
//! assert_eq!(activation.converted(), 1);
//! assert!(page.to_html().contains(r#"<div class="mermaid">graph TD; A--&gt;B;</div>"#));
//! # });
//! ```

mod acquire;
mod activator;
mod browser;
mod config;
pub mod consts;
mod error;
mod key;
mod kroki;
mod library;
mod loader;
#[cfg(test)]
mod testing;

pub use acquire::LibraryAcquirer;
pub use activator::{Activation, DiagramActivator, convert_sources, diagram_container, find_sources};
pub use browser::BrowserLibrary;
pub use config::{LibraryConfig, Theme, UnknownTheme};
pub use error::{LoadError, RenderError};
pub use key::{DiagramKey, bundle_key};
pub use kroki::{KrokiClient, KrokiLibrary, SvgRenderer, create_agent};
pub use library::{DiagramLibrary, RenderSummary};
pub use loader::{KrokiLoader, LibraryLoader, ModuleLoader, RemoteLoader};
