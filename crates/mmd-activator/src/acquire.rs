//! Acquiring the diagram library once and sharing it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OnceCell;

use crate::error::LoadError;
use crate::library::DiagramLibrary;
use crate::loader::LibraryLoader;

/// One-shot acquisition of a diagram library.
///
/// The first successful load is kept and handed to every later caller.
/// Concurrent callers wait for the load already in flight instead of
/// starting another one. A failed or timed-out load is not remembered, so
/// the next caller tries again.
pub struct LibraryAcquirer {
    loader: Box<dyn LibraryLoader>,
    library: OnceCell<Arc<dyn DiagramLibrary>>,
    timeout: Option<Duration>,
}

impl LibraryAcquirer {
    pub fn new(loader: impl LibraryLoader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            library: OnceCell::new(),
            timeout: None,
        }
    }

    /// Give up on a load that has not completed after `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Whether a library has been acquired.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.library.initialized()
    }

    /// The acquired library, loading it on first use.
    pub async fn acquire(&self) -> Result<Arc<dyn DiagramLibrary>, LoadError> {
        let library = self
            .library
            .get_or_try_init(|| async {
                tracing::info!(loader = %self.loader.describe(), "acquiring diagram library");
                let load = self.loader.load();
                match self.timeout {
                    Some(limit) => tokio::time::timeout(limit, load)
                        .await
                        .unwrap_or_else(|_| Err(LoadError::Timeout(limit))),
                    None => load.await,
                }
            })
            .await?;
        Ok(Arc::clone(library))
    }
}
