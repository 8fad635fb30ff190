//! Ways of acquiring a diagram library.
//!
//! - [`ModuleLoader`]: the library is a static module dependency of the page
//! - [`RemoteLoader`]: the library bundle is fetched and verified before use
//! - [`KrokiLoader`]: rendering happens on a Kroki server

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mmd_cache::CacheBucket;
use ureq::Agent;

use crate::browser::BrowserLibrary;
use crate::consts::MAX_BUNDLE_BYTES;
use crate::error::LoadError;
use crate::key::{bundle_key, sha256_hex};
use crate::kroki::{KrokiClient, KrokiLibrary, create_agent};
use crate::library::DiagramLibrary;

/// Produces a ready-to-use [`DiagramLibrary`].
///
/// A loader may perform I/O. Callers wanting a single load per process wrap
/// it in a [`LibraryAcquirer`](crate::LibraryAcquirer).
#[async_trait]
pub trait LibraryLoader: Send + Sync {
    /// Human-readable description for logs.
    fn describe(&self) -> String;

    async fn load(&self) -> Result<Arc<dyn DiagramLibrary>, LoadError>;
}

/// Loader for a library bundled with the page as a module import.
pub struct ModuleLoader {
    specifier: String,
}

impl ModuleLoader {
    pub fn new(specifier: impl Into<String>) -> Self {
        Self {
            specifier: specifier.into(),
        }
    }
}

#[async_trait]
impl LibraryLoader for ModuleLoader {
    fn describe(&self) -> String {
        format!("module {}", self.specifier)
    }

    async fn load(&self) -> Result<Arc<dyn DiagramLibrary>, LoadError> {
        Ok(Arc::new(BrowserLibrary::new(self.specifier.clone())))
    }
}

/// Loader that fetches the library bundle over HTTP.
///
/// The fetch must answer 2xx with a non-empty body. Bundles are cached by
/// URL, so later runs with the same URL skip the network.
pub struct RemoteLoader {
    url: String,
    agent: Agent,
    cache: Arc<dyn CacheBucket>,
}

impl RemoteLoader {
    pub fn new(url: impl Into<String>, timeout: Duration, cache: Arc<dyn CacheBucket>) -> Self {
        Self {
            url: url.into(),
            agent: create_agent(timeout),
            cache,
        }
    }
}

#[async_trait]
impl LibraryLoader for RemoteLoader {
    fn describe(&self) -> String {
        format!("remote {}", self.url)
    }

    async fn load(&self) -> Result<Arc<dyn DiagramLibrary>, LoadError> {
        let url = self.url.clone();
        let agent = self.agent.clone();
        let cache = Arc::clone(&self.cache);

        let bundle = tokio::task::spawn_blocking(move || fetch_bundle(&agent, &url, cache.as_ref()))
            .await
            .map_err(|e| LoadError::Join(e.to_string()))??;

        tracing::info!(
            url = %self.url,
            bytes = bundle.len,
            sha256 = %bundle.digest,
            cached = bundle.cached,
            "library bundle verified"
        );
        Ok(Arc::new(
            BrowserLibrary::new(self.url.clone()).with_digest(bundle.digest),
        ))
    }
}

/// Loader that checks a Kroki server is reachable.
pub struct KrokiLoader {
    server_url: String,
    agent: Agent,
    cache: Arc<dyn CacheBucket>,
}

impl KrokiLoader {
    pub fn new(server_url: &str, timeout: Duration, cache: Arc<dyn CacheBucket>) -> Self {
        Self {
            server_url: server_url.trim_end_matches('/').to_owned(),
            agent: create_agent(timeout),
            cache,
        }
    }
}

#[async_trait]
impl LibraryLoader for KrokiLoader {
    fn describe(&self) -> String {
        format!("kroki {}", self.server_url)
    }

    async fn load(&self) -> Result<Arc<dyn DiagramLibrary>, LoadError> {
        let health = format!("{}/health", self.server_url);
        let agent = self.agent.clone();

        tokio::task::spawn_blocking(move || probe(&agent, &health))
            .await
            .map_err(|e| LoadError::Join(e.to_string()))??;

        tracing::info!(server = %self.server_url, "kroki server reachable");
        let client = KrokiClient::new(&self.server_url, self.agent.clone());
        Ok(Arc::new(KrokiLibrary::new(client, Arc::clone(&self.cache))))
    }
}

/// A bundle accepted by [`fetch_bundle`].
#[derive(Debug)]
struct Bundle {
    len: usize,
    digest: String,
    cached: bool,
}

fn fetch_bundle(agent: &Agent, url: &str, cache: &dyn CacheBucket) -> Result<Bundle, LoadError> {
    let key = bundle_key(url);
    if let Some(bytes) = cache.get(&key).filter(|bytes| !bytes.is_empty()) {
        return Ok(Bundle {
            len: bytes.len(),
            digest: sha256_hex(&bytes),
            cached: true,
        });
    }

    tracing::debug!(url, "fetching library bundle");
    let response = agent.get(url).call().map_err(|e| http_error(url, e))?;

    let status = response.status().as_u16();
    if !(200..300).contains(&status) {
        return Err(LoadError::Status {
            url: url.to_owned(),
            status,
        });
    }

    let bytes = response
        .into_body()
        .with_config()
        .limit(MAX_BUNDLE_BYTES)
        .read_to_vec()
        .map_err(|e| http_error(url, e))?;
    if bytes.is_empty() {
        return Err(LoadError::EmptyBody {
            url: url.to_owned(),
        });
    }

    cache.set(&key, &bytes);
    Ok(Bundle {
        len: bytes.len(),
        digest: sha256_hex(&bytes),
        cached: false,
    })
}

fn probe(agent: &Agent, url: &str) -> Result<(), LoadError> {
    let response = agent.get(url).call().map_err(|e| http_error(url, e))?;
    let status = response.status().as_u16();
    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(LoadError::Status {
            url: url.to_owned(),
            status,
        })
    }
}

fn http_error(url: &str, error: ureq::Error) -> LoadError {
    match error {
        ureq::Error::Io(e) => LoadError::Io(e),
        other => LoadError::Http {
            url: url.to_owned(),
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use mmd_cache::{Cache, FileCache, NullCacheBucket};
    use tempfile::TempDir;

    use super::*;
    use crate::testing::{StubServer, closed_url};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn null_bucket() -> Arc<dyn CacheBucket> {
        Arc::new(NullCacheBucket)
    }

    #[tokio::test]
    async fn test_module_loader_yields_browser_library() {
        let library = ModuleLoader::new("mermaid").load().await.unwrap();
        assert_eq!(library.name(), "browser");
    }

    #[tokio::test]
    async fn test_remote_loader_fetches_bundle() {
        let server = StubServer::start(vec![(200, b"export default {};".to_vec())]);
        let url = format!("{}/mermaid.esm.min.mjs", server.url);

        let library = RemoteLoader::new(url, TIMEOUT, null_bucket())
            .load()
            .await
            .unwrap();

        assert_eq!(library.name(), "browser");
        assert_eq!(server.next_request().line, "GET /mermaid.esm.min.mjs HTTP/1.1");
    }

    #[tokio::test]
    async fn test_remote_loader_rejects_error_status() {
        let server = StubServer::start(vec![(404, b"Not Found".to_vec())]);

        let err = RemoteLoader::new(server.url.clone(), TIMEOUT, null_bucket())
            .load()
            .await
            .err()
            .unwrap();

        assert!(matches!(err, LoadError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_remote_loader_rejects_empty_body() {
        let server = StubServer::start(vec![(200, Vec::new())]);

        let err = RemoteLoader::new(server.url.clone(), TIMEOUT, null_bucket())
            .load()
            .await
            .err()
            .unwrap();

        assert!(matches!(err, LoadError::EmptyBody { .. }));
    }

    #[tokio::test]
    async fn test_remote_loader_unreachable() {
        let err = RemoteLoader::new(closed_url(), TIMEOUT, null_bucket())
            .load()
            .await
            .err()
            .unwrap();

        assert!(matches!(err, LoadError::Io(_) | LoadError::Http { .. }));
    }

    #[test]
    fn test_fetch_bundle_uses_cache() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path().to_path_buf(), "test");
        let bucket = cache.bucket("libraries");
        let server = StubServer::start(vec![(200, b"export default 1;".to_vec())]);
        let agent = create_agent(TIMEOUT);

        let fetched = fetch_bundle(&agent, &server.url, bucket.as_ref()).unwrap();
        // The stub only answers once; the second call must not reach it.
        let cached = fetch_bundle(&agent, &server.url, bucket.as_ref()).unwrap();

        assert!(!fetched.cached);
        assert!(cached.cached);
        assert_eq!(fetched.digest, cached.digest);
        assert_eq!(fetched.digest, sha256_hex(b"export default 1;"));
        assert_eq!(cached.len, 17);
    }

    #[tokio::test]
    async fn test_kroki_loader_probes_health() {
        let server = StubServer::start(vec![(200, br#"{"status":"pass"}"#.to_vec())]);

        let library = KrokiLoader::new(&server.url, TIMEOUT, null_bucket())
            .load()
            .await
            .unwrap();

        assert_eq!(library.name(), "kroki");
        assert_eq!(server.next_request().line, "GET /health HTTP/1.1");
    }

    #[tokio::test]
    async fn test_kroki_loader_unhealthy_server() {
        let server = StubServer::start(vec![(503, b"down".to_vec())]);

        let err = KrokiLoader::new(&server.url, TIMEOUT, null_bucket())
            .load()
            .await
            .err()
            .unwrap();

        assert!(matches!(err, LoadError::Status { status: 503, .. }));
    }
}
