//! Cache keys for fetched bundles and rendered diagrams.

use sha2::{Digest, Sha256};

use crate::config::Theme;

/// Inputs that determine a server-rendered diagram.
#[derive(Debug, Clone, Copy)]
pub struct DiagramKey<'a> {
    /// Diagram source exactly as it appears in the container.
    pub source: &'a str,
    pub theme: Theme,
}

impl DiagramKey<'_> {
    /// SHA-256 of `"mermaid:svg:{theme}:{source}"`, hex encoded.
    #[must_use]
    pub fn compute_hash(&self) -> String {
        sha256_hex(format!("mermaid:svg:{}:{}", self.theme, self.source).as_bytes())
    }
}

/// Key of a library bundle fetched from `url`.
#[must_use]
pub fn bundle_key(url: &str) -> String {
    sha256_hex(url.as_bytes())
}

pub(crate) fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
