//! `mmd scan` command implementation.

use std::fs;
use std::path::PathBuf;

use clap::Args;
use mmd_activator::find_sources;
use mmd_dom::Document;

use crate::error::CliError;
use crate::output::Output;
use crate::pages::{Page, collect_pages};

/// Arguments for the scan command.
#[derive(Args)]
pub(crate) struct ScanArgs {
    /// HTML files or directories (searched for `**/*.html`).
    #[arg(required = true)]
    paths: Vec<PathBuf>,
}

impl ScanArgs {
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let pages = collect_pages(&self.paths)?;

        let mut total = 0;
        let mut with_diagrams = 0;
        for page in &pages {
            let count = count_sources(page)?;
            if count > 0 {
                output.info(&format!("{}: {count} diagram source(s)", page.path.display()));
                total += count;
                with_diagrams += 1;
            }
        }

        output.success(&format!(
            "{total} diagram source(s) in {with_diagrams} of {} page(s)",
            pages.len()
        ));
        Ok(())
    }
}

fn count_sources(page: &Page) -> Result<usize, CliError> {
    let html = fs::read_to_string(&page.path)?;
    let document = Document::parse(&html).map_err(|source| CliError::Parse {
        path: page.path.clone(),
        source,
    })?;
    Ok(find_sources(&document).len())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_count_sources_does_not_modify_page() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("page.html");
        let html = concat!(
            r#"<pre><code class="language-mermaid">graph TD; A--&gt;B;</code></pre>"#,
            r#"<pre><code class="language-mermaid">pie title X</code></pre>"#,
            r#"<pre><code class="language-bash">ls</code></pre>"#,
        );
        fs::write(&path, html).unwrap();
        let page = Page {
            path: path.clone(),
            relative: PathBuf::from("page.html"),
        };

        assert_eq!(count_sources(&page).unwrap(), 2);
        assert_eq!(fs::read_to_string(&path).unwrap(), html);
    }
}
