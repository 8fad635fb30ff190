//! Resolving command-line paths to HTML pages.

use std::path::{Path, PathBuf};

use glob::Pattern;

use crate::error::CliError;

/// An HTML page found on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Page {
    /// Where the page is read from.
    pub path: PathBuf,
    /// Path relative to the argument it was found under, used to mirror the
    /// layout in an output directory.
    pub relative: PathBuf,
}

impl Page {
    /// Where the activated page is written: in place, or mirrored under
    /// `out_dir`.
    pub(crate) fn target(&self, out_dir: Option<&Path>) -> PathBuf {
        match out_dir {
            Some(dir) => dir.join(&self.relative),
            None => self.path.clone(),
        }
    }
}

/// Expand `paths` into pages.
///
/// Files are taken as given. Directories contribute every `**/*.html` file
/// below them, sorted. A path that does not exist is an error.
pub(crate) fn collect_pages(paths: &[PathBuf]) -> Result<Vec<Page>, CliError> {
    let mut pages = Vec::new();

    for path in paths {
        if path.is_dir() {
            pages.extend(pages_in_dir(path)?);
        } else if path.is_file() {
            let relative = path
                .file_name()
                .map_or_else(|| path.clone(), PathBuf::from);
            pages.push(Page {
                path: path.clone(),
                relative,
            });
        } else {
            return Err(CliError::Validation(format!(
                "{} does not exist",
                path.display()
            )));
        }
    }

    Ok(pages)
}

fn pages_in_dir(dir: &Path) -> Result<Vec<Page>, CliError> {
    let Some(dir_str) = dir.to_str() else {
        return Err(CliError::Validation(format!(
            "{} is not valid UTF-8",
            dir.display()
        )));
    };
    let pattern = format!("{}/**/*.html", Pattern::escape(dir_str));

    let mut paths = Vec::new();
    for entry in glob::glob(&pattern)? {
        match entry {
            Ok(path) if path.is_file() => paths.push(path),
            Ok(_) => {}
            Err(e) => tracing::warn!("skipping unreadable path: {e}"),
        }
    }
    paths.sort();

    Ok(paths
        .into_iter()
        .map(|path| {
            let relative = path.strip_prefix(dir).map_or_else(|_| path.clone(), Path::to_path_buf);
            Page { path, relative }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "<p></p>").unwrap();
    }

    #[test]
    fn test_directory_expands_to_html_files() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("site");
        touch(&root.join("index.html"));
        touch(&root.join("guide/flows.html"));
        touch(&root.join("guide/style.css"));

        let pages = collect_pages(&[root.clone()]).unwrap();

        let relative: Vec<_> = pages.iter().map(|p| p.relative.clone()).collect();
        assert_eq!(
            relative,
            vec![PathBuf::from("guide/flows.html"), PathBuf::from("index.html")]
        );
        assert_eq!(pages[1].path, root.join("index.html"));
    }

    #[test]
    fn test_file_argument_taken_as_is() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("docs/page.htm");
        touch(&file);

        let pages = collect_pages(std::slice::from_ref(&file)).unwrap();

        assert_eq!(
            pages,
            vec![Page {
                path: file,
                relative: PathBuf::from("page.htm"),
            }]
        );
    }

    #[test]
    fn test_missing_path_is_error() {
        let tmp = TempDir::new().unwrap();
        let err = collect_pages(&[tmp.path().join("nope")]).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_target_in_place_or_mirrored() {
        let page = Page {
            path: PathBuf::from("/site/guide/flows.html"),
            relative: PathBuf::from("guide/flows.html"),
        };

        assert_eq!(page.target(None), PathBuf::from("/site/guide/flows.html"));
        assert_eq!(
            page.target(Some(Path::new("/out"))),
            PathBuf::from("/out/guide/flows.html")
        );
    }
}
