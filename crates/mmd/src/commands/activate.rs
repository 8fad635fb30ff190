//! `mmd activate` command implementation.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};
use mmd_activator::consts::{DIAGRAM_BUCKET, LIBRARY_BUCKET};
use mmd_activator::{
    Activation, DiagramActivator, KrokiLoader, LibraryConfig, ModuleLoader, RemoteLoader, Theme,
};
use mmd_cache::{Cache, FileCache, NullCache};
use mmd_config::{CliSettings, Config, LibrarySource};
use mmd_dom::Document;

use crate::error::CliError;
use crate::output::Output;
use crate::pages::{Page, collect_pages};

/// Library source selectable on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub(crate) enum SourceArg {
    /// Import the library as a module from `--url`.
    Module,
    /// Fetch and verify the bundle at `--url` before activating.
    Remote,
    /// Render on the Kroki server at `--kroki-url`.
    Kroki,
}

impl From<SourceArg> for LibrarySource {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::Module => Self::Module,
            SourceArg::Remote => Self::Remote,
            SourceArg::Kroki => Self::Kroki,
        }
    }
}

/// Arguments for the activate command.
#[derive(Args)]
pub(crate) struct ActivateArgs {
    /// HTML files or directories (searched for `**/*.html`).
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Write activated pages under this directory instead of in place.
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    /// Path to configuration file (default: auto-discover mmd.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// How the diagram library is acquired (overrides config).
    #[arg(long, value_enum)]
    source: Option<SourceArg>,

    /// Library module specifier or bundle URL (overrides config).
    #[arg(long, env = "MMD_LIBRARY_URL")]
    url: Option<String>,

    /// Kroki server URL (overrides config).
    #[arg(long, env = "MMD_KROKI_URL")]
    kroki_url: Option<String>,

    /// Diagram theme (overrides config).
    #[arg(long)]
    theme: Option<String>,

    /// Disable caching.
    #[arg(long)]
    no_cache: bool,

    /// Enable verbose output (library acquisition and render logs).
    #[arg(short, long)]
    pub verbose: bool,
}

impl ActivateArgs {
    pub(crate) async fn execute(self, version: &str) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            source: self.source.map(LibrarySource::from),
            url: self.url.clone(),
            kroki_url: self.kroki_url.clone(),
            theme: self.theme.clone(),
            cache_enabled: self.no_cache.then_some(false),
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;

        let cache: Box<dyn Cache> = if config.cache_resolved.enabled {
            Box::new(FileCache::new(config.cache_resolved.dir.clone(), version))
        } else {
            Box::new(NullCache)
        };
        let activator = activator_from_config(&config, cache.as_ref())?;

        let pages = collect_pages(&self.paths)?;
        if pages.is_empty() {
            output.warning("No HTML pages found");
            return Ok(());
        }

        let mut diagrams = 0;
        let mut unavailable = 0;
        for page in &pages {
            let activation = activate_page(&activator, page, self.out_dir.as_deref()).await?;
            report(&output, page, &activation);
            diagrams += activation.converted();
            if !activation.is_rendered() {
                unavailable += 1;
            }
        }

        if unavailable > 0 {
            output.warning(&format!(
                "{unavailable} of {} page(s) written unchanged",
                pages.len()
            ));
        }
        output.success(&format!(
            "Activated {diagrams} diagram(s) in {} page(s)",
            pages.len()
        ));
        Ok(())
    }
}

/// Build the activator described by `config`.
fn activator_from_config(config: &Config, cache: &dyn Cache) -> Result<DiagramActivator, CliError> {
    let theme: Theme = config
        .mermaid
        .theme
        .parse()
        .map_err(|e: mmd_activator::UnknownTheme| CliError::Validation(e.to_string()))?;
    let library_config = LibraryConfig {
        start_on_load: config.mermaid.start_on_load,
        theme,
    };
    let timeout = config.library.timeout();

    let activator = match config.library.source {
        LibrarySource::Module => DiagramActivator::new(ModuleLoader::new(&config.library.url)),
        LibrarySource::Remote => DiagramActivator::new(RemoteLoader::new(
            config.library.url.clone(),
            timeout,
            cache.bucket(LIBRARY_BUCKET).into(),
        )),
        LibrarySource::Kroki => {
            let kroki_url = config.library.kroki_url.as_deref().ok_or_else(|| {
                CliError::Validation("library.kroki_url is required for kroki".to_owned())
            })?;
            DiagramActivator::new(KrokiLoader::new(
                kroki_url,
                timeout,
                cache.bucket(DIAGRAM_BUCKET).into(),
            ))
        }
    };

    Ok(activator
        .with_config(library_config)
        .with_load_timeout(timeout))
}

/// Activate one page and write the result.
///
/// When the library is unavailable or the page has nothing to activate, the
/// original bytes are written back.
async fn activate_page(
    activator: &DiagramActivator,
    page: &Page,
    out_dir: Option<&Path>,
) -> Result<Activation, CliError> {
    let html = fs::read_to_string(&page.path)?;
    let mut document = Document::parse(&html).map_err(|source| CliError::Parse {
        path: page.path.clone(),
        source,
    })?;

    let before = document.clone();

    let activation = activator.activate(&mut document).await;

    let target = page.target(out_dir);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    if activation.is_rendered() && document != before {
        fs::write(&target, document.to_html())?;
    } else {
        fs::write(&target, html)?;
    }
    tracing::debug!(page = %target.display(), "page written");

    Ok(activation)
}

fn report(output: &Output, page: &Page, activation: &Activation) {
    let name = page.path.display();
    match activation {
        Activation::Rendered {
            library,
            converted,
            render,
        } => {
            output.info(&format!("{name}: {converted} diagram(s)"));
            output.detail(&format!(
                "  {library}: {} rendered, {} deferred, {} failed",
                render.rendered, render.deferred, render.failed
            ));
            if render.failed > 0 {
                output.warning(&format!(
                    "  {} diagram(s) kept their source",
                    render.failed
                ));
            }
        }
        Activation::LibraryUnavailable { reason } => {
            output.warning(&format!(
                "{name}: diagram library unavailable ({reason}), written unchanged"
            ));
        }
    }
}
