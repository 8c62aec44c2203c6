//! `fencepost render` command implementation.

use std::path::PathBuf;

use clap::Args;
use fencepost_config::{CliSettings, Config};
use fencepost_page::{NodePath, Page};
use fencepost_runtime::{
    BatchReport, IconPackRegistry, KrokiLoader, PresentationSession, RenderEngine, ThemeResolver,
};

use crate::error::CliError;
use crate::output::{Output, write_document};

/// Arguments for the render command.
#[derive(Args)]
pub(crate) struct RenderArgs {
    /// Transformed HTML input file.
    input: PathBuf,

    /// Output file (default: stdout).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Ambient theme signal to set on the document element (e.g. light, dark).
    #[arg(long)]
    theme_signal: Option<String>,

    /// Fallback diagram theme (overrides config).
    #[arg(long)]
    theme: Option<String>,

    /// Kroki server URL for diagram rendering (overrides config).
    #[arg(long)]
    kroki_url: Option<String>,

    /// Path to configuration file (default: auto-discover fencepost.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub(crate) verbose: bool,
}

impl RenderArgs {
    /// Execute the render command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration, input, output or the renderer fails.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            kroki_url: self.kroki_url.clone(),
            theme: self.theme.clone(),
            ..Default::default()
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        let kroki_url = config.require_kroki_url()?.to_owned();

        let page = self.load_page(&config.diagrams.theme_attribute)?;

        let engine = RenderEngine::new(KrokiLoader::from_config(&kroki_url, &config.kroki))
            .configure(&config.diagrams)
            .with_icon_packs(IconPackRegistry::from_config(&config.icon_packs));
        let resolver = ThemeResolver::from_config(&config.diagrams);
        let mut session = PresentationSession::new(page, engine, resolver);

        output.info(&format!(
            "Rendering {} with theme \"{}\"...",
            self.input.display(),
            session.current_theme()
        ));

        let runtime = tokio::runtime::Builder::new_current_thread().build()?;
        let report = runtime.block_on(session.start());

        if report.aborted {
            return Err(CliError::Validation(format!(
                "diagram renderer at {kroki_url} is unavailable"
            )));
        }

        write_document(self.output.as_deref(), &session.into_page().to_html())?;
        print_report(&output, &report);
        Ok(())
    }

    /// Read the input page and set the ambient theme signal, if given, on
    /// the document element.
    fn load_page(&self, theme_attribute: &str) -> Result<Page, CliError> {
        let source = std::fs::read_to_string(&self.input)?;
        let mut page = Page::parse(&source)?;
        if let Some(signal) = &self.theme_signal {
            page.set_attribute(&NodePath::root(), theme_attribute, signal.clone());
        }
        Ok(page)
    }
}

fn print_report(output: &Output, report: &BatchReport) {
    if report.discovered == 0 {
        output.info("No diagram placeholders found.");
        return;
    }

    output.highlight(&format!("Diagrams: {}", report.discovered));
    output.success(&format!("Rendered: {}", report.rendered));
    if report.skipped > 0 {
        output.info(&format!("Already rendered: {}", report.skipped));
    }
    if report.failed > 0 {
        output.warning(&format!(
            "Failed: {} (see error panels in the output)",
            report.failed
        ));
    }
}
