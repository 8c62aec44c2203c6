//! `fencepost transform` command implementation.

use std::path::{Path, PathBuf};

use clap::Args;
use fencepost_config::{CliSettings, Config};
use fencepost_transform::{DiagramTransformer, TransformReport};

use crate::error::CliError;
use crate::output::{Output, write_document};

/// Arguments for the transform command.
#[derive(Args)]
pub(crate) struct TransformArgs {
    /// Markdown (`.md`, `.markdown`) or HTML input file.
    input: PathBuf,

    /// Output file (default: stdout).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Path to configuration file (default: auto-discover fencepost.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Do not emit zoom trigger and overlay markup.
    #[arg(long)]
    no_viewer: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    pub(crate) verbose: bool,
}

impl TransformArgs {
    /// Execute the transform command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration, input or output fails.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            viewer_enabled: self.no_viewer.then_some(false),
            ..Default::default()
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;

        let transformer = DiagramTransformer::new()
            .with_language(config.diagrams.language.clone())
            .with_overlays(config.viewer.enabled);

        let source = std::fs::read_to_string(&self.input)?;
        let label = self.input.display().to_string();
        let (html, report) = if is_markdown(&self.input) {
            transformer.transform_markdown(&source, &label)?
        } else {
            transformer.transform_html(&source, &label)?
        };

        write_document(self.output.as_deref(), &html)?;
        print_report(&output, &report);
        Ok(())
    }
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("md") || ext.eq_ignore_ascii_case("markdown"))
}

fn print_report(output: &Output, report: &TransformReport) {
    if report.transformed == 0 {
        output.info("No diagram blocks found.");
    } else {
        output.success(&format!(
            "Transformed {} diagram block(s).",
            report.transformed
        ));
    }

    if !report.skipped.is_empty() {
        output.warning(&format!(
            "Left {} malformed diagram block(s) untouched:",
            report.skipped.len()
        ));
        for skipped in &report.skipped {
            output.info(&format!("  - {}", skipped.reason));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_is_markdown() {
        assert!(is_markdown(Path::new("docs/index.md")));
        assert!(is_markdown(Path::new("README.MARKDOWN")));
        assert!(!is_markdown(Path::new("site/index.html")));
        assert!(!is_markdown(Path::new("notes")));
    }

    #[test]
    fn test_execute_writes_transformed_output() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("fencepost.toml");
        std::fs::write(&config, "[viewer]\nenabled = true\n").unwrap();
        let input = dir.path().join("doc.md");
        std::fs::write(&input, "# Doc\n\n```mermaid\ngraph TD\n```\n").unwrap();
        let out = dir.path().join("doc.html");

        let args = TransformArgs {
            input,
            output: Some(out.clone()),
            config: Some(config),
            no_viewer: true,
            verbose: false,
        };
        args.execute().unwrap();

        let html = std::fs::read_to_string(out).unwrap();
        assert_eq!(
            html,
            "<h1>Doc</h1>\n<pre class=\"mermaid\" data-diagram=\"graph TD\n\" data-diagram-id=\"1\">graph TD\n</pre>\n"
        );
    }

    #[test]
    fn test_execute_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("fencepost.toml");
        std::fs::write(&config, "").unwrap();

        let args = TransformArgs {
            input: dir.path().join("missing.md"),
            output: None,
            config: Some(config),
            no_viewer: false,
            verbose: false,
        };
        assert!(matches!(args.execute(), Err(CliError::Io(_))));
    }
}
