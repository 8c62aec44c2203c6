//! Render engine: discovers placeholder containers and renders them.

use std::cell::Cell;

use fencepost_config::DiagramsConfig;
use fencepost_page::{Content, Node, NodePath, Page};
use fencepost_transform::DEFAULT_LANGUAGE;
use fencepost_transform::markup::{
    CONTAINER_CLASS, ERROR_CLASS, PROCESSED_ATTR, SOURCE_ATTR, language_class,
};
use serde_json::{Map, Value};
use tokio::sync::OnceCell;

use crate::error::{CapabilityLoadError, RenderError};
use crate::icons::{HttpIconFetcher, IconFetcher, IconPack, IconPackRegistry};

/// The diagram rendering capability.
pub trait DiagramRenderer {
    /// Configure the renderer before a batch.
    fn initialize(&self, config: &Value);

    /// Make icon packs available to diagrams.
    fn register_icon_packs(&self, packs: &[IconPack]);

    /// Enable additional layout engines by name.
    fn register_layout_loaders(&self, loaders: &[String]);

    /// Render `source` into a visual (SVG markup) identified by `id`.
    fn render(&self, id: &str, source: &str)
    -> impl Future<Output = Result<String, RenderError>>;
}

/// Loads a [`DiagramRenderer`].
pub trait RendererLoader {
    type Renderer: DiagramRenderer;

    /// Load the capability. Called at most once per engine.
    fn load(&self) -> impl Future<Output = Result<Self::Renderer, CapabilityLoadError>>;
}

/// Outcome of one render batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Containers found on the page.
    pub discovered: usize,
    /// Containers rendered successfully in this batch.
    pub rendered: usize,
    /// Containers replaced with an error panel in this batch.
    pub failed: usize,
    /// Containers already processed.
    pub skipped: usize,
    /// Whether the batch was abandoned because the capability is unavailable.
    pub aborted: bool,
}

/// Discovers placeholder containers and renders each one exactly once.
///
/// The capability is loaded lazily on the first batch with pending work and
/// shared by every later batch. A failed load is cached as well.
pub struct RenderEngine<L: RendererLoader, F = HttpIconFetcher> {
    loader: L,
    fetcher: F,
    icon_packs: IconPackRegistry,
    layout_loaders: Vec<String>,
    renderer_config: Map<String, Value>,
    language: String,
    capability: OnceCell<Result<L::Renderer, CapabilityLoadError>>,
    passes: Cell<usize>,
}

impl<L: RendererLoader> RenderEngine<L> {
    /// Create an engine fetching remote icon packs over HTTP.
    pub fn new(loader: L) -> Self {
        Self::with_fetcher(loader, HttpIconFetcher::default())
    }
}

impl<L: RendererLoader, F: IconFetcher> RenderEngine<L, F> {
    /// Create an engine with a custom icon fetcher.
    pub fn with_fetcher(loader: L, fetcher: F) -> Self {
        Self {
            loader,
            fetcher,
            icon_packs: IconPackRegistry::new(),
            layout_loaders: Vec::new(),
            renderer_config: Map::new(),
            language: DEFAULT_LANGUAGE.to_owned(),
            capability: OnceCell::new(),
            passes: Cell::new(0),
        }
    }

    /// Apply the `[diagrams]` section.
    #[must_use]
    pub fn configure(mut self, config: &DiagramsConfig) -> Self {
        self.layout_loaders.clone_from(&config.layout_loaders);
        self.renderer_config.clone_from(&config.renderer);
        self.language.clone_from(&config.language);
        self
    }

    /// Set the icon packs registered at capability-load time.
    #[must_use]
    pub fn with_icon_packs(mut self, registry: IconPackRegistry) -> Self {
        self.icon_packs = registry;
        self
    }

    /// Set the layout loaders registered at capability-load time.
    #[must_use]
    pub fn with_layout_loaders(mut self, loaders: Vec<String>) -> Self {
        self.layout_loaders = loaders;
        self
    }

    /// Set extra renderer configuration merged into every `initialize` call.
    #[must_use]
    pub fn with_renderer_config(mut self, config: Map<String, Value>) -> Self {
        self.renderer_config = config;
        self
    }

    /// Number of render batches run so far.
    pub fn passes(&self) -> usize {
        self.passes.get()
    }

    /// Whether the capability load has completed (successfully or not).
    pub fn is_loaded(&self) -> bool {
        self.capability.initialized()
    }

    /// Placeholder containers in document order.
    pub fn discover(&self, page: &Page) -> Vec<NodePath> {
        page.select_class("pre", CONTAINER_CLASS)
    }

    /// Load the capability once; concurrent callers share the in-flight load.
    pub async fn ensure_loaded(&self) -> Result<&L::Renderer, CapabilityLoadError> {
        self.capability
            .get_or_init(|| self.load_capability())
            .await
            .as_ref()
            .map_err(Clone::clone)
    }

    async fn load_capability(&self) -> Result<L::Renderer, CapabilityLoadError> {
        tracing::info!("Loading diagram renderer");
        let renderer = match self.loader.load().await {
            Ok(renderer) => renderer,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load diagram renderer");
                return Err(e);
            }
        };

        let packs = self.icon_packs.resolve(&self.fetcher).await;
        if !packs.is_empty() {
            renderer.register_icon_packs(&packs);
        }
        if !self.layout_loaders.is_empty() {
            renderer.register_layout_loaders(&self.layout_loaders);
        }
        Ok(renderer)
    }

    /// Renderer configuration for one batch: extra settings with the theme on top.
    pub fn renderer_config(&self, theme: &str) -> Value {
        let mut config = Map::new();
        config.insert("startOnLoad".to_owned(), Value::Bool(false));
        config.extend(self.renderer_config.clone());
        config.insert("theme".to_owned(), Value::String(theme.to_owned()));
        Value::Object(config)
    }

    /// Render every unprocessed container, one at a time, in document order.
    pub async fn render_batch(&self, page: &mut Page, theme: &str) -> BatchReport {
        self.passes.set(self.passes.get() + 1);
        let containers = self.discover(page);
        let mut report = BatchReport {
            discovered: containers.len(),
            ..BatchReport::default()
        };

        if containers.is_empty() {
            self.log_untransformed(page);
            return report;
        }

        let pending: Vec<NodePath> = containers
            .into_iter()
            .filter(|path| page.node(path).is_some_and(|n| !n.has_attr(PROCESSED_ATTR)))
            .collect();
        report.skipped = report.discovered - pending.len();
        if pending.is_empty() {
            return report;
        }

        let renderer = match self.ensure_loaded().await {
            Ok(renderer) => renderer,
            Err(e) => {
                tracing::warn!(error = %e, pending = pending.len(), "Abandoning render batch");
                report.aborted = true;
                return report;
            }
        };
        renderer.initialize(&self.renderer_config(theme));

        for path in pending {
            let Some(node) = page.node(&path) else {
                continue;
            };
            if node.has_attr(PROCESSED_ATTR) {
                report.skipped += 1;
                continue;
            }
            let source = if let Some(source) = node.attr(SOURCE_ATTR) {
                source.to_owned()
            } else {
                let text = node.text_content();
                page.set_attribute(&path, SOURCE_ATTR, text.clone());
                text
            };

            let id = new_diagram_id();
            match renderer.render(&id, &source).await {
                Ok(visual) => {
                    page.replace_content(&path, Content::markup(&visual));
                    report.rendered += 1;
                }
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "Failed to render diagram");
                    page.replace_content(&path, Content::Nodes(vec![error_panel(&e)]));
                    report.failed += 1;
                }
            }
            page.set_attribute(&path, PROCESSED_ATTR, "true");
        }

        tracing::info!(
            rendered = report.rendered,
            failed = report.failed,
            theme = %theme,
            "Rendered diagrams"
        );
        report
    }

    /// Clear the processed marker on every container. Returns how many were cleared.
    pub fn reset(&self, page: &mut Page) -> usize {
        self.discover(page)
            .iter()
            .filter(|path| page.remove_attribute(path, PROCESSED_ATTR).is_some())
            .count()
    }

    fn log_untransformed(&self, page: &Page) {
        let class = language_class(&self.language);
        let untransformed = page
            .select(|n| {
                n.tag == "pre"
                    && n.children
                        .iter()
                        .any(|c| c.tag == "code" && c.has_class(&class))
            })
            .len();
        if untransformed > 0 {
            tracing::debug!(
                count = untransformed,
                "Found diagram code blocks that were not transformed"
            );
        }
    }
}

/// A fresh, page-unique identifier for one render call.
fn new_diagram_id() -> String {
    format!("mermaid-{}", uuid::Uuid::new_v4().simple())
}

fn error_panel(error: &RenderError) -> Node {
    Node::new("div")
        .with_attr("class", ERROR_CLASS)
        .with_attr("role", "alert")
        .with_text(format!("Error rendering diagram: {error}"))
}
