//! Presentation session: one page with its engine, theme sync and viewer.

use fencepost_page::Page;

use crate::engine::{BatchReport, RenderEngine, RendererLoader};
use crate::icons::{HttpIconFetcher, IconFetcher};
use crate::modal::{ModalController, ViewerEvent};
use crate::theme::{ThemeResolver, ThemeSubscription, ThemeSync};

/// Everything that lives for one presented page.
///
/// Owns the page, so all writes to the tree go through the session: render
/// batches through the engine, viewer updates through the controller. Both
/// run sequentially on the caller's task.
pub struct PresentationSession<L: RendererLoader, F = HttpIconFetcher> {
    page: Page,
    engine: RenderEngine<L, F>,
    resolver: ThemeResolver,
    theme: Option<(ThemeSync, ThemeSubscription)>,
    viewer: Option<ModalController>,
}

impl<L: RendererLoader, F: IconFetcher> PresentationSession<L, F> {
    /// Create a session. Theme sync is attached when the resolver follows the
    /// ambient signal.
    pub fn new(mut page: Page, engine: RenderEngine<L, F>, resolver: ThemeResolver) -> Self {
        let theme = resolver.is_auto().then(|| {
            let mut sync = ThemeSync::attach(&mut page, resolver.clone());
            let subscription = sync.subscribe();
            (sync, subscription)
        });
        Self {
            page,
            engine,
            resolver,
            theme,
            viewer: None,
        }
    }

    /// Attach a zoom viewer.
    #[must_use]
    pub fn with_viewer(mut self, viewer: ModalController) -> Self {
        self.viewer = Some(viewer);
        self
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Mutable page access, e.g. to change the ambient theme attribute.
    pub fn page_mut(&mut self) -> &mut Page {
        &mut self.page
    }

    pub fn into_page(self) -> Page {
        self.page
    }

    pub fn engine(&self) -> &RenderEngine<L, F> {
        &self.engine
    }

    pub fn viewer(&self) -> Option<&ModalController> {
        self.viewer.as_ref()
    }

    /// Theme currently resolved from the page.
    pub fn current_theme(&self) -> String {
        self.resolver.resolve(&self.page)
    }

    /// Run the first render batch.
    pub async fn start(&mut self) -> BatchReport {
        let theme = self.current_theme();
        self.engine.render_batch(&mut self.page, &theme).await
    }

    /// Handle queued theme changes: one reset and re-render pass per change.
    pub async fn sync_theme(&mut self) -> Vec<BatchReport> {
        let Some((sync, subscription)) = self.theme.as_mut() else {
            return Vec::new();
        };
        sync.dispatch_pending(&self.page);

        let mut reports = Vec::new();
        while let Some(change) = subscription.try_recv() {
            let cleared = self.engine.reset(&mut self.page);
            tracing::debug!(cleared, theme = %change.theme, "Re-rendering diagrams");
            reports.push(self.engine.render_batch(&mut self.page, &change.theme).await);
        }
        reports
    }

    /// Forward an input event to the viewer. Returns `false` without a viewer.
    pub fn handle_viewer_event(&mut self, event: ViewerEvent) -> bool {
        match self.viewer.as_mut() {
            Some(viewer) => viewer.handle(&mut self.page, event),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tests::{FakeLoader, NoFetch, diagram_page, engine};
    use crate::modal::ClickTarget;
    use crate::theme::THEME_ATTRIBUTE;
    use fencepost_page::NodePath;
    use fencepost_transform::DiagramTransformer;
    use fencepost_transform::markup::PROCESSED_ATTR;
    use pretty_assertions::assert_eq;

    fn session(page: Page, loader: &FakeLoader) -> PresentationSession<FakeLoader, NoFetch> {
        PresentationSession::new(page, engine(loader), ThemeResolver::new("default"))
    }

    fn rendered_theme(session: &PresentationSession<FakeLoader, NoFetch>) -> Vec<String> {
        let page = session.page();
        session
            .engine()
            .discover(page)
            .iter()
            .filter_map(|p| page.node(p)?.children.first()?.attr("data-theme"))
            .map(str::to_owned)
            .collect()
    }

    #[tokio::test]
    async fn test_theme_change_clears_and_rerenders() {
        let loader = FakeLoader::default();
        let mut session = session(diagram_page(&["graph TD", "pie"]), &loader);

        let first = session.start().await;
        assert_eq!(first.rendered, 2);
        assert_eq!(rendered_theme(&session), vec!["default", "default"]);

        session
            .page_mut()
            .set_attribute(&NodePath::root(), THEME_ATTRIBUTE, "dark");
        let reports = session.sync_theme().await;

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].rendered, 2);
        assert_eq!(rendered_theme(&session), vec!["dark", "dark"]);
        let page = session.page();
        assert!(
            session
                .engine()
                .discover(page)
                .iter()
                .all(|p| page.node(p).unwrap().has_attr(PROCESSED_ATTR))
        );
        assert_eq!(loader.calls.borrow().loads, 1);
    }

    #[tokio::test]
    async fn test_each_change_runs_one_pass() {
        let loader = FakeLoader::default();
        let mut session = session(diagram_page(&["graph TD"]), &loader);
        session.start().await;

        for theme in ["dark", "light", "dark"] {
            session
                .page_mut()
                .set_attribute(&NodePath::root(), THEME_ATTRIBUTE, theme);
        }
        let reports = session.sync_theme().await;

        assert_eq!(reports.len(), 3);
        assert_eq!(session.engine().passes(), 4);
        assert_eq!(loader.calls.borrow().rendered.len(), 4);
        assert!(session.sync_theme().await.is_empty());
    }

    #[tokio::test]
    async fn test_manual_theme_has_no_sync() {
        let loader = FakeLoader::default();
        let resolver = ThemeResolver::new("forest").with_auto(false);
        let mut session =
            PresentationSession::new(diagram_page(&["graph TD"]), engine(&loader), resolver);
        session.start().await;

        session
            .page_mut()
            .set_attribute(&NodePath::root(), THEME_ATTRIBUTE, "dark");

        assert!(session.sync_theme().await.is_empty());
        assert_eq!(rendered_theme(&session), vec!["forest"]);
    }

    #[tokio::test]
    async fn test_transformed_markdown_end_to_end() {
        let (html, _) = DiagramTransformer::new()
            .transform_markdown("# Doc\n\n```mermaid\ngraph TD\nA-->B\n```\n", "doc.md")
            .unwrap();
        let loader = FakeLoader::default();
        let mut session =
            session(Page::parse(&html).unwrap(), &loader).with_viewer(ModalController::default());

        let report = session.start().await;
        assert_eq!(report.rendered, 1);
        assert_eq!(loader.calls.borrow().rendered[0].1, "graph TD\nA-->B\n");

        let trigger = session
            .page()
            .select_class("button", "mermaid-zoom-trigger")
            .remove(0);
        assert!(session.handle_viewer_event(ViewerEvent::Activate { target: trigger }));
        assert!(session.viewer().unwrap().is_open());
        assert!(session.handle_viewer_event(ViewerEvent::Click(ClickTarget::Close)));
        assert!(!session.viewer().unwrap().is_open());
    }

    #[tokio::test]
    async fn test_viewer_event_without_viewer() {
        let loader = FakeLoader::default();
        let mut session = session(diagram_page(&["pie"]), &loader);
        assert!(!session.handle_viewer_event(ViewerEvent::PointerUp));
    }
}
