//! Ambient theme resolution and change notification.

use fencepost_config::DiagramsConfig;
use fencepost_page::{AttributeMutation, AttributeObserver, NodePath, Page};
use tokio::sync::mpsc;

/// Renderer theme used for the `light` signal.
pub const DEFAULT_THEME: &str = "default";

/// Renderer theme used for the `dark` signal.
pub const DARK_THEME: &str = "dark";

/// Default attribute carrying the ambient theme.
pub const THEME_ATTRIBUTE: &str = "data-theme";

/// Map an ambient signal value to a renderer theme.
///
/// `light` and `dark` are recognized; anything else, or no signal, yields
/// `fallback`.
#[must_use]
pub fn map_theme_signal(signal: Option<&str>, fallback: &str) -> String {
    match signal {
        Some("light") => DEFAULT_THEME.to_owned(),
        Some("dark") => DARK_THEME.to_owned(),
        _ => fallback.to_owned(),
    }
}

/// Resolves the active renderer theme from root element attributes.
#[derive(Debug, Clone)]
pub struct ThemeResolver {
    roots: Vec<String>,
    attribute: String,
    fallback: String,
    auto: bool,
}

impl ThemeResolver {
    /// Resolver reading `data-theme` on `<html>`, then `<body>`.
    #[must_use]
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            roots: vec!["html".to_owned(), "body".to_owned()],
            attribute: THEME_ATTRIBUTE.to_owned(),
            fallback: fallback.into(),
            auto: true,
        }
    }

    /// Resolver for the `[diagrams]` section.
    #[must_use]
    pub fn from_config(config: &DiagramsConfig) -> Self {
        Self {
            roots: config.theme_roots.clone(),
            attribute: config.theme_attribute.clone(),
            fallback: config.theme.clone(),
            auto: config.auto_theme,
        }
    }

    /// Root element names, nearest first.
    #[must_use]
    pub fn with_roots(mut self, roots: Vec<String>) -> Self {
        self.roots = roots;
        self
    }

    /// Follow the ambient signal (`true`) or always use the fallback.
    #[must_use]
    pub fn with_auto(mut self, auto: bool) -> Self {
        self.auto = auto;
        self
    }

    #[must_use]
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    #[must_use]
    pub fn is_auto(&self) -> bool {
        self.auto
    }

    /// Paths of the configured roots that exist in `page`, in order.
    #[must_use]
    pub fn root_paths(&self, page: &Page) -> Vec<NodePath> {
        self.roots
            .iter()
            .filter_map(|root| match root.as_str() {
                "html" => Some(NodePath::root()),
                "body" => page.body_path(),
                _ => None,
            })
            .collect()
    }

    /// First non-empty signal value among the roots.
    #[must_use]
    pub fn signal<'p>(&self, page: &'p Page) -> Option<&'p str> {
        let roots = self.root_paths(page);
        roots
            .iter()
            .filter_map(|path| page.node(path))
            .filter_map(|node| node.attr(&self.attribute))
            .find(|value| !value.is_empty())
    }

    /// The renderer theme for the current page state.
    #[must_use]
    pub fn resolve(&self, page: &Page) -> String {
        if !self.auto {
            return self.fallback.clone();
        }
        map_theme_signal(self.signal(page), &self.fallback)
    }
}

/// A theme change delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeChange {
    /// Theme resolved after the change.
    pub theme: String,
    /// Root whose attribute changed.
    pub source: NodePath,
}

/// Receiving end of a [`ThemeSync`] subscription.
#[derive(Debug)]
pub struct ThemeSubscription {
    rx: mpsc::UnboundedReceiver<ThemeChange>,
}

impl ThemeSubscription {
    /// Take the next delivered change without waiting.
    pub fn try_recv(&mut self) -> Option<ThemeChange> {
        self.rx.try_recv().ok()
    }

    /// Wait for the next delivered change.
    pub async fn recv(&mut self) -> Option<ThemeChange> {
        self.rx.recv().await
    }
}

/// Watches the theme attribute on every root with one observer and fans
/// changes out to one subscriber list.
///
/// Changes are not coalesced: each mutation produces one [`ThemeChange`] per
/// subscriber.
#[derive(Debug)]
pub struct ThemeSync {
    resolver: ThemeResolver,
    observer: AttributeObserver,
    subscribers: Vec<mpsc::UnboundedSender<ThemeChange>>,
}

impl ThemeSync {
    /// Start observing the resolver's roots on `page`.
    pub fn attach(page: &mut Page, resolver: ThemeResolver) -> Self {
        let roots = resolver.root_paths(page);
        tracing::debug!(roots = roots.len(), attribute = %resolver.attribute, "Watching theme attribute");
        let observer = page.observe(roots, &resolver.attribute);
        Self {
            resolver,
            observer,
            subscribers: Vec::new(),
        }
    }

    /// Add a subscriber.
    pub fn subscribe(&mut self) -> ThemeSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        ThemeSubscription { rx }
    }

    /// Wait for the next attribute mutation on a watched root.
    ///
    /// Pass the result to [`dispatch`](Self::dispatch) once the page can be
    /// read again.
    pub async fn changed(&mut self) -> Option<AttributeMutation> {
        self.observer.recv().await
    }

    /// Deliver one mutation to every live subscriber.
    pub fn dispatch(&mut self, page: &Page, mutation: &AttributeMutation) {
        let change = ThemeChange {
            theme: self.resolver.resolve(page),
            source: mutation.target.clone(),
        };
        tracing::info!(theme = %change.theme, "Theme changed");
        self.subscribers
            .retain(|subscriber| subscriber.send(change.clone()).is_ok());
    }

    /// Deliver every queued mutation. Returns the number of mutations.
    pub fn dispatch_pending(&mut self, page: &Page) -> usize {
        let mut count = 0;
        while let Some(mutation) = self.observer.try_recv() {
            self.dispatch(page, &mutation);
            count += 1;
        }
        count
    }
}
