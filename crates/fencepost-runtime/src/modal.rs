//! Zoom viewer for rendered diagrams.
//!
//! One [`ModalController`] serves a whole page and allows at most one open
//! session at a time. Event handlers are always bound: every event goes
//! through [`ModalController::handle`], which ignores events that do not
//! apply to the current state.

use fencepost_config::ViewerConfig;
use fencepost_page::{Content, Node, NodePath, Page};
use fencepost_transform::markup::{
    CONTAINER_CLASS, CONTENT_CLASS, ID_ATTR, OVERLAY_CLASS, PROCESSED_ATTR, TARGET_ATTR,
    overlay_id,
};

/// Viewer tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerSettings {
    pub zoom_step: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Enter/Space open and Escape closes.
    pub keyboard: bool,
    /// Classes of navigation panels hidden while the viewer is open.
    pub hide_panels: Vec<String>,
    /// Viewport size used to fit the diagram (width, height).
    pub viewport: (f64, f64),
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self::from_config(&ViewerConfig::default())
    }
}

impl ViewerSettings {
    /// Settings for the `[viewer]` section.
    #[must_use]
    pub fn from_config(config: &ViewerConfig) -> Self {
        Self {
            zoom_step: config.zoom_step,
            min_zoom: config.min_zoom,
            max_zoom: config.max_zoom,
            keyboard: config.keyboard,
            hide_panels: config.hide_panels.clone(),
            viewport: (
                f64::from(config.viewport.width),
                f64::from(config.viewport.height),
            ),
        }
    }
}

/// What a click landed on while the viewer is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickTarget {
    /// The close control.
    Close,
    /// The overlay backdrop around the surface.
    Backdrop,
    /// The viewer surface itself.
    Surface,
}

/// Input delivered to the viewer.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    /// A trigger or a rendered container was clicked.
    Activate { target: NodePath },
    /// A key was pressed, optionally while a trigger had focus.
    KeyDown {
        key: String,
        on_trigger: Option<NodePath>,
    },
    Click(ClickTarget),
    PointerDown { x: f64, y: f64 },
    PointerMove { x: f64, y: f64 },
    PointerUp,
    PointerLeave,
    /// Scroll input; negative `delta_y` zooms in.
    Wheel { delta_y: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Drag {
    origin: (f64, f64),
    start_pan: (f64, f64),
}

/// Attribute values captured on open and put back on close.
#[derive(Debug, Clone, PartialEq)]
struct Restore {
    body: Option<(NodePath, Option<String>)>,
    panels: Vec<(NodePath, Option<String>)>,
    slot_style: Option<String>,
}

/// State of one open viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerSession {
    container: NodePath,
    overlay: NodePath,
    slot: NodePath,
    zoom: f64,
    pan: (f64, f64),
    drag: Option<Drag>,
    restore: Restore,
}

impl ViewerSession {
    /// The diagram container being viewed.
    #[must_use]
    pub fn container(&self) -> &NodePath {
        &self.container
    }

    #[must_use]
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Pan offset in pre-zoom units.
    #[must_use]
    pub fn pan(&self) -> (f64, f64) {
        self.pan
    }

    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// CSS transform for the current zoom and pan.
    #[must_use]
    pub fn transform(&self) -> String {
        format!(
            "transform: scale({}) translate({}px, {}px)",
            round(self.zoom),
            round(self.pan.0),
            round(self.pan.1)
        )
    }
}

/// Open/closed viewer state machine for one page.
#[derive(Debug, Clone, Default)]
pub struct ModalController {
    settings: ViewerSettings,
    session: Option<ViewerSession>,
}

impl ModalController {
    #[must_use]
    pub fn new(settings: ViewerSettings) -> Self {
        Self {
            settings,
            session: None,
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// The open session, if any.
    #[must_use]
    pub fn session(&self) -> Option<&ViewerSession> {
        self.session.as_ref()
    }

    /// Handle one event. Returns `true` if it changed the viewer state.
    pub fn handle(&mut self, page: &mut Page, event: ViewerEvent) -> bool {
        match event {
            ViewerEvent::Activate { target } => self.open(page, &target),
            ViewerEvent::KeyDown { key, on_trigger } => self.key_down(page, &key, on_trigger),
            ViewerEvent::Click(ClickTarget::Close | ClickTarget::Backdrop) => self.close(page),
            ViewerEvent::Click(ClickTarget::Surface) => false,
            ViewerEvent::PointerDown { x, y } => self.pointer_down(x, y),
            ViewerEvent::PointerMove { x, y } => self.pointer_move(page, x, y),
            ViewerEvent::PointerUp | ViewerEvent::PointerLeave => self.pointer_up(),
            ViewerEvent::Wheel { delta_y } => self.wheel(page, delta_y),
        }
    }

    /// Open the viewer for a trigger or a rendered container.
    ///
    /// No-op while a session is open, or when the target has no rendered
    /// diagram or no paired overlay.
    pub fn open(&mut self, page: &mut Page, target: &NodePath) -> bool {
        if self.session.is_some() {
            return false;
        }
        let Some((container, overlay)) = resolve_target(page, target) else {
            tracing::debug!(target = ?target, "Nothing to open");
            return false;
        };
        let Some(slot) = child_with_class(page, &overlay, CONTENT_CLASS) else {
            tracing::debug!("Overlay has no content slot");
            return false;
        };
        let Some(content) = page.node(&container).map(|n| self.visual_copy(n)) else {
            return false;
        };

        let restore = Restore {
            body: page.body_path().map(|body| {
                let style = page.node(&body).and_then(|n| n.attr("style")).map(str::to_owned);
                (body, style)
            }),
            panels: self.panel_paths(page),
            slot_style: page.node(&slot).and_then(|n| n.attr("style")).map(str::to_owned),
        };

        page.replace_content(&slot, content);
        page.remove_attribute(&overlay, "hidden");
        if let Some((body, style)) = &restore.body {
            page.set_attribute(body, "style", with_overflow_hidden(style.as_deref()));
        }
        for (panel, _) in &restore.panels {
            page.set_attribute(panel, "hidden", "hidden");
        }

        let session = ViewerSession {
            container,
            overlay,
            slot,
            zoom: 1.0,
            pan: (0.0, 0.0),
            drag: None,
            restore,
        };
        page.set_attribute(&session.slot, "style", session.transform());
        tracing::debug!(container = ?session.container, "Opened diagram viewer");
        self.session = Some(session);
        true
    }

    /// Close the viewer, restoring every attribute it changed.
    pub fn close(&mut self, page: &mut Page) -> bool {
        let Some(session) = self.session.take() else {
            return false;
        };
        let Restore {
            body,
            panels,
            slot_style,
        } = session.restore;

        page.replace_content(&session.slot, Content::Nodes(Vec::new()));
        restore_attribute(page, &session.slot, "style", slot_style);
        page.set_attribute(&session.overlay, "hidden", "hidden");
        if let Some((path, style)) = body {
            restore_attribute(page, &path, "style", style);
        }
        for (path, hidden) in panels {
            restore_attribute(page, &path, "hidden", hidden);
        }
        tracing::debug!("Closed diagram viewer");
        true
    }

    fn key_down(&mut self, page: &mut Page, key: &str, on_trigger: Option<NodePath>) -> bool {
        if !self.settings.keyboard {
            return false;
        }
        match (key, on_trigger) {
            ("Escape", _) => self.close(page),
            ("Enter" | " ", Some(trigger)) => self.open(page, &trigger),
            _ => false,
        }
    }

    fn pointer_down(&mut self, x: f64, y: f64) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        session.drag = Some(Drag {
            origin: (x, y),
            start_pan: session.pan,
        });
        true
    }

    fn pointer_move(&mut self, page: &mut Page, x: f64, y: f64) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        let Some(drag) = session.drag else {
            return false;
        };
        session.pan = (
            drag.start_pan.0 + (x - drag.origin.0) / session.zoom,
            drag.start_pan.1 + (y - drag.origin.1) / session.zoom,
        );
        page.set_attribute(&session.slot, "style", session.transform());
        true
    }

    fn pointer_up(&mut self) -> bool {
        self.session
            .as_mut()
            .and_then(|session| session.drag.take())
            .is_some()
    }

    fn wheel(&mut self, page: &mut Page, delta_y: f64) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        let step = if delta_y < 0.0 {
            self.settings.zoom_step
        } else if delta_y > 0.0 {
            -self.settings.zoom_step
        } else {
            return false;
        };
        session.zoom = round(
            (session.zoom + step).clamp(self.settings.min_zoom, self.settings.max_zoom),
        );
        page.set_attribute(&session.slot, "style", session.transform());
        true
    }

    /// Copy of the container's rendered visual, sized to fit the viewport.
    fn visual_copy(&self, container: &Node) -> Content {
        if let Some(raw) = &container.raw {
            return Content::Raw(raw.clone());
        }
        let mut copy = Node::new(container.tag.as_str())
            .with_children(container.children.clone());
        if let Some(svg) = copy.find_descendant_mut("svg") {
            let style = match view_box_size(svg) {
                Some((width, height)) => {
                    let (vw, vh) = self.settings.viewport;
                    let scale = (vw * 0.9 / width).min(vh * 0.8 / height).min(2.0);
                    format!(
                        "width: {}px; height: {}px; cursor: zoom-out",
                        round(width * scale),
                        round(height * scale)
                    )
                }
                None => "max-width: 90vw; max-height: 80vh; cursor: zoom-out".to_owned(),
            };
            svg.attrs.insert("style".to_owned(), style);
        }
        Content::Nodes(copy.children)
    }

    fn panel_paths(&self, page: &Page) -> Vec<(NodePath, Option<String>)> {
        if self.settings.hide_panels.is_empty() {
            return Vec::new();
        }
        page.select(|n| {
            self.settings
                .hide_panels
                .iter()
                .any(|class| n.has_class(class))
        })
        .into_iter()
        .map(|path| {
            let hidden = page.node(&path).and_then(|n| n.attr("hidden")).map(str::to_owned);
            (path, hidden)
        })
        .collect()
    }
}

/// Find the rendered container and paired overlay for a trigger or container.
fn resolve_target(page: &Page, target: &NodePath) -> Option<(NodePath, NodePath)> {
    let node = page.node(target)?;
    let index = if let Some(key) = node.attr(TARGET_ATTR) {
        key.strip_prefix("mermaid-zoom-")?.to_owned()
    } else if node.has_class(CONTAINER_CLASS) {
        node.attr(ID_ATTR)?.to_owned()
    } else {
        return None;
    };

    let container = page
        .select(|n| n.has_class(CONTAINER_CLASS) && n.attr(ID_ATTR) == Some(index.as_str()))
        .into_iter()
        .next()?;
    if !page.node(&container)?.has_attr(PROCESSED_ATTR) {
        return None;
    }
    let overlay = page.find_by_id(&overlay_id(index.parse().ok()?))?;
    page.node(&overlay)?
        .has_class(OVERLAY_CLASS)
        .then_some((container, overlay))
}

fn child_with_class(page: &Page, parent: &NodePath, class: &str) -> Option<NodePath> {
    page.node(parent)?
        .children
        .iter()
        .position(|c| c.has_class(class))
        .map(|i| parent.child(i))
}

fn view_box_size(svg: &Node) -> Option<(f64, f64)> {
    let values: Vec<f64> = svg
        .attr("viewBox")?
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect::<Result<_, _>>()
        .ok()?;
    match values[..] {
        [_, _, width, height] if width > 0.0 && height > 0.0 => Some((width, height)),
        _ => None,
    }
}

fn with_overflow_hidden(style: Option<&str>) -> String {
    match style.map(|s| s.trim().trim_end_matches(';')) {
        Some(existing) if !existing.is_empty() => format!("{existing}; overflow: hidden"),
        _ => "overflow: hidden".to_owned(),
    }
}

fn restore_attribute(page: &mut Page, path: &NodePath, name: &str, value: Option<String>) {
    match value {
        Some(value) => {
            page.set_attribute(path, name, value);
        }
        None => {
            page.remove_attribute(path, name);
        }
    }
}

/// Round to three decimals so repeated steps do not accumulate float noise.
fn round(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
