//! Presentation-time diagram runtime.
//!
//! Operates on a [`Page`](fencepost_page::Page) produced by the transformer:
//!
//! - [`RenderEngine`] discovers `pre.mermaid` containers, loads the rendering
//!   capability once, and renders every unprocessed container in document
//!   order. A failing diagram gets an error panel; the others still render.
//! - [`ThemeResolver`] maps the ambient `data-theme` signal to a renderer
//!   theme and [`ThemeSync`] reports changes of that signal.
//! - [`ModalController`] is the zoom viewer state machine.
//! - [`PresentationSession`] ties the three together for one page.
//!
//! The rendering capability is abstract ([`DiagramRenderer`],
//! [`RendererLoader`]); [`KrokiLoader`] provides one backed by a Kroki server.

mod engine;
mod error;
mod icons;
mod kroki;
mod modal;
mod session;
mod theme;

pub use engine::{BatchReport, DiagramRenderer, RenderEngine, RendererLoader};
pub use error::{CapabilityLoadError, IconPackError, RenderError};
pub use icons::{
    HttpIconFetcher, Icon, IconFetcher, IconPack, IconPackRegistry, IconPackSource, IconSet,
};
pub use kroki::{KrokiLoader, KrokiRenderer};
pub use modal::{ClickTarget, ModalController, ViewerEvent, ViewerSession, ViewerSettings};
pub use session::PresentationSession;
pub use theme::{
    DARK_THEME, DEFAULT_THEME, THEME_ATTRIBUTE, ThemeChange, ThemeResolver, ThemeSubscription,
    ThemeSync, map_theme_signal,
};
