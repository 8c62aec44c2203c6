//! Rendering capability backed by a Kroki server.
//!
//! The renderer posts Mermaid source to `{url}/mermaid/svg`. Renderer
//! configuration travels in a `%%{init: ...}%%` directive prepended to the
//! source. Kroki has no icon or layout registration endpoint, so registered
//! packs and loaders are recorded and logged only.

use std::cell::RefCell;
use std::time::Duration;

use fencepost_config::KrokiConfig;
use fencepost_page::{parse_fragment, to_html};
use serde_json::Value;
use ureq::Agent;

use crate::engine::{DiagramRenderer, RendererLoader};
use crate::error::{CapabilityLoadError, RenderError};
use crate::icons::IconPack;

/// Create an HTTP agent with the specified timeout.
pub(crate) fn create_agent(timeout: Duration) -> Agent {
    Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

/// Loads a [`KrokiRenderer`] after checking the server is reachable.
#[derive(Debug, Clone)]
pub struct KrokiLoader {
    url: String,
    timeout: Duration,
}

impl KrokiLoader {
    /// Create a loader for the Kroki server at `url`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_owned(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Loader for the `[kroki]` section with the given server URL.
    #[must_use]
    pub fn from_config(url: &str, config: &KrokiConfig) -> Self {
        Self::new(url).timeout(Duration::from_secs(config.timeout_secs))
    }

    /// Set the HTTP timeout for the health check and every render request.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl RendererLoader for KrokiLoader {
    type Renderer = KrokiRenderer;

    async fn load(&self) -> Result<KrokiRenderer, CapabilityLoadError> {
        let agent = create_agent(self.timeout);
        let health_agent = agent.clone();
        let health_url = format!("{}/health", self.url);

        let health = tokio::task::spawn_blocking(move || check_health(&health_agent, &health_url))
            .await
            .map_err(|e| e.to_string())
            .and_then(|result| result);
        if let Err(message) = health {
            return Err(CapabilityLoadError::Unreachable {
                url: self.url.clone(),
                message,
            });
        }

        tracing::info!(url = %self.url, "Connected to Kroki");
        Ok(KrokiRenderer {
            agent,
            url: self.url.clone(),
            config: RefCell::new(Value::Null),
            icon_packs: RefCell::new(Vec::new()),
            layout_loaders: RefCell::new(Vec::new()),
        })
    }
}

fn check_health(agent: &Agent, url: &str) -> Result<(), String> {
    let response = agent.get(url).call().map_err(|e| e.to_string())?;
    let status = response.status().as_u16();
    if status >= 400 {
        return Err(format!("health check returned HTTP {status}"));
    }
    Ok(())
}

/// Renders Mermaid diagrams through Kroki.
pub struct KrokiRenderer {
    agent: Agent,
    url: String,
    config: RefCell<Value>,
    icon_packs: RefCell<Vec<String>>,
    layout_loaders: RefCell<Vec<String>>,
}

impl KrokiRenderer {
    /// Names of the icon packs registered so far.
    pub fn icon_packs(&self) -> Vec<String> {
        self.icon_packs.borrow().clone()
    }

    /// Names of the layout loaders registered so far.
    pub fn layout_loaders(&self) -> Vec<String> {
        self.layout_loaders.borrow().clone()
    }

    /// Diagram source with the current configuration as an init directive.
    fn request_body(&self, source: &str) -> String {
        let config = self.config.borrow();
        match &*config {
            Value::Object(map) if !map.is_empty() => {
                format!("%%{{init: {config}}}%%\n{source}")
            }
            _ => source.to_owned(),
        }
    }
}

impl DiagramRenderer for KrokiRenderer {
    fn initialize(&self, config: &Value) {
        tracing::debug!(config = %config, "Initializing Kroki renderer");
        *self.config.borrow_mut() = config.clone();
    }

    fn register_icon_packs(&self, packs: &[IconPack]) {
        let names: Vec<String> = packs.iter().map(|p| p.name.clone()).collect();
        tracing::debug!(packs = ?names, "Kroki renders without registered icon packs");
        self.icon_packs.borrow_mut().extend(names);
    }

    fn register_layout_loaders(&self, loaders: &[String]) {
        tracing::debug!(loaders = ?loaders, "Kroki selects layouts server-side");
        self.layout_loaders.borrow_mut().extend_from_slice(loaders);
    }

    async fn render(&self, id: &str, source: &str) -> Result<String, RenderError> {
        let agent = self.agent.clone();
        let url = format!("{}/mermaid/svg", self.url);
        let body = self.request_body(source);

        let svg = tokio::task::spawn_blocking(move || send_render_request(&agent, &url, &body))
            .await
            .map_err(|e| RenderError::Task(e.to_string()))??;

        if !svg.contains("<svg") {
            return Err(RenderError::InvalidOutput(
                "response does not contain an <svg> element".to_owned(),
            ));
        }
        Ok(assign_svg_id(&svg, id))
    }
}

/// Send a diagram to Kroki and return the response body.
///
/// Reads the response body of rejected requests for error details.
fn send_render_request(agent: &Agent, url: &str, body: &str) -> Result<String, RenderError> {
    let response = agent
        .post(url)
        .header("Content-Type", "text/plain")
        .send(body.as_bytes())
        .map_err(|e| RenderError::Http(e.to_string()))?;

    let status = response.status().as_u16();
    let mut body = response.into_body();

    if status >= 400 {
        let error_body = body
            .read_to_string()
            .unwrap_or_else(|_| String::from("(unable to read error body)"));
        return Err(RenderError::Status {
            status,
            body: error_body.trim().to_owned(),
        });
    }

    body.read_to_string()
        .map_err(|e| RenderError::Http(e.to_string()))
}

/// Set the root `<svg>` element's id, leaving unparseable markup untouched.
fn assign_svg_id(svg: &str, id: &str) -> String {
    let Ok((_, mut nodes)) = parse_fragment(svg) else {
        return svg.to_owned();
    };
    let Some(root) = nodes.iter_mut().find(|n| n.tag == "svg") else {
        return svg.to_owned();
    };
    root.attrs.insert("id".to_owned(), id.to_owned());
    root.tail.clear();
    to_html(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn renderer() -> KrokiRenderer {
        KrokiRenderer {
            agent: create_agent(Duration::from_secs(1)),
            url: "http://localhost:8000".to_owned(),
            config: RefCell::new(Value::Null),
            icon_packs: RefCell::new(Vec::new()),
            layout_loaders: RefCell::new(Vec::new()),
        }
    }

    #[test]
    fn test_loader_trims_trailing_slash() {
        let loader = KrokiLoader::new("https://kroki.io/");
        assert_eq!(loader.url, "https://kroki.io");
    }

    #[test]
    fn test_request_body_carries_init_directive() {
        let renderer = renderer();
        assert_eq!(renderer.request_body("graph TD"), "graph TD");

        renderer.initialize(&serde_json::json!({ "theme": "dark" }));
        assert_eq!(
            renderer.request_body("graph TD"),
            "%%{init: {\"theme\":\"dark\"}}%%\ngraph TD"
        );
    }

    #[test]
    fn test_registrations_are_recorded() {
        let renderer = renderer();
        renderer.register_layout_loaders(&["elk".to_owned()]);
        assert_eq!(renderer.layout_loaders(), vec!["elk"]);
        assert!(renderer.icon_packs().is_empty());
    }

    #[test]
    fn test_assign_svg_id_replaces_existing_id() {
        let svg = "<?xml version=\"1.0\"?>\n<svg id=\"kroki\" viewBox=\"0 0 10 10\"><g></g></svg>\n";
        assert_eq!(
            assign_svg_id(svg, "mermaid-1"),
            "<svg id=\"mermaid-1\" viewBox=\"0 0 10 10\"><g></g></svg>"
        );
    }

    #[test]
    fn test_assign_svg_id_without_svg_root() {
        assert_eq!(assign_svg_id("<p>x</p>", "mermaid-1"), "<p>x</p>");
    }
}
