//! Configuration management for fencepost.
//!
//! Parses `fencepost.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `kroki.url`
//! - `icon_packs[].url`

mod expand;

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override Kroki URL for diagram rendering.
    pub kroki_url: Option<String>,
    /// Override the configured default theme.
    pub theme: Option<String>,
    /// Override whether interactive viewer markup is emitted.
    pub viewer_enabled: Option<bool>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "fencepost.toml";

/// Theme names accepted by the diagram renderer.
pub const KNOWN_THEMES: &[&str] = &["default", "dark", "forest", "neutral", "base"];

/// Application configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Diagram discovery and theming.
    pub diagrams: DiagramsConfig,
    /// Kroki rendering service.
    pub kroki: KrokiConfig,
    /// Interactive viewer (trigger + overlay markup and pan/zoom limits).
    pub viewer: ViewerConfig,
    /// Supplementary icon packs, in registration order.
    pub icon_packs: Vec<IconPackConfig>,

    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// Diagram discovery and theming configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DiagramsConfig {
    /// Fence language tag identifying diagram blocks.
    pub language: String,
    /// Theme used when the ambient signal is missing or unrecognized.
    pub theme: String,
    /// Follow the ambient theme attribute and re-render on change.
    pub auto_theme: bool,
    /// Attribute carrying the ambient theme signal.
    pub theme_attribute: String,
    /// Root elements consulted for the theme signal, nearest first.
    pub theme_roots: Vec<String>,
    /// Layout loader modules registered with the renderer (e.g. `elk`).
    pub layout_loaders: Vec<String>,
    /// Extra renderer configuration merged into every initialization.
    pub renderer: serde_json::Map<String, serde_json::Value>,
}

impl Default for DiagramsConfig {
    fn default() -> Self {
        Self {
            language: "mermaid".to_owned(),
            theme: "default".to_owned(),
            auto_theme: true,
            theme_attribute: "data-theme".to_owned(),
            theme_roots: vec!["html".to_owned(), "body".to_owned()],
            layout_loaders: Vec::new(),
            renderer: serde_json::Map::new(),
        }
    }
}

/// Kroki service configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct KrokiConfig {
    /// Kroki server URL. Rendering is unavailable when unset.
    pub url: Option<String>,
    /// HTTP timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for KrokiConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: 30,
        }
    }
}

/// Interactive viewer configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Emit trigger and overlay markup next to each diagram.
    pub enabled: bool,
    /// Zoom change per wheel event.
    pub zoom_step: f64,
    /// Lower zoom bound.
    pub min_zoom: f64,
    /// Upper zoom bound.
    pub max_zoom: f64,
    /// Enter/Space on a trigger opens, Escape closes.
    pub keyboard: bool,
    /// Classes of navigation panels hidden while the viewer is open.
    pub hide_panels: Vec<String>,
    /// Viewport used to size the enlarged diagram.
    pub viewport: ViewportConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            zoom_step: 0.1,
            min_zoom: 0.1,
            max_zoom: 3.0,
            keyboard: true,
            hide_panels: vec![
                "sidebar-pane".to_owned(),
                "right-sidebar-container".to_owned(),
            ],
            viewport: ViewportConfig::default(),
        }
    }
}

/// Viewport dimensions in CSS pixels.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 800,
        }
    }
}

/// Icon pack entry: exactly one of `url` or `icons` must be set.
#[derive(Debug, Clone, Deserialize)]
pub struct IconPackConfig {
    /// Pack name (icon prefix used in diagrams).
    pub name: String,
    /// Remote Iconify JSON document.
    pub url: Option<String>,
    /// Inline Iconify icon set.
    pub icons: Option<serde_json::Value>,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`kroki.url`").
        field: String,
        /// Error message (e.g., "${`KROKI_URL`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Require a URL field to use http:// or https:// scheme.
fn require_http_url(url: &str, field: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `fencepost.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading, allowing CLI arguments to take
    /// precedence over config file values. The result is validated again so
    /// overrides cannot smuggle in invalid values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist or parsing fails.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(kroki_url) = &settings.kroki_url {
            self.kroki.url = Some(kroki_url.clone());
        }
        if let Some(theme) = &settings.theme {
            self.diagrams.theme.clone_from(theme);
        }
        if let Some(enabled) = settings.viewer_enabled {
            self.viewer.enabled = enabled;
        }
    }

    /// Get the Kroki URL, failing when rendering is not configured.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if no URL is configured.
    pub fn require_kroki_url(&self) -> Result<&str, ConfigError> {
        self.kroki.url.as_deref().ok_or_else(|| {
            ConfigError::Validation(
                "kroki.url is required for rendering (set it in [kroki] or pass --kroki-url)"
                    .to_owned(),
            )
        })
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        config.expand_env_vars()?;
        config.config_path = Some(path.to_path_buf());
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_diagrams()?;
        self.validate_kroki()?;
        self.validate_viewer()?;
        self.validate_icon_packs()?;
        Ok(())
    }

    fn validate_diagrams(&self) -> Result<(), ConfigError> {
        let diagrams = &self.diagrams;
        require_non_empty(&diagrams.language, "diagrams.language")?;
        require_non_empty(&diagrams.theme_attribute, "diagrams.theme_attribute")?;

        if !KNOWN_THEMES.contains(&diagrams.theme.as_str()) {
            return Err(ConfigError::Validation(format!(
                "diagrams.theme must be one of {}, got \"{}\"",
                KNOWN_THEMES.join(", "),
                diagrams.theme
            )));
        }

        for root in &diagrams.theme_roots {
            if root != "html" && root != "body" {
                return Err(ConfigError::Validation(format!(
                    "diagrams.theme_roots entries must be \"html\" or \"body\", got \"{root}\""
                )));
            }
        }

        Ok(())
    }

    fn validate_kroki(&self) -> Result<(), ConfigError> {
        if let Some(ref url) = self.kroki.url {
            require_non_empty(url, "kroki.url")?;
            require_http_url(url, "kroki.url")?;
        }
        if self.kroki.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "kroki.timeout_secs must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }

    fn validate_viewer(&self) -> Result<(), ConfigError> {
        let viewer = &self.viewer;
        if !(viewer.zoom_step > 0.0) {
            return Err(ConfigError::Validation(
                "viewer.zoom_step must be greater than 0".to_owned(),
            ));
        }
        if !(viewer.min_zoom > 0.0) {
            return Err(ConfigError::Validation(
                "viewer.min_zoom must be greater than 0".to_owned(),
            ));
        }
        if viewer.min_zoom > viewer.max_zoom {
            return Err(ConfigError::Validation(format!(
                "viewer.min_zoom ({}) cannot exceed viewer.max_zoom ({})",
                viewer.min_zoom, viewer.max_zoom
            )));
        }
        if viewer.viewport.width == 0 || viewer.viewport.height == 0 {
            return Err(ConfigError::Validation(
                "viewer.viewport dimensions must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }

    fn validate_icon_packs(&self) -> Result<(), ConfigError> {
        for pack in &self.icon_packs {
            require_non_empty(&pack.name, "icon_packs.name")?;
            match (&pack.url, &pack.icons) {
                (Some(url), None) => {
                    require_http_url(url, &format!("icon_packs.{}.url", pack.name))?;
                }
                (None, Some(_)) => {}
                _ => {
                    return Err(ConfigError::Validation(format!(
                        "icon pack \"{}\" must set exactly one of url or icons",
                        pack.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(ref url) = self.kroki.url {
            self.kroki.url = Some(expand::expand_env(url, "kroki.url")?);
        }

        for pack in &mut self.icon_packs {
            if let Some(ref url) = pack.url {
                let field = format!("icon_packs.{}.url", pack.name);
                pack.url = Some(expand::expand_env(url, &field)?);
            }
        }

        Ok(())
    }
}
