//! Icon pack registry.
//!
//! Packs are registered by name, either inline or as a URL resolved when the
//! rendering capability loads. Registration order is precedence order: the
//! renderer receives packs in order and the last one wins on conflicts.

use std::collections::BTreeMap;
use std::time::Duration;

use fencepost_config::IconPackConfig;
use serde::{Deserialize, Serialize};
use ureq::Agent;

use crate::error::IconPackError;

/// Timeout for fetching one remote icon pack.
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// One icon of an [`IconSet`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Icon {
    /// SVG body (inner markup of the icon).
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// Symbol table in the Iconify JSON shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconSet {
    /// Icon name prefix (e.g. `logos`).
    pub prefix: String,
    /// Icons by name.
    #[serde(default)]
    pub icons: BTreeMap<String, Icon>,
    /// Default icon width.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Default icon height.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// Where an icon pack comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconPackSource {
    /// Symbols given directly.
    Inline(IconSet),
    /// Symbols fetched from a URL at capability-load time.
    Remote(String),
}

/// A resolved icon pack, ready for the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconPack {
    pub name: String,
    pub icons: IconSet,
}

/// Fetches remote icon sets.
pub trait IconFetcher {
    /// Fetch and decode the icon set at `url`.
    fn fetch(&self, url: &str) -> impl Future<Output = Result<IconSet, IconPackError>>;
}

/// [`IconFetcher`] over HTTP.
#[derive(Clone)]
pub struct HttpIconFetcher {
    agent: Agent,
}

impl Default for HttpIconFetcher {
    fn default() -> Self {
        Self::new(FETCH_TIMEOUT)
    }
}

impl HttpIconFetcher {
    /// Create a fetcher with the given request timeout.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: crate::kroki::create_agent(timeout),
        }
    }
}

impl IconFetcher for HttpIconFetcher {
    async fn fetch(&self, url: &str) -> Result<IconSet, IconPackError> {
        let agent = self.agent.clone();
        let owned_url = url.to_owned();
        let body = tokio::task::spawn_blocking(move || fetch_text(&agent, &owned_url))
            .await
            .map_err(|e| IconPackError::Fetch {
                url: url.to_owned(),
                message: e.to_string(),
            })??;

        serde_json::from_str(&body).map_err(|e| IconPackError::Parse {
            source_name: url.to_owned(),
            message: e.to_string(),
        })
    }
}

fn fetch_text(agent: &Agent, url: &str) -> Result<String, IconPackError> {
    let fetch_error = |message: String| IconPackError::Fetch {
        url: url.to_owned(),
        message,
    };

    let response = agent.get(url).call().map_err(|e| fetch_error(e.to_string()))?;
    let status = response.status().as_u16();
    if status >= 400 {
        return Err(fetch_error(format!("HTTP {status}")));
    }
    response
        .into_body()
        .read_to_string()
        .map_err(|e| fetch_error(e.to_string()))
}

/// Ordered, name-unique collection of icon pack sources.
#[derive(Debug, Clone, Default)]
pub struct IconPackRegistry {
    packs: Vec<(String, IconPackSource)>,
}

impl IconPackRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from `[[icon_packs]]` entries.
    ///
    /// Entries whose inline icons do not decode are logged and skipped.
    #[must_use]
    pub fn from_config(packs: &[IconPackConfig]) -> Self {
        let mut registry = Self::new();
        for pack in packs {
            match source_from_config(pack) {
                Ok(source) => registry.register(&pack.name, source),
                Err(e) => tracing::warn!(name = %pack.name, error = %e, "Skipping icon pack"),
            }
        }
        registry
    }

    /// Register a pack.
    ///
    /// Registering an existing name replaces the earlier source and moves the
    /// pack to the end, so it takes precedence over everything before it.
    pub fn register(&mut self, name: &str, source: IconPackSource) {
        self.packs.retain(|(existing, _)| existing != name);
        self.packs.push((name.to_owned(), source));
    }

    /// Pack names in precedence order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.packs.iter().map(|(name, _)| name.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.packs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packs.is_empty()
    }

    /// Resolve every pack, fetching remote ones one at a time.
    ///
    /// A pack that fails to resolve is logged and left out; the others are
    /// still returned in registration order.
    pub async fn resolve(&self, fetcher: &impl IconFetcher) -> Vec<IconPack> {
        let mut resolved = Vec::with_capacity(self.packs.len());
        for (name, source) in &self.packs {
            let icons = match source {
                IconPackSource::Inline(icons) => icons.clone(),
                IconPackSource::Remote(url) => match fetcher.fetch(url).await {
                    Ok(icons) => icons,
                    Err(e) => {
                        tracing::warn!(name = %name, error = %e, "Failed to load icon pack");
                        continue;
                    }
                },
            };
            tracing::debug!(name = %name, icons = icons.icons.len(), "Resolved icon pack");
            resolved.push(IconPack {
                name: name.clone(),
                icons,
            });
        }
        resolved
    }
}

fn source_from_config(pack: &IconPackConfig) -> Result<IconPackSource, IconPackError> {
    match (&pack.url, &pack.icons) {
        (Some(url), None) => Ok(IconPackSource::Remote(url.clone())),
        (None, Some(icons)) => serde_json::from_value(icons.clone())
            .map(IconPackSource::Inline)
            .map_err(|e| IconPackError::Parse {
                source_name: pack.name.clone(),
                message: e.to_string(),
            }),
        _ => Err(IconPackError::Parse {
            source_name: pack.name.clone(),
            message: "expected exactly one of url or icons".to_owned(),
        }),
    }
}
