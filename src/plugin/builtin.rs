//! Builtin generic handlers: `hls`, `dash` and `http`.
//!
//! These match broad URL shapes (protocol prefixes and direct media file
//! extensions), which is why the registry always resolves them after every
//! site-specific handler.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::handler::{Handler, OpenContext};
use super::loader::PluginSpec;
use super::matcher::{Matcher, Matchers};
use super::LoadError;
use crate::stream::{ChunkSource, StreamError};

const MEDIA_EXTENSIONS: &str = "mp4|m4v|mkv|webm|mov|ts|flv|mp3|aac|m4a|ogg|opus|flac|wav";

/// The builtin handler batch. A handler whose patterns fail to compile is
/// logged and left out.
pub fn handlers() -> Vec<(String, Arc<dyn Handler>)> {
    let builders: [(&str, fn() -> Result<Arc<dyn Handler>, regex::Error>); 3] = [
        ("hls", || AdaptiveHandler::hls().map(|h| Arc::new(h) as Arc<dyn Handler>)),
        ("dash", || AdaptiveHandler::dash().map(|h| Arc::new(h) as Arc<dyn Handler>)),
        ("http", || HttpHandler::direct().map(|h| Arc::new(h) as Arc<dyn Handler>)),
    ];

    builders
        .into_iter()
        .filter_map(|(name, build)| match build() {
            Ok(handler) => Some((name.to_string(), handler)),
            Err(err) => {
                warn!("Failed to load builtin plugin {name}: {err}");
                None
            }
        })
        .collect()
}

/// Plain HTTP(S) download of a single resource.
#[derive(Debug, Clone)]
pub struct HttpHandler {
    matchers: Matchers,
    url_template: Option<String>,
    headers: BTreeMap<String, String>,
}

impl HttpHandler {
    pub fn new(matchers: Matchers) -> Self {
        Self {
            matchers,
            url_template: None,
            headers: BTreeMap::new(),
        }
    }

    /// The builtin `http` handler: `httpstream://` URLs and direct links to
    /// media files.
    pub fn direct() -> Result<Self, regex::Error> {
        let matchers = Matchers::new()
            .with(Matcher::new(r"^httpstream://(?P<url>\S+)$")?.with_name("prefixed"))
            .with(
                Matcher::new(&format!(
                    r"(?i)^https?://[^?#\s]+\.(?:{MEDIA_EXTENSIONS})(?:[?#]\S*)?$"
                ))?
                .with_name("direct"),
            );
        Ok(Self::new(matchers))
    }

    /// Build from a manifest of kind `http`.
    pub fn from_spec(name: &str, spec: &PluginSpec, matchers: Matchers) -> Result<Self, LoadError> {
        if let Some(template) = &spec.url {
            check_template(template).map_err(|message| LoadError::Invalid {
                name: name.to_string(),
                message,
            })?;
        }
        Ok(Self {
            matchers,
            url_template: spec.url.clone(),
            headers: spec.headers.clone(),
        })
    }

    /// Request the target from a URL template filled with named captures.
    #[must_use]
    pub fn with_url_template(mut self, template: impl Into<String>) -> Self {
        self.url_template = Some(template.into());
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// The URL actually requested for `url`.
    ///
    /// Uses the template if there is one, else a captured `url` group, else
    /// `url` itself. Scheme-less targets default to `https://`.
    pub fn target_url(&self, url: &str, ctx: &OpenContext) -> Result<url::Url, StreamError> {
        let target = match &self.url_template {
            Some(template) => expand_template(template, ctx).map_err(StreamError::Open)?,
            None => ctx.capture("url").unwrap_or(url).to_string(),
        };
        let target = if target.contains("://") {
            target
        } else {
            format!("https://{target}")
        };

        let parsed = url::Url::parse(&target)
            .map_err(|err| StreamError::Open(format!("invalid target URL {target}: {err}")))?;
        match parsed.scheme() {
            "http" | "https" => Ok(parsed),
            other => Err(StreamError::Open(format!("unsupported scheme '{other}' in {target}"))),
        }
    }
}

#[async_trait]
impl Handler for HttpHandler {
    fn matchers(&self) -> &Matchers {
        &self.matchers
    }

    async fn open(&self, url: &str, ctx: &OpenContext) -> Result<ChunkSource, StreamError> {
        let target = self.target_url(url, ctx)?;
        debug!("Opening HTTP stream: {target}");

        let mut request = ctx.client.get(target.clone());
        for (name, value) in ctx.headers.iter().chain(&self.headers) {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StreamError::Open(format!("{target} returned {status}")));
        }

        Ok(ChunkSource::from_response(response))
    }
}

/// Segmented adaptive streaming (HLS, DASH). These claim their URLs so
/// that resolution is correct, but segment playback is not implemented.
#[derive(Debug, Clone)]
pub struct AdaptiveHandler {
    protocol: &'static str,
    matchers: Matchers,
}

impl AdaptiveHandler {
    pub fn hls() -> Result<Self, regex::Error> {
        let matchers = Matchers::new()
            .with(Matcher::new(r"^hls(?:variant)?://(?P<url>\S+)$")?.with_name("prefixed"))
            .with(Matcher::new(r"(?i)^https?://[^?#\s]+\.m3u8(?:[?#]\S*)?$")?.with_name("playlist"));
        Ok(Self {
            protocol: "HLS",
            matchers,
        })
    }

    pub fn dash() -> Result<Self, regex::Error> {
        let matchers = Matchers::new()
            .with(Matcher::new(r"^dash://(?P<url>\S+)$")?.with_name("prefixed"))
            .with(Matcher::new(r"(?i)^https?://[^?#\s]+\.mpd(?:[?#]\S*)?$")?.with_name("manifest"));
        Ok(Self {
            protocol: "DASH",
            matchers,
        })
    }

    pub fn protocol(&self) -> &'static str {
        self.protocol
    }
}

#[async_trait]
impl Handler for AdaptiveHandler {
    fn matchers(&self) -> &Matchers {
        &self.matchers
    }

    async fn open(&self, url: &str, _ctx: &OpenContext) -> Result<ChunkSource, StreamError> {
        Err(StreamError::Open(format!(
            "{} segment playback is not supported ({url})",
            self.protocol
        )))
    }
}

/// Replace `{group}` placeholders with captured values.
fn expand_template(template: &str, ctx: &OpenContext) -> Result<String, String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after
            .find('}')
            .ok_or_else(|| format!("unclosed placeholder in '{template}'"))?;
        let group = &after[..end];
        let value = ctx
            .capture(group)
            .ok_or_else(|| format!("no capture group '{group}' for '{template}'"))?;
        out.push_str(value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

fn check_template(template: &str) -> Result<(), String> {
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let end = after
            .find('}')
            .ok_or_else(|| format!("unclosed placeholder in '{template}'"))?;
        if after[..end].is_empty() {
            return Err(format!("empty placeholder in '{template}'"));
        }
        rest = &after[end + 1..];
    }
    Ok(())
}
