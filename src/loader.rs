use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use futures_util::future::{AbortHandle, Abortable, BoxFuture};
use tracing::{debug, info, warn};

use crate::catalog::ArticleMetadata;
use crate::dom::escape_html;
use crate::error::SiteError;
use crate::frontmatter::strip_metadata_block;
use crate::render::RichTextEngine;

/// Where raw article bodies come from.
pub trait ArticleSource: Send + Sync {
    /// Human-readable location, for logs.
    fn describe(&self) -> String;

    /// Retrieve the raw text stored at `path`.
    fn fetch<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<String, SiteError>>;
}

/// Articles served over HTTP(S) relative to a base URL.
pub struct HttpSource {
    client: reqwest::Client,
    base: reqwest::Url,
}

impl HttpSource {
    pub fn new(base: &str) -> Result<Self, SiteError> {
        let mut base = base.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = reqwest::Url::parse(&base)
            .map_err(|e| SiteError::Config(format!("invalid article base URL {}: {}", base, e)))?;
        Ok(Self {
            client: reqwest::Client::new(),
            base,
        })
    }
}

impl ArticleSource for HttpSource {
    fn describe(&self) -> String {
        self.base.to_string()
    }

    fn fetch<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<String, SiteError>> {
        Box::pin(async move {
            let url = self.base.join(path).map_err(|e| SiteError::load(path, e))?;
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| SiteError::load(path, e))?;
            let status = response.status();
            if !status.is_success() {
                return Err(SiteError::load(path, format!("HTTP {}", status)));
            }
            response.text().await.map_err(|e| SiteError::load(path, e))
        })
    }
}

/// Articles read from a local checkout of the site.
pub struct FsSource {
    root: PathBuf,
}

impl FsSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ArticleSource for FsSource {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    fn fetch<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<String, SiteError>> {
        Box::pin(async move {
            let relative = Path::new(path);
            if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
                return Err(SiteError::load(path, "path escapes the site root"));
            }
            tokio::fs::read_to_string(self.root.join(relative))
                .await
                .map_err(|e| SiteError::load(path, e))
        })
    }
}

/// Pick a source for `base`: URLs go over HTTP, anything else is a directory.
pub fn source_for(base: &str) -> Result<Arc<dyn ArticleSource>, SiteError> {
    if base.starts_with("http://") || base.starts_with("https://") {
        Ok(Arc::new(HttpSource::new(base)?))
    } else {
        Ok(Arc::new(FsSource::new(base)))
    }
}

/// Identifies one load request. Only the newest token may be displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadToken(u64);

/// A successfully converted article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArticle {
    pub slug: &'static str,
    pub title: &'static str,
    /// Body after the metadata block was stripped.
    pub markdown: String,
    pub html: String,
}

/// What a load yields: rendered rich text or a message to show in its place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Rendered(RenderedArticle),
    Failed { title: String, message: String },
}

impl LoadOutcome {
    pub fn title(&self) -> &str {
        match self {
            LoadOutcome::Rendered(article) => article.title,
            LoadOutcome::Failed { title, .. } => title,
        }
    }

    /// Body to place inside the modal.
    pub fn body_html(&self) -> String {
        match self {
            LoadOutcome::Rendered(article) => article.html.clone(),
            LoadOutcome::Failed { message, .. } => {
                format!("<p class=\"load-error\">{}</p>", escape_html(message))
            }
        }
    }

    pub fn is_rendered(&self) -> bool {
        matches!(self, LoadOutcome::Rendered(_))
    }
}

/// A load that has been started but not awaited. Dropping the future or
/// starting a newer load abandons it.
pub struct PendingLoad {
    pub token: LoadToken,
    pub future: Abortable<BoxFuture<'static, LoadOutcome>>,
}

/// Retrieves article bodies and converts them for display.
pub struct ContentLoader {
    source: Arc<dyn ArticleSource>,
    engine: Option<Arc<dyn RichTextEngine>>,
    issued: u64,
    in_flight: Option<(LoadToken, AbortHandle)>,
}

impl ContentLoader {
    /// With no engine every load reports the renderer as unavailable.
    pub fn new(source: Arc<dyn ArticleSource>, engine: Option<Arc<dyn RichTextEngine>>) -> Self {
        Self {
            source,
            engine,
            issued: 0,
            in_flight: None,
        }
    }

    /// Load and convert one article. Never fails: errors come back as
    /// [`LoadOutcome::Failed`] with a displayable message.
    pub async fn open(&self, meta: &ArticleMetadata) -> LoadOutcome {
        load(self.source.clone(), self.engine.clone(), *meta).await
    }

    /// Start a load that supersedes any load still in flight.
    pub fn begin(&mut self, meta: &ArticleMetadata) -> PendingLoad {
        if self.cancel() {
            debug!("Superseding in-flight load with {}", meta.slug);
        }
        self.issued += 1;
        let token = LoadToken(self.issued);
        let (handle, registration) = AbortHandle::new_pair();
        let future: BoxFuture<'static, LoadOutcome> =
            Box::pin(load(self.source.clone(), self.engine.clone(), *meta));
        self.in_flight = Some((token, handle));
        PendingLoad {
            token,
            future: Abortable::new(future, registration),
        }
    }

    /// Accept the result for `token` if it is still the current load.
    pub fn finish(&mut self, token: LoadToken) -> bool {
        match self.in_flight {
            Some((current, _)) if current == token => {
                self.in_flight = None;
                true
            }
            _ => {
                debug!("Discarding result of superseded load {:?}", token);
                false
            }
        }
    }

    /// Abort the in-flight load, if any.
    pub fn cancel(&mut self) -> bool {
        match self.in_flight.take() {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }
}

async fn load(
    source: Arc<dyn ArticleSource>,
    engine: Option<Arc<dyn RichTextEngine>>,
    meta: ArticleMetadata,
) -> LoadOutcome {
    match fetch_and_render(source.as_ref(), engine.as_deref(), &meta).await {
        Ok(article) => {
            info!(
                "Loaded {} from {} ({})",
                meta.slug,
                source.describe(),
                engine.as_ref().map_or("no engine", |e| e.name())
            );
            LoadOutcome::Rendered(article)
        }
        Err(e) => {
            warn!("Loading {} failed: {}", meta.slug, e);
            LoadOutcome::Failed {
                title: meta.title.to_string(),
                message: e.user_message(),
            }
        }
    }
}

async fn fetch_and_render(
    source: &dyn ArticleSource,
    engine: Option<&dyn RichTextEngine>,
    meta: &ArticleMetadata,
) -> Result<RenderedArticle, SiteError> {
    let engine = engine.ok_or(SiteError::RendererUnavailable)?;
    let raw = source.fetch(meta.source_path).await?;
    let body = strip_metadata_block(&raw);
    let html = engine.render(body);
    Ok(RenderedArticle {
        slug: meta.slug,
        title: meta.title,
        markdown: body.to_string(),
        html,
    })
}
