use std::{path::PathBuf, sync::Arc, time::Duration};

use http::{
    header::{CONTENT_TYPE, LOCATION},
    HeaderValue, Response, StatusCode,
};
use tokio::time;
use uuid::Uuid;

use crate::{
    config::{SsrConfig, TemplateSource},
    error::{AssembleError, InitializationError, RenderingError},
    manifest::AssetManifest,
    preload::{NoPreload, Preloader, Preloads},
    render::{RenderOutcome, RenderRequest, Renderer},
    request::{InitialData, Location, RequestContext},
    store::{KeyedReducer, Reducer, Store},
    template::{title_tag, PageParts, Template},
};

#[derive(Clone)]
enum TemplateHandle {
    Cached(Template),
    PerRequest(PathBuf),
}

/// Result of a successful pipeline run.
#[derive(Clone, Debug, PartialEq)]
pub enum Assembled {
    Page(String),
    Redirect(HeaderValue),
}

/// Turns requests into complete html documents.
///
/// Cloning is cheap and clones share the renderer, manifest and cached
/// template. Every request gets its own store, so concurrent requests never
/// see each other's state.
#[derive(Clone)]
pub struct Assembler {
    renderer: Arc<dyn Renderer>,
    preloader: Arc<dyn Preloader>,
    reducer: Arc<dyn Reducer>,
    manifest: Arc<AssetManifest>,
    template: TemplateHandle,
    default_title: Arc<str>,
    render_timeout: Option<Duration>,
}

impl Assembler {
    pub async fn new<R>(cfg: SsrConfig, renderer: R) -> Result<Self, InitializationError>
    where
        R: Renderer + 'static,
    {
        let manifest = match &cfg.manifest {
            Some(path) => AssetManifest::load(path).await?,
            None => AssetManifest::default(),
        };
        let template = match cfg.template_source {
            TemplateSource::Cached => TemplateHandle::Cached(
                Template::load(&cfg.template)
                    .await
                    .map_err(InitializationError::InvalidTemplatePath)?,
            ),
            TemplateSource::PerRequest => TemplateHandle::PerRequest(cfg.template),
        };
        debug!("[RS] Assembler ready with {} manifest entries", manifest.len());
        Ok(Self {
            renderer: Arc::new(renderer),
            preloader: Arc::new(NoPreload),
            reducer: Arc::new(KeyedReducer),
            manifest: Arc::new(manifest),
            template,
            default_title: cfg.default_title.into(),
            render_timeout: cfg.render_timeout,
        })
    }

    pub fn with_preloader<P: Preloader + 'static>(mut self, preloader: P) -> Self {
        self.preloader = Arc::new(preloader);
        self
    }

    pub fn with_reducer<D: Reducer + 'static>(mut self, reducer: D) -> Self {
        self.reducer = Arc::new(reducer);
        self
    }

    pub fn with_manifest(mut self, manifest: AssetManifest) -> Self {
        self.manifest = Arc::new(manifest);
        self
    }

    /// Serves every request from `template` instead of the configured file.
    pub fn with_template(mut self, template: Template) -> Self {
        self.template = TemplateHandle::Cached(template);
        self
    }

    /// Answers a request: `200` with the page, `302` on redirect, `404` on any failure.
    pub async fn respond(&self, request: &RequestContext, data: InitialData) -> Response<String> {
        let request_id = Uuid::new_v4();
        match self.assemble(request_id, request, data).await {
            Ok(Assembled::Page(html)) => {
                trace!("[RS] Request {}: Sending page", request_id);
                let mut res = Response::new(html);
                res.headers_mut().insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static("text/html; charset=utf-8"),
                );
                res
            }
            Ok(Assembled::Redirect(location)) => {
                trace!("[RS] Request {}: Redirecting to {:?}", request_id, location);
                let mut res = Response::new(String::new());
                *res.status_mut() = StatusCode::FOUND;
                res.headers_mut().insert(LOCATION, location);
                res
            }
            Err(err) => {
                error!("[RS] Request {} for {}: {}", request_id, request.uri(), err);
                let mut res = Response::new(String::new());
                *res.status_mut() = StatusCode::NOT_FOUND;
                res
            }
        }
    }

    pub async fn assemble(
        &self,
        request_id: Uuid,
        request: &RequestContext,
        data: InitialData,
    ) -> Result<Assembled, AssembleError> {
        trace!("[RS] Request {}: Starting {}", request_id, request.uri());

        let template = match &self.template {
            TemplateHandle::Cached(template) => template.clone(),
            TemplateHandle::PerRequest(path) => Template::load(path)
                .await
                .map_err(AssembleError::TemplateUnavailable)?,
        };

        let location = request.location()?;
        let mut store = Store::for_request(
            &location.to_string(),
            request.is_logged(),
            data,
            self.reducer.clone(),
        );

        let render = self.render_pass(request_id, &location, &mut store);
        let outcome = match self.render_timeout {
            Some(budget) => time::timeout(budget, render)
                .await
                .map_err(|_| RenderingError::Timeout(budget))??,
            None => render.await?,
        };

        let page = match outcome {
            RenderOutcome::Redirect { url } => {
                return HeaderValue::from_str(&url)
                    .map(Assembled::Redirect)
                    .map_err(|_| RenderingError::InvalidRedirect(url).into());
            }
            RenderOutcome::Rendered(page) => page,
        };

        if let Some(state) = page.state {
            store.replace(state);
        }
        let state = crate::json::to_string(store.snapshot())
            .map_err(RenderingError::StateSerializationError)?;

        let mut scripts = page.head.script;
        scripts.push_str(&self.manifest.script_tags(&page.modules));
        let title = title_tag(&page.head.title, &self.default_title);

        let html = template.inject(&PageParts {
            html_attributes: &page.head.html_attributes,
            title: &title,
            meta: &page.head.meta,
            link: &page.head.link,
            body: &page.markup,
            scripts: &scripts,
            state: &state,
        });
        Ok(Assembled::Page(html))
    }

    async fn render_pass(
        &self,
        request_id: Uuid,
        location: &Location,
        store: &mut Store,
    ) -> Result<RenderOutcome, RenderingError> {
        let mut preloads = Preloads::default();
        self.preloader.declare(location, store.snapshot(), &mut preloads);
        let settled = preloads.settle(store).await?;
        trace!(
            "[RS] Request {}: Settled {} preloads for {}",
            request_id,
            settled,
            location
        );

        self.renderer
            .render(RenderRequest {
                request_id,
                location,
                state: store.snapshot(),
            })
            .await
    }
}
