use std::{fs, net::SocketAddr, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};
use uuid::Uuid;

use crate::{
    config::WorkerConfig,
    error::{InitializationError, RenderingError},
    render::{RenderOutcome, RenderRequest, RenderedPage, Renderer},
    request::Location,
    store::State,
    worker::{Port, Worker},
};

#[derive(Clone, Debug)]
pub enum JsRenderer {
    Global,
    PerRequest { path: PathBuf },
}

/// Renders pages in a node.js worker process.
///
/// Every render opens a fresh connection to the worker, writes
/// `meta length | data length | meta | data` (lengths are big endian `u32`)
/// and reads the reply until the worker closes the connection.
#[derive(Clone)]
pub struct NodeRenderer {
    worker: Arc<Worker>,
    has_global_renderer: bool,
    js_renderer: JsRenderer,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WorkerReply {
    Redirect { redirect: String },
    Rendered(RenderedPage),
}

impl NodeRenderer {
    pub fn spawn(cfg: WorkerConfig) -> Result<Self, InitializationError> {
        let js_worker = fs::canonicalize(cfg.js_worker)
            .map_err(InitializationError::InvalidJsWorkerPath)?;
        let global_js_renderer = match cfg.global_js_renderer {
            Some(path) => Some(
                fs::canonicalize(path)
                    .map_err(InitializationError::InvalidGlobalJsRendererPath)?,
            ),
            None => None,
        };
        let worker = Worker::spawn(
            Port::new(cfg.port),
            &js_worker,
            cfg.js_worker_log,
            global_js_renderer.as_deref(),
        )?;
        info!("{worker}: Spawned js worker", worker = worker);
        Ok(Self {
            worker: Arc::new(worker),
            has_global_renderer: global_js_renderer.is_some(),
            js_renderer: JsRenderer::Global,
        })
    }

    /// Uses a worker that is already running at `addr`.
    pub fn attach(addr: SocketAddr, has_global_renderer: bool) -> Self {
        Self {
            worker: Arc::new(Worker::attach(addr)),
            has_global_renderer,
            js_renderer: JsRenderer::Global,
        }
    }

    pub fn with_js_renderer(mut self, js_renderer: JsRenderer) -> Self {
        self.js_renderer = js_renderer;
        self
    }

    fn encode_request(
        &self,
        request_id: &Uuid,
        location: &Location,
        state: &State,
    ) -> Result<Vec<u8>, RenderingError> {
        let request_renderer = match (self.has_global_renderer, &self.js_renderer) {
            (true, JsRenderer::Global) => None,
            (_, JsRenderer::PerRequest { path }) => Some(path),
            (false, JsRenderer::Global) => return Err(RenderingError::GlobalRendererNotProvided),
        };

        let meta = json!({
          "requestId": request_id,
          "requestRenderer": request_renderer,
          "url": json!({"path": location.path(), "query": location.query()}),
        });
        let meta_bytes =
            serde_json::to_vec(&meta).map_err(RenderingError::UrlSerializationError)?;
        let data_bytes =
            crate::json::to_vec(state).map_err(RenderingError::DataSerializationError)?;

        let meta_len = meta_bytes.len() as u32;
        let data_len = data_bytes.len() as u32;
        let mut input = Vec::with_capacity(8 + meta_bytes.len() + data_bytes.len());
        input.extend_from_slice(&meta_len.to_be_bytes());
        input.extend_from_slice(&data_len.to_be_bytes());
        input.extend(meta_bytes);
        input.extend(data_bytes);
        Ok(input)
    }

    async fn finalize_rendering_session(&self, connection: &mut TcpStream, request_id: &Uuid) {
        if let Err(err) = connection.shutdown().await {
            warn!(
                "{worker}: Failed to shutdown connection to the js worker: {err}",
                worker = self.worker.display_with_request_id(request_id),
                err = err
            );
        };
    }
}

#[async_trait]
impl Renderer for NodeRenderer {
    async fn render(&self, request: RenderRequest<'_>) -> Result<RenderOutcome, RenderingError> {
        let request_id = request.request_id;
        let input = self.encode_request(&request_id, request.location, request.state)?;

        let worker = &self.worker;
        let mut stream = match worker.connect().await {
            Ok(stream) => stream,
            Err(err) => {
                warn!(
                    "{worker}: Failed to connect: {err}",
                    worker = worker.display_with_request_id(&request_id),
                    err = err
                );
                return Err(RenderingError::ConnectionError(err));
            }
        };

        let mut res = String::new();

        if let Err(err) = stream.write_all(input.as_slice()).await {
            self.finalize_rendering_session(&mut stream, &request_id).await;
            return Err(RenderingError::RenderRequestError(err));
        };
        if let Err(err) = stream.read_to_string(&mut res).await {
            self.finalize_rendering_session(&mut stream, &request_id).await;
            return Err(RenderingError::RenderResponseError(err));
        };

        // No need to shutdown connection as it's already closed by the js worker
        parse_reply(&res)
    }
}

fn parse_reply(res: &str) -> Result<RenderOutcome, RenderingError> {
    if let Some(stack) = res.strip_prefix("ERROR:") {
        return Err(RenderingError::JsExceptionDuringRendering(stack.to_owned()));
    }
    match serde_json::from_str::<WorkerReply>(res).map_err(RenderingError::InvalidRenderResult)? {
        WorkerReply::Redirect { redirect } => Ok(RenderOutcome::Redirect { url: redirect }),
        WorkerReply::Rendered(page) => Ok(RenderOutcome::Rendered(page)),
    }
}
