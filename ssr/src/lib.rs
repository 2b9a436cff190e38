#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_json;

mod assembler;
mod config;
mod error;
mod json;
mod manifest;
mod node;
mod preload;
mod render;
mod request;
mod store;
mod template;
mod worker;

pub use assembler::{Assembled, Assembler};
pub use config::{JsWorkerLog, SsrConfig, TemplateSource, WorkerConfig};
pub use error::{AssembleError, InitializationError, RenderingError};
pub use manifest::AssetManifest;
pub use node::{JsRenderer, NodeRenderer};
pub use preload::{NoPreload, PreloadError, PreloadFuture, Preloader, Preloads};
pub use render::{Head, RenderOutcome, RenderRequest, RenderedPage, Renderer};
pub use request::{InitialData, Location, RequestContext};
pub use store::{Action, KeyedReducer, Reducer, State, Store};
pub use template::{title_tag, PageParts, Template, STATE_GLOBAL};
