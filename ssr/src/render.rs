use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::RenderingError, request::Location, store::State};

/// Head tags collected while the page rendered. Every field holds ready-made markup.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Head {
    pub title: String,
    pub meta: String,
    pub link: String,
    pub html_attributes: String,
    pub script: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedPage {
    pub markup: String,
    #[serde(default)]
    pub head: Head,
    /// Code-split chunks the render touched, in encounter order.
    #[serde(default)]
    pub modules: Vec<String>,
    /// State after rendering, when the tree changed it. Replaces the store contents.
    #[serde(default)]
    pub state: Option<State>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RenderOutcome {
    Rendered(RenderedPage),
    Redirect { url: String },
}

pub struct RenderRequest<'a> {
    pub request_id: Uuid,
    pub location: &'a Location,
    /// Store snapshot after preloading settled.
    pub state: &'a State,
}

/// Renders the component tree for one location.
///
/// Implementations bind the router to `location`, provide `state` to the tree
/// and report head tags, touched chunks and redirects through the returned
/// [`RenderOutcome`]. They must not keep anything between calls.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, request: RenderRequest<'_>) -> Result<RenderOutcome, RenderingError>;
}
