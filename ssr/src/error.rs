use std::{error::Error, fmt, io, time::Duration};

use crate::preload::PreloadError;

#[derive(Debug)]
pub enum InitializationError {
    InvalidJsWorkerPath(io::Error),
    InvalidGlobalJsRendererPath(io::Error),
    SpawnNodeProcessError(io::Error),
    InvalidTemplatePath(io::Error),
    ManifestUnavailable(io::Error),
    InvalidManifest(String),
}

impl From<io::Error> for InitializationError {
    fn from(err: io::Error) -> Self {
        Self::SpawnNodeProcessError(err)
    }
}

impl fmt::Display for InitializationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidJsWorkerPath(err) => write!(
                f,
                "Invalid js worker path: {}. Make sure file at path exists and path is valid.",
                err
            ),
            Self::InvalidGlobalJsRendererPath(err) => write!(
                f,
                "Invalid global js renderer path: {}. Make sure file at path exists and path is valid.",
                err
            ),
            Self::SpawnNodeProcessError(err) => {
                write!(f, "Failed to spawn worker process: {}", err)
            }
            Self::InvalidTemplatePath(err) => write!(
                f,
                "Invalid html template path: {}. Make sure the build produced the template.",
                err
            ),
            Self::ManifestUnavailable(err) => write!(f, "Failed to read asset manifest: {}", err),
            Self::InvalidManifest(reason) => write!(f, "Invalid asset manifest: {}", reason),
        }
    }
}

impl Error for InitializationError {}

#[derive(Debug)]
pub enum RenderingError {
    ConnectionError(io::Error),
    InvalidUri,
    GlobalRendererNotProvided,
    UrlSerializationError(serde_json::Error),
    DataSerializationError(serde_json::Error),
    StateSerializationError(serde_json::Error),
    RenderRequestError(io::Error),
    RenderResponseError(io::Error),
    JsExceptionDuringRendering(String),
    InvalidRenderResult(serde_json::Error),
    InvalidRedirect(String),
    PreloadRejected(PreloadError),
    Timeout(Duration),
}

impl fmt::Display for RenderingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionError(err) => write!(f, "Connection error: {}", err),
            Self::InvalidUri => write!(f, "Invalid URI"),
            Self::GlobalRendererNotProvided => write!(f, "Rendering request supposed to use global js renderer but it wasn't provided on renderer initialization"),
            Self::UrlSerializationError(err) => write!(f, "Failed to serialize URL: {}", err),
            Self::DataSerializationError(err) => write!(f, "Failed to serialize data: {}", err),
            Self::StateSerializationError(err) => {
                write!(f, "Failed to serialize preloaded state: {}", err)
            }
            Self::RenderRequestError(err) | Self::RenderResponseError(err) => {
                write!(f, "Failed to communicate with rendering process: {}", err)
            }
            Self::JsExceptionDuringRendering(err) => {
                write!(f, "JS Exception during rendering: {}", err)
            }
            Self::InvalidRenderResult(err) => {
                write!(f, "Rendering process returned malformed result: {}", err)
            }
            Self::InvalidRedirect(url) => {
                write!(f, "Redirect target is not a valid Location header: {}", url)
            }
            Self::PreloadRejected(err) => write!(f, "Preload rejected: {}", err),
            Self::Timeout(budget) => write!(f, "Rendering did not finish within {:?}", budget),
        }
    }
}

impl Error for RenderingError {}

/// Why a request could not be answered with a page or a redirect.
///
/// Both kinds are answered with `404 Not Found` and an empty body. The
/// distinction exists for logging only.
#[derive(Debug)]
pub enum AssembleError {
    TemplateUnavailable(io::Error),
    RenderFailure(RenderingError),
}

impl From<RenderingError> for AssembleError {
    fn from(err: RenderingError) -> Self {
        Self::RenderFailure(err)
    }
}

impl fmt::Display for AssembleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TemplateUnavailable(err) => write!(f, "Template is unavailable: {}", err),
            Self::RenderFailure(err) => write!(f, "Render failed: {}", err),
        }
    }
}

impl Error for AssembleError {}
