use std::{path::PathBuf, time::Duration};

/// How the html template is read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TemplateSource {
    /// Read once when the assembler is created and shared by every request.
    Cached,
    /// Read from disk at the start of every request.
    PerRequest,
}

pub struct SsrConfig {
    /// Html template produced by the client build.
    pub template: PathBuf,
    pub template_source: TemplateSource,
    /// Asset manifest (`{"<chunk>.js": "<deployed path>"}`). No manifest means no chunk scripts.
    pub manifest: Option<PathBuf>,
    /// Title used when the rendered page doesn't set one.
    pub default_title: String,
    /// Budget for preloading plus rendering of a single request. `None` waits forever.
    pub render_timeout: Option<Duration>,
}

impl Default for SsrConfig {
    fn default() -> Self {
        Self {
            template: PathBuf::from("assets/template.html"),
            template_source: TemplateSource::PerRequest,
            manifest: Some(PathBuf::from("assets/manifest.json")),
            default_title: String::new(),
            render_timeout: Some(Duration::from_secs(10)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JsWorkerLog {
    Minimal,
    Verbose,
}

impl JsWorkerLog {
    pub fn to_str(&self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Verbose => "verbose",
        }
    }
}

pub struct WorkerConfig {
    pub port: u16,
    pub js_worker: PathBuf,
    pub js_worker_log: JsWorkerLog,
    pub global_js_renderer: Option<PathBuf>,
}
