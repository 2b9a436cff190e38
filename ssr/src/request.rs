use std::fmt;

use http::Uri;
use serde_json::{Map, Value};

use crate::error::RenderingError;

/// Caller supplied preload results, keyed by whatever the application expects.
pub type InitialData = Map<String, Value>;

/// Inbound request as seen by the assembler.
#[derive(Clone, Debug)]
pub struct RequestContext {
    uri: Uri,
    logged: bool,
}

impl RequestContext {
    pub fn new(uri: Uri) -> Self {
        Self { uri, logged: false }
    }

    pub fn logged(mut self, logged: bool) -> Self {
        self.logged = logged;
        self
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn is_logged(&self) -> bool {
        self.logged
    }

    pub fn location(&self) -> Result<Location, RenderingError> {
        match self.uri.path_and_query() {
            Some(url) => Ok(Location {
                path: url.path().to_owned(),
                query: url.query().map(str::to_owned),
            }),
            None => Err(RenderingError::InvalidUri),
        }
    }
}

/// Path and query the router is bound to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    path: String,
    query: Option<String>,
}

impl Location {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.query {
            Some(query) => write!(f, "{}?{}", self.path, query),
            None => write!(f, "{}", self.path),
        }
    }
}
