use std::path::Path;

use serde_json::{Map, Value};

use crate::error::InitializationError;

const CHUNK_SUFFIX: &str = ".js";

/// Build manifest mapping chunk file names to deployed asset paths.
///
/// Entries keep the order of the manifest file; resolved scripts follow it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AssetManifest {
    entries: Vec<(String, String)>,
}

impl AssetManifest {
    pub async fn load(path: &Path) -> Result<Self, InitializationError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(InitializationError::ManifestUnavailable)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, InitializationError> {
        let assets: Map<String, Value> = serde_json::from_str(text)
            .map_err(|err| InitializationError::InvalidManifest(err.to_string()))?;
        assets
            .into_iter()
            .map(|(key, value)| match value {
                Value::String(path) => Ok((key, path)),
                other => Err(InitializationError::InvalidManifest(format!(
                    "asset `{}` maps to {} instead of a path",
                    key, other
                ))),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(|entries| Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Paths of the assets whose chunk was touched, in manifest order.
    ///
    /// Modules without a manifest entry are ignored.
    pub fn resolve<S: AsRef<str>>(&self, modules: &[S]) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(key, _)| {
                let chunk = chunk_name(key);
                modules.iter().any(|module| module.as_ref() == chunk)
            })
            .map(|(_, path)| path.as_str())
            .collect()
    }

    pub fn script_tags<S: AsRef<str>>(&self, modules: &[S]) -> String {
        self.resolve(modules)
            .into_iter()
            .map(|path| format!(r#"<script type="text/javascript" src="/{}"></script>"#, path))
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AssetManifest {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(key, path)| (key.into(), path.into()))
                .collect(),
        }
    }
}

fn chunk_name(key: &str) -> &str {
    key.strip_suffix(CHUNK_SUFFIX).unwrap_or(key)
}
