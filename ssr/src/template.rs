use std::{
    io,
    ops::Range,
    path::Path,
    sync::{Arc, OnceLock},
};

use regex::Regex;

/// Global the client bootstrap reads the preloaded state from.
pub const STATE_GLOBAL: &str = "__PRELOADED_STATE__";

const HTML_OPEN: &str = "<html>";
const META: &str = "{{META}}";
const LINK: &str = "{{LINK}}";
const ROOT: &str = r#"<div id="root"></div>"#;
const BODY_CLOSE: &str = "</body>";

fn title_pattern() -> &'static Regex {
    static TITLE: OnceLock<Regex> = OnceLock::new();
    TITLE.get_or_init(|| Regex::new(r"<title>.*?</title>").expect("title pattern is valid"))
}

/// Everything a rendered page contributes to the document.
#[derive(Clone, Copy, Debug, Default)]
pub struct PageParts<'a> {
    pub html_attributes: &'a str,
    /// Complete `<title>` element.
    pub title: &'a str,
    pub meta: &'a str,
    pub link: &'a str,
    pub body: &'a str,
    pub scripts: &'a str,
    /// Script-safe JSON of the store.
    pub state: &'a str,
}

/// Html document produced by the client build.
#[derive(Clone, Debug)]
pub struct Template {
    source: Arc<str>,
}

impl Template {
    pub fn new(source: impl Into<Arc<str>>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub async fn load(path: &Path) -> io::Result<Self> {
        let source = tokio::fs::read_to_string(path).await?;
        Ok(Self::new(source))
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Fills the placeholders with the page parts.
    ///
    /// Placeholders are located in the template before anything is inserted,
    /// so inserted content is never matched as a placeholder itself.
    pub fn inject(&self, parts: &PageParts<'_>) -> String {
        let source = self.as_str();
        let mut edits: Vec<(Range<usize>, String)> = Vec::new();

        let mut first = |needle: &str, replacement: String| {
            if let Some(start) = source.find(needle) {
                edits.push((start..start + needle.len(), replacement));
            }
        };
        first(HTML_OPEN, format!("<html {}>", parts.html_attributes));
        first(META, parts.meta.to_owned());
        first(LINK, parts.link.to_owned());
        first(
            ROOT,
            format!(
                r#"<div id="root">{}</div><script>window.{} = {}</script>"#,
                parts.body, STATE_GLOBAL, parts.state
            ),
        );
        first(BODY_CLOSE, format!("{}{}", parts.scripts, BODY_CLOSE));

        for found in title_pattern().find_iter(source) {
            edits.push((found.range(), parts.title.to_owned()));
        }

        edits.sort_by_key(|(range, _)| range.start);

        let inserted: usize = edits.iter().map(|(_, text)| text.len()).sum();
        let mut html = String::with_capacity(source.len() + inserted);
        let mut cursor = 0;
        for (range, text) in edits {
            // A placeholder inside an earlier match (say `{{META}}` inside `<title>`) is consumed by it.
            if range.start < cursor {
                continue;
            }
            html.push_str(&source[cursor..range.start]);
            html.push_str(&text);
            cursor = range.end;
        }
        html.push_str(&source[cursor..]);
        html
    }
}

/// Rendered `<title>` element, or the default title when the page set none.
pub fn title_tag(rendered: &str, default_title: &str) -> String {
    if rendered.is_empty() {
        format!("<title>{}</title>", default_title)
    } else {
        rendered.to_owned()
    }
}
