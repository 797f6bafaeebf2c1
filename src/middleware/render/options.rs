//! Registration-time configuration for [`Renderer`](super::Renderer).

use std::collections::BTreeMap;
use std::path::PathBuf;

use minijinja::Value;

pub const CONTENT_BINARY: &str = "application/octet-stream";
pub const CONTENT_JSON: &str = "application/json";
pub const CONTENT_HTML: &str = "text/html";
pub const CONTENT_XHTML: &str = "application/xhtml+xml";
pub const CONTENT_XML: &str = "text/xml";
pub const DEFAULT_CHARSET: &str = "UTF-8";

/// Settings for template discovery and output formatting.
///
/// Construct with struct-update syntax over the defaults:
///
/// ```rust
/// use tsu_web::middleware::RenderOptions;
///
/// let options = RenderOptions {
///     directory: "views".into(),
///     layout: Some("layout".into()),
///     indent_json: true,
///     ..Default::default()
/// };
/// ```
#[derive(Clone, Debug)]
pub struct RenderOptions {
    /// Directory to load templates from. Default `templates`.
    pub directory: PathBuf,
    /// Layout wrapped around every HTML render unless overridden per call.
    pub layout: Option<String>,
    /// File extensions (everything after the first dot of the file name)
    /// that mark a template. Default `[".html"]`.
    pub extensions: Vec<String>,
    /// Helper function tables registered on every template.
    pub funcs: Vec<FuncMap>,
    /// Replacement for the `{{ }}` variable delimiters.
    pub delims: Option<Delims>,
    /// Appended to textual content types as `; charset=…`. Empty means `UTF-8`.
    pub charset: String,
    pub indent_json: bool,
    pub indent_xml: bool,
    /// Written before every JSON body, e.g. `)]}',\n`.
    pub prefix_json: Vec<u8>,
    pub prefix_xml: Vec<u8>,
    /// Content type for HTML renders. Default `text/html`.
    pub html_content_type: String,
    /// Recompile templates from disk on every request instead of cloning
    /// the set compiled at startup. See [`Env`](crate::Env).
    pub reload: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("templates"),
            layout: None,
            extensions: vec![".html".to_owned()],
            funcs: Vec::new(),
            delims: None,
            charset: DEFAULT_CHARSET.to_owned(),
            indent_json: false,
            indent_xml: false,
            prefix_json: Vec::new(),
            prefix_xml: Vec::new(),
            html_content_type: CONTENT_HTML.to_owned(),
            reload: false,
        }
    }
}

impl RenderOptions {
    /// Fills in defaults for fields left empty, the way a zeroed options
    /// value is interpreted.
    pub(crate) fn normalized(mut self) -> Self {
        if self.directory.as_os_str().is_empty() {
            self.directory = PathBuf::from("templates");
        }
        if self.extensions.is_empty() {
            self.extensions = vec![".html".to_owned()];
        }
        if self.html_content_type.is_empty() {
            self.html_content_type = CONTENT_HTML.to_owned();
        }
        self
    }

    /// `; charset=<charset>`, ready to append to a content type.
    pub(crate) fn charset_suffix(&self) -> String {
        let charset = if self.charset.is_empty() { DEFAULT_CHARSET } else { &self.charset };
        format!("; charset={charset}")
    }
}

/// Left and right variable delimiters, replacing `{{` and `}}`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delims {
    pub left: String,
    pub right: String,
}

impl Delims {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self { left: left.into(), right: right.into() }
    }
}

/// A table of named template helpers.
///
/// ```rust
/// use minijinja::Value;
/// use tsu_web::middleware::FuncMap;
///
/// let funcs = FuncMap::new()
///     .with("shout", Value::from_function(|s: String| s.to_uppercase()));
/// ```
#[derive(Clone, Debug, Default)]
pub struct FuncMap(BTreeMap<String, Value>);

impl FuncMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a helper. Any value works; callables come from
    /// [`Value::from_function`].
    pub fn with(mut self, name: impl Into<String>, func: Value) -> Self {
        self.0.insert(name.into(), func);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Per-call overrides for [`Render::html`](super::Render::html).
#[derive(Clone, Debug, Default)]
pub struct HtmlOptions {
    /// Replaces the configured layout; `None` renders without one.
    pub layout: Option<String>,
}

impl HtmlOptions {
    pub fn layout(name: impl Into<String>) -> Self {
        Self { layout: Some(name.into()) }
    }

    pub fn no_layout() -> Self {
        Self { layout: None }
    }
}
