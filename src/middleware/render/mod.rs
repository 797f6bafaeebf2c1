//! Response rendering: JSON, XML, HTML templates, raw bytes and redirects.
//!
//! [`Renderer`] is registered once; it compiles the template directory up
//! front and, for every request, leaves a [`Render`] in the request
//! extensions. Handlers take it out, write through it, and return it:
//!
//! ```rust,no_run
//! use http::StatusCode;
//! use tsu_web::middleware::{Render, RenderOptions, Renderer};
//! use tsu_web::{Request, Response, Router};
//!
//! # fn main() -> Result<(), tsu_web::Error> {
//! let app = Router::new()
//!     .middleware(Renderer::new(RenderOptions::default())?)
//!     .get("/hello/{name}", hello);
//! # Ok(())
//! # }
//!
//! async fn hello(mut req: Request) -> Response {
//!     let name = req.param("name").unwrap_or("world").to_owned();
//!     let Some(mut r) = Render::take(&mut req) else {
//!         return Response::status(StatusCode::INTERNAL_SERVER_ERROR);
//!     };
//!     r.html(StatusCode::OK, "hello", &name, None);
//!     r.into_writer()
//! }
//! ```
//!
//! Every render method writes headers, then the status, then the body. When
//! serialization or template execution fails, nothing of the intended
//! response is written; the client gets a `500` with the error text instead.

mod data;
mod options;
mod templates;

use std::io;
use std::sync::Arc;

use http::header::{CONTENT_TYPE, LOCATION, X_CONTENT_TYPE_OPTIONS};
use http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use minijinja::{Environment, Error as TemplateError, Value, context};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::Error;
use crate::handler::BoxFuture;
use crate::middleware::{Middleware, Next};
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::writer::ResponseWriter;

pub use data::Data;
pub use options::{
    CONTENT_BINARY, CONTENT_HTML, CONTENT_JSON, CONTENT_XHTML, CONTENT_XML, DEFAULT_CHARSET,
    Delims, FuncMap, HtmlOptions, RenderOptions,
};
pub use templates::compile;

// ── Renderer ──────────────────────────────────────────────────────────────────

/// Middleware that hands every request a [`Render`].
///
/// Cheap to clone; clones share the compiled templates.
#[derive(Clone)]
pub struct Renderer {
    shared: Arc<Shared>,
}

struct Shared {
    options: Arc<RenderOptions>,
    charset: Arc<str>,
    compiled: Environment<'static>,
}

impl Renderer {
    /// Compiles the template directory.
    ///
    /// Any template that fails to parse fails construction, so a broken
    /// template never makes it into a running server.
    pub fn new(options: RenderOptions) -> Result<Self, Error> {
        let options = options.normalized();
        let compiled = compile(&options)?;
        let charset = options.charset_suffix().into();
        info!(dir = %options.directory.display(), reload = options.reload, "renderer ready");
        Ok(Self {
            shared: Arc::new(Shared { options: Arc::new(options), charset, compiled }),
        })
    }

    /// The template set for one request: freshly compiled from disk when
    /// `reload` is on, otherwise a clone of the startup set.
    ///
    /// A clone shares the parsed templates but has its own function table,
    /// so layouts rendering concurrently cannot see each other's `yield`.
    pub fn templates(&self) -> Result<Environment<'static>, Error> {
        if self.shared.options.reload {
            compile(&self.shared.options)
        } else {
            Ok(self.shared.compiled.clone())
        }
    }

    /// Builds a [`Render`] for `req` that writes into `writer`.
    pub fn render<W: ResponseWriter>(&self, writer: W, req: &Request) -> Result<Render<W>, Error> {
        Ok(Render {
            writer,
            method: req.method().clone(),
            uri: req.uri().clone(),
            templates: self.templates()?,
            options: Arc::clone(&self.shared.options),
            charset: Arc::clone(&self.shared.charset),
            data: Data::new(),
        })
    }
}

impl Middleware for Renderer {
    fn handle(&self, mut req: Request, next: Next) -> BoxFuture {
        let renderer = self.clone();
        Box::pin(async move {
            match renderer.render(Response::new(), &req) {
                Ok(render) => {
                    req.extensions_mut().insert(render);
                }
                Err(e) => {
                    error!("template compilation failed: {e}");
                    let mut res = Response::new();
                    http_error(&mut res, &e.to_string(), StatusCode::INTERNAL_SERVER_ERROR);
                    return res;
                }
            }
            next.run(req).await
        })
    }
}

// ── Render ────────────────────────────────────────────────────────────────────

/// Per-request rendering helper.
///
/// Wraps a [`ResponseWriter`] (a buffered [`Response`] unless built by hand
/// through [`Renderer::render`]) and is itself a `ResponseWriter`, so headers
/// can be set on it before rendering:
///
/// ```rust,ignore
/// r.header_mut().insert(CONTENT_TYPE, HeaderValue::from_static("image/jpeg"));
/// r.write_data(StatusCode::OK, &jpeg_bytes);
/// ```
#[derive(Clone)]
pub struct Render<W = Response> {
    writer: W,
    method: Method,
    uri: Uri,
    templates: Environment<'static>,
    options: Arc<RenderOptions>,
    charset: Arc<str>,
    data: Data,
}

impl Render {
    /// Takes the `Render` the [`Renderer`] middleware left on `req`.
    pub fn take(req: &mut Request) -> Option<Self> {
        req.extensions_mut().remove::<Self>()
    }
}

impl<W: ResponseWriter> Render<W> {
    /// Writes `value` as JSON, preceded by the configured JSON prefix.
    pub fn json<T: Serialize + ?Sized>(&mut self, status: StatusCode, value: &T) {
        let result = if self.options.indent_json {
            serde_json::to_vec_pretty(value)
        } else {
            serde_json::to_vec(value)
        };
        let body = match result {
            Ok(body) => body,
            Err(e) => return http_error(&mut self.writer, &e.to_string(), StatusCode::INTERNAL_SERVER_ERROR),
        };

        self.set_content_type(CONTENT_JSON);
        self.writer.write_status(status);
        if !self.options.prefix_json.is_empty() {
            write_body(&mut self.writer, &self.options.prefix_json);
        }
        write_body(&mut self.writer, &body);
    }

    /// The JSON [`json`](Render::json) would write, without the prefix.
    pub fn json_string<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, Error> {
        let out = if self.options.indent_json {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        Ok(out)
    }

    /// Writes `value` as XML, preceded by the configured XML prefix.
    pub fn xml<T: Serialize + ?Sized>(&mut self, status: StatusCode, value: &T) {
        let body = match self.encode_xml(value) {
            Ok(body) => body,
            Err(e) => return http_error(&mut self.writer, &e, StatusCode::INTERNAL_SERVER_ERROR),
        };

        self.set_content_type(CONTENT_XML);
        self.writer.write_status(status);
        if !self.options.prefix_xml.is_empty() {
            write_body(&mut self.writer, &self.options.prefix_xml);
        }
        write_body(&mut self.writer, body.as_bytes());
    }

    fn encode_xml<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, String> {
        let mut out = String::new();
        let mut ser = quick_xml::se::Serializer::new(&mut out);
        if self.options.indent_xml {
            ser.indent(' ', 2);
        }
        value.serialize(ser).map_err(|e| e.to_string())?;
        Ok(out)
    }

    /// Renders template `name` with `value`, inside a layout if one applies.
    ///
    /// The layout comes from `options` when given (even if it is `None`),
    /// otherwise from [`RenderOptions::layout`]. Inside the layout,
    /// `{{ yield() }}` renders the content template and `{{ current() }}`
    /// returns its name.
    pub fn html<T: Serialize + ?Sized>(
        &mut self,
        status: StatusCode,
        name: &str,
        value: &T,
        options: impl Into<Option<HtmlOptions>>,
    ) {
        let out = match self.render_html(name, value, options.into()) {
            Ok(out) => out,
            Err(e) => return http_error(&mut self.writer, &e.to_string(), StatusCode::INTERNAL_SERVER_ERROR),
        };

        let html_content_type = self.options.html_content_type.clone();
        self.set_content_type(&html_content_type);
        self.writer.write_status(status);
        write_body(&mut self.writer, out.as_bytes());
    }

    /// The markup [`html`](Render::html) would write.
    pub fn html_string<T: Serialize + ?Sized>(
        &mut self,
        name: &str,
        value: &T,
        options: impl Into<Option<HtmlOptions>>,
    ) -> Result<String, Error> {
        Ok(self.render_html(name, value, options.into())?)
    }

    fn render_html<T: Serialize + ?Sized>(
        &mut self,
        name: &str,
        value: &T,
        options: Option<HtmlOptions>,
    ) -> Result<String, TemplateError> {
        let layout = match options {
            Some(options) => options.layout,
            None => self.options.layout.clone(),
        };
        let ctx = self.context(value);

        match layout.filter(|l| !l.is_empty()) {
            Some(layout) => {
                self.add_yield(name, &ctx);
                templates::execute(&self.templates, &layout, &ctx)
            }
            None => templates::execute(&self.templates, name, &ctx),
        }
    }

    /// `this` is the bound value; map fields are also top-level variables.
    fn context<T: Serialize + ?Sized>(&self, value: &T) -> Value {
        let this = Value::from_serialize(value);
        context! { this => this.clone(), data => self.data.to_value(), ..this }
    }

    /// Points `yield` and `current` at the content template for this
    /// request's template set only.
    fn add_yield(&mut self, name: &str, ctx: &Value) {
        let current = name.to_owned();
        self.templates.add_function("current", move || current.clone());

        // The content template renders against the set as it is now, with
        // `current` set and the default `yield`.
        let content_env = self.templates.clone();
        let content = name.to_owned();
        let ctx = ctx.clone();
        self.templates.add_function("yield", move || -> Result<Value, TemplateError> {
            templates::execute(&content_env, &content, &ctx).map(Value::from_safe_string)
        });
    }

    /// Writes raw bytes. `Content-Type` defaults to `application/octet-stream`
    /// but a type set beforehand is kept.
    pub fn write_data(&mut self, status: StatusCode, data: &[u8]) {
        let unset = self.writer.header().get(CONTENT_TYPE).is_none_or(|v| v.is_empty());
        if unset {
            self.writer.header_mut().insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_BINARY));
        }
        self.writer.write_status(status);
        write_body(&mut self.writer, data);
    }

    /// Redirects to `location`, resolved against the current request path
    /// unless it is an absolute URL. `status` defaults to `302 Found`.
    pub fn redirect(&mut self, location: &str, status: impl Into<Option<StatusCode>>) {
        let status = status.into().unwrap_or(StatusCode::FOUND);
        let target = resolve_location(&self.uri, location);
        let had_content_type = self.writer.header().contains_key(CONTENT_TYPE);

        match HeaderValue::try_from(target.as_str()) {
            Ok(value) => {
                self.writer.header_mut().insert(LOCATION, value);
            }
            Err(_) => warn!(location = %target, "redirect target is not a valid header value"),
        }

        let get = self.method == Method::GET;
        if !had_content_type && (get || self.method == Method::HEAD) {
            self.writer.header_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
        }
        self.writer.write_status(status);

        if !had_content_type && get {
            let reason = status.canonical_reason().unwrap_or_default();
            let body = format!("<a href=\"{}\">{reason}</a>.\n", escape_html(&target));
            write_body(&mut self.writer, body.as_bytes());
        }
    }

    /// Writes a bare status.
    pub fn status(&mut self, status: StatusCode) {
        self.writer.write_status(status);
    }

    /// Writes `status`, then `message` verbatim if given.
    pub fn error<'m>(&mut self, status: StatusCode, message: impl Into<Option<&'m str>>) {
        self.writer.write_status(status);
        if let Some(message) = message.into() {
            write_body(&mut self.writer, message.as_bytes());
        }
    }

    /// The template set this request renders with.
    pub fn template(&self) -> &Environment<'static> { &self.templates }

    pub fn data(&self) -> &Data { &self.data }
    pub fn data_mut(&mut self) -> &mut Data { &mut self.data }

    pub fn into_writer(self) -> W { self.writer }

    fn set_content_type(&mut self, base: &str) {
        let full = format!("{base}{}", self.charset);
        match HeaderValue::try_from(full) {
            Ok(value) => {
                self.writer.header_mut().insert(CONTENT_TYPE, value);
            }
            Err(_) => warn!(content_type = base, "charset makes an invalid content type; header not set"),
        }
    }
}

impl<W: ResponseWriter> ResponseWriter for Render<W> {
    fn header(&self) -> &HeaderMap { self.writer.header() }
    fn header_mut(&mut self) -> &mut HeaderMap { self.writer.header_mut() }
    fn write_status(&mut self, status: StatusCode) { self.writer.write_status(status) }
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> { self.writer.write(buf) }
}

impl IntoResponse for Render<Response> {
    fn into_response(self) -> Response { self.writer }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Plain-text error response in the shape browsers and curl expect: the
/// message plus a newline, never sniffed.
pub(crate) fn http_error<W: ResponseWriter>(writer: &mut W, message: &str, status: StatusCode) {
    let headers = writer.header_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    writer.write_status(status);
    write_body(writer, format!("{message}\n").as_bytes());
}

/// Transport errors are not ours to handle; the writer below decides.
fn write_body<W: ResponseWriter>(writer: &mut W, bytes: &[u8]) {
    if let Err(e) = writer.write(bytes) {
        debug!("response write failed: {e}");
    }
}

fn resolve_location(current: &Uri, location: &str) -> String {
    // Absolute (`https://…`) and scheme-relative (`//host/…`) targets go out as given.
    if location.starts_with("//") || Url::parse(location).is_ok() {
        return location.to_owned();
    }

    let joined = Url::parse("http://localhost")
        .and_then(|base| base.join(current.path()))
        .and_then(|base| base.join(location));
    let Ok(joined) = joined else {
        return location.to_owned();
    };

    let mut out = joined.path().to_owned();
    if let Some(query) = joined.query() {
        out.push('?');
        out.push_str(query);
    }
    if let Some(fragment) = joined.fragment() {
        out.push('#');
        out.push_str(fragment);
    }
    out
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
