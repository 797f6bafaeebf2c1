//! Middleware layer.
//!
//! Middleware intercepts requests and responses and is the right place for
//! cross-cutting concerns. Two ship with tsu:
//!
//! - [`Gzip`]: compresses response bodies for clients that send
//!   `Accept-Encoding: gzip`
//! - [`Renderer`]: leaves a [`Render`] in the request extensions so handlers
//!   can answer with JSON, XML, HTML templates, raw bytes or redirects
//!
//! Anything with the shape `async fn(Request, Next) -> Response` is a
//! middleware too:
//!
//! ```rust,no_run
//! use tsu_web::middleware::Next;
//! use tsu_web::{Request, Router};
//!
//! let app = Router::new().middleware(|req: Request, next: Next| async move {
//!     tracing::info!(path = req.path(), "request");
//!     next.run(req).await
//! });
//! ```

use std::future::Future;
use std::sync::Arc;

use crate::handler::BoxedHandler;
use crate::request::Request;
use crate::response::Response;

pub mod gzip;
pub mod render;

pub use crate::handler::BoxFuture;
pub use gzip::{Gzip, GzipWriter};
pub use render::{Data, Delims, FuncMap, HtmlOptions, Render, RenderOptions, Renderer};

/// A request/response interceptor.
///
/// Implementations decide whether to call [`Next::run`]; not calling it
/// short-circuits the chain with whatever response they return instead.
pub trait Middleware: Send + Sync + 'static {
    fn handle(&self, req: Request, next: Next) -> BoxFuture;
}

pub(crate) type BoxedMiddleware = Arc<dyn Middleware>;

impl<F, Fut> Middleware for F
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn handle(&self, req: Request, next: Next) -> BoxFuture {
        Box::pin((self)(req, next))
    }
}

/// The remainder of the chain: the middleware not yet run, then the endpoint.
pub struct Next {
    chain: Arc<Vec<BoxedMiddleware>>,
    index: usize,
    endpoint: BoxedHandler,
}

impl Next {
    pub(crate) fn new(chain: Arc<Vec<BoxedMiddleware>>, endpoint: BoxedHandler) -> Self {
        Self { chain, index: 0, endpoint }
    }

    /// Passes the request on and resolves to the downstream response.
    pub async fn run(mut self, req: Request) -> Response {
        match self.chain.get(self.index).cloned() {
            Some(middleware) => {
                self.index += 1;
                middleware.handle(req, self).await
            }
            None => self.endpoint.call(req).await,
        }
    }
}
