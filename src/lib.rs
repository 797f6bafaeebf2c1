//! # tsu-web
//!
//! A small HTTP framework with response compression and rendering built in.
//!
//! ## What ships
//!
//! - Radix-tree routing via [`matchit`], `{name}` path parameters
//! - Middleware chains: anything shaped `async fn(Request, Next) -> Response`
//! - [`middleware::Gzip`]: gzip bodies for clients that accept it
//! - [`middleware::Renderer`]: JSON, XML, HTML templates with layouts, raw
//!   bytes, redirects and status helpers
//! - hyper underneath, HTTP/1.1 and HTTP/2, graceful shutdown on SIGTERM / Ctrl-C
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use http::StatusCode;
//! use serde::Serialize;
//! use tsu_web::middleware::{Gzip, Render, RenderOptions, Renderer};
//! use tsu_web::{Env, Request, Response, Router, Server};
//!
//! #[derive(Serialize)]
//! struct User { id: String }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tsu_web::Error> {
//!     let renderer = Renderer::new(RenderOptions {
//!         directory: "templates".into(),
//!         reload: Env::current().reload_templates(),
//!         ..Default::default()
//!     })?;
//!
//!     let app = Router::new()
//!         .middleware(Gzip::new())
//!         .middleware(renderer)
//!         .get("/users/{id}", get_user);
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await
//! }
//!
//! async fn get_user(mut req: Request) -> Response {
//!     let user = User { id: req.param("id").unwrap_or_default().to_owned() };
//!     let Some(mut r) = Render::take(&mut req) else {
//!         return Response::status(StatusCode::INTERNAL_SERVER_ERROR);
//!     };
//!     r.json(StatusCode::OK, &user);
//!     r.into_writer()
//! }
//! ```

mod error;
mod env;
mod handler;
mod request;
mod response;
mod router;
mod server;
mod writer;

pub mod middleware;
pub mod sniff;

pub use env::{ENV_VAR, Env};
pub use error::Error;
pub use handler::Handler;
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
pub use writer::ResponseWriter;
