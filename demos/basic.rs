//! Minimal tsu-web example: JSON, XML and HTML endpoints behind gzip.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/42
//!   curl --compressed http://localhost:3000/xml/users/42
//!   curl http://localhost:3000/users/42/page
//!   curl -i http://localhost:3000/old
//!   curl -X DELETE -i http://localhost:3000/users/42

use http::StatusCode;
use serde::Serialize;
use tsu_web::middleware::{Gzip, Render, RenderOptions, Renderer};
use tsu_web::{Env, Request, Response, Router, Server};

#[derive(Serialize)]
#[serde(rename = "user")]
struct User {
    id: String,
    name: String,
}

#[tokio::main]
async fn main() -> Result<(), tsu_web::Error> {
    tracing_subscriber::fmt::init();

    let env = Env::current();
    let renderer = Renderer::new(RenderOptions {
        directory: concat!(env!("CARGO_MANIFEST_DIR"), "/demos/templates").into(),
        layout: Some("layout".into()),
        reload: env.reload_templates(),
        ..Default::default()
    })?;
    tracing::info!(%env, "starting");

    let app = Router::new()
        .middleware(Gzip::new())
        .middleware(renderer)
        .get("/users/{id}",      get_user)
        .get("/xml/users/{id}",  get_user_xml)
        .get("/users/{id}/page", user_page)
        .get("/old",             moved)
        .delete("/users/{id}",   delete_user);

    Server::bind("0.0.0.0:3000").serve(app).await
}

fn user(req: &Request) -> User {
    User { id: req.param("id").unwrap_or("unknown").to_owned(), name: "alice".into() }
}

// Every route runs behind the renderer, so `take` only misses if the
// middleware is removed.
fn render(req: &mut Request) -> Result<Render, Response> {
    Render::take(req).ok_or_else(|| Response::status(StatusCode::INTERNAL_SERVER_ERROR))
}

// GET /users/{id}
async fn get_user(mut req: Request) -> Response {
    let user = user(&req);
    let mut r = match render(&mut req) {
        Ok(r) => r,
        Err(res) => return res,
    };
    r.json(StatusCode::OK, &user);
    r.into_writer()
}

// GET /xml/users/{id}
async fn get_user_xml(mut req: Request) -> Response {
    let user = user(&req);
    let mut r = match render(&mut req) {
        Ok(r) => r,
        Err(res) => return res,
    };
    r.xml(StatusCode::OK, &user);
    r.into_writer()
}

// GET /users/{id}/page, rendered inside demos/templates/layout.html
async fn user_page(mut req: Request) -> Response {
    let user = user(&req);
    let mut r = match render(&mut req) {
        Ok(r) => r,
        Err(res) => return res,
    };
    r.html(StatusCode::OK, "user", &user, None);
    r.into_writer()
}

// GET /old → 301 to /users/1
async fn moved(mut req: Request) -> Response {
    let mut r = match render(&mut req) {
        Ok(r) => r,
        Err(res) => return res,
    };
    r.redirect("/users/1", StatusCode::MOVED_PERMANENTLY);
    r.into_writer()
}

// DELETE /users/{id} → 204 No Content
async fn delete_user(_req: Request) -> Response {
    Response::status(StatusCode::NO_CONTENT)
}
