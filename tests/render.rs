use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, LOCATION};
use http::{HeaderValue, Method, StatusCode};
use minijinja::Value;
use serde::Serialize;
use tsu_web::middleware::render::compile;
use tsu_web::middleware::{Delims, FuncMap, HtmlOptions, Render, RenderOptions, Renderer};
use tsu_web::{Handler, Request, Response, ResponseWriter, Router};

#[derive(Serialize)]
struct Greeting {
    one: String,
    two: String,
}

#[derive(Serialize)]
#[serde(rename = "greeting")]
struct GreetingXml {
    #[serde(rename = "@one")]
    one: String,
    two: String,
}

fn greeting() -> Greeting {
    Greeting { one: "hello".into(), two: "world".into() }
}

fn fixtures(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn basic() -> RenderOptions {
    RenderOptions { directory: fixtures("basic"), ..Default::default() }
}

/// Wraps a closure over the request's `Render` as a handler.
fn render_with<F>(f: F) -> impl Handler
where
    F: Fn(&mut Render) + Send + Sync + 'static,
{
    let f = Arc::new(f);
    move |mut req: Request| {
        let f = Arc::clone(&f);
        async move {
            let mut r = Render::take(&mut req).expect("renderer middleware ran");
            f(&mut r);
            r.into_writer()
        }
    }
}

fn app<F>(options: RenderOptions, f: F) -> Router
where
    F: Fn(&mut Render) + Send + Sync + 'static,
{
    Router::new()
        .middleware(Renderer::new(options).unwrap())
        .get("/foobar", render_with(f))
}

fn request(method: Method, path: &str) -> Request {
    Request::new(http::Request::builder().method(method).uri(path).body(Bytes::new()).unwrap())
}

async fn get(app: &Router) -> Response {
    app.handle(request(Method::GET, "/foobar")).await
}

fn body(res: &Response) -> &str {
    std::str::from_utf8(res.body()).unwrap()
}

fn content_type(res: &Response) -> &str {
    res.headers()[CONTENT_TYPE].to_str().unwrap()
}

// ── JSON ──────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn json_basic() {
    let app = app(RenderOptions::default(), |r| r.json(StatusCode::MULTIPLE_CHOICES, &greeting()));
    let res = get(&app).await;

    assert_eq!(res.status_code(), StatusCode::MULTIPLE_CHOICES);
    assert_eq!(content_type(&res), "application/json; charset=UTF-8");
    assert_eq!(body(&res), r#"{"one":"hello","two":"world"}"#);
}

#[tokio::test]
async fn json_with_prefix() {
    let options = RenderOptions { prefix_json: b")]}',\n".to_vec(), ..Default::default() };
    let app = app(options, |r| r.json(StatusCode::MULTIPLE_CHOICES, &greeting()));
    let res = get(&app).await;

    assert_eq!(body(&res), ")]}',\n{\"one\":\"hello\",\"two\":\"world\"}");
}

#[tokio::test]
async fn json_indented() {
    let options = RenderOptions { indent_json: true, ..Default::default() };
    let app = app(options, |r| r.json(StatusCode::OK, &greeting()));
    let res = get(&app).await;

    assert_eq!(body(&res), "{\n  \"one\": \"hello\",\n  \"two\": \"world\"\n}");
}

#[tokio::test]
async fn json_custom_charset() {
    let options = RenderOptions { charset: "foobar".into(), ..Default::default() };
    let app = app(options, |r| r.json(StatusCode::OK, &greeting()));
    let res = get(&app).await;

    assert_eq!(content_type(&res), "application/json; charset=foobar");
}

#[tokio::test]
async fn json_string_has_no_prefix() {
    let options = RenderOptions { prefix_json: b"while(1);".to_vec(), ..Default::default() };
    let renderer = Renderer::new(options).unwrap();
    let r = renderer.render(Response::new(), &request(Method::GET, "/")).unwrap();

    assert_eq!(r.json_string(&greeting()).unwrap(), r#"{"one":"hello","two":"world"}"#);
}

#[tokio::test]
async fn json_failure_is_500() {
    use std::collections::HashMap;
    use http::header::X_CONTENT_TYPE_OPTIONS;

    // Tuple keys cannot become JSON object keys.
    let app = app(RenderOptions::default(), |r| {
        let points: HashMap<(i32, i32), i32> = HashMap::from([((1, 2), 3)]);
        r.json(StatusCode::OK, &points);
    });
    let res = get(&app).await;

    assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(content_type(&res), "text/plain; charset=utf-8");
    assert_eq!(res.headers()[X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert!(body(&res).contains("key must be a string"), "{}", body(&res));
    assert!(body(&res).ends_with('\n'));
}

// ── XML ───────────────────────────────────────────────────────────────────────

fn greeting_xml() -> GreetingXml {
    GreetingXml { one: "hello".into(), two: "world".into() }
}

#[tokio::test]
async fn xml_basic() {
    let app = app(RenderOptions::default(), |r| r.xml(StatusCode::MULTIPLE_CHOICES, &greeting_xml()));
    let res = get(&app).await;

    assert_eq!(res.status_code(), StatusCode::MULTIPLE_CHOICES);
    assert_eq!(content_type(&res), "text/xml; charset=UTF-8");
    assert_eq!(body(&res), r#"<greeting one="hello"><two>world</two></greeting>"#);
}

#[tokio::test]
async fn xml_with_prefix() {
    let prefix = br#"<?xml version="1.0" encoding="UTF-8"?>"#;
    let options = RenderOptions { prefix_xml: prefix.to_vec(), ..Default::default() };
    let app = app(options, |r| r.xml(StatusCode::OK, &greeting_xml()));
    let res = get(&app).await;

    assert_eq!(
        body(&res),
        r#"<?xml version="1.0" encoding="UTF-8"?><greeting one="hello"><two>world</two></greeting>"#,
    );
}

#[tokio::test]
async fn xml_indented() {
    let options = RenderOptions { indent_xml: true, ..Default::default() };
    let app = app(options, |r| r.xml(StatusCode::OK, &greeting_xml()));
    let res = get(&app).await;

    assert!(body(&res).starts_with(r#"<greeting one="hello">"#), "{}", body(&res));
    assert!(body(&res).contains("\n  <two>world</two>\n"), "{}", body(&res));
}

#[tokio::test]
async fn xml_failure_is_500() {
    // A bare string has no element name to serialize under.
    let app = app(RenderOptions::default(), |r| r.xml(StatusCode::OK, "just text"));
    let res = get(&app).await;

    assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(content_type(&res), "text/plain; charset=utf-8");
}

// ── HTML ──────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn html_missing_template_is_500() {
    let app = app(basic(), |r| r.html(StatusCode::OK, "nope", &(), None));
    let res = get(&app).await;

    assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body(&res).contains("\"nope\" is undefined"), "{}", body(&res));
    assert!(body(&res).ends_with('\n'));
}

#[tokio::test]
async fn html_basic() {
    let app = app(basic(), |r| r.html(StatusCode::OK, "hello", "gophers", None));
    let res = get(&app).await;

    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(content_type(&res), "text/html; charset=UTF-8");
    assert_eq!(body(&res), "<h1>Hello gophers</h1>\n");
}

#[tokio::test]
async fn html_escapes_values() {
    let app = app(basic(), |r| r.html(StatusCode::OK, "hello", "<b>", None));
    let res = get(&app).await;

    assert_eq!(body(&res), "<h1>Hello &lt;b&gt;</h1>\n");
}

#[tokio::test]
async fn html_xhtml_content_type() {
    let options = RenderOptions { html_content_type: "application/xhtml+xml".into(), ..basic() };
    let app = app(options, |r| r.html(StatusCode::OK, "hello", "gophers", None));
    let res = get(&app).await;

    assert_eq!(content_type(&res), "application/xhtml+xml; charset=UTF-8");
    assert_eq!(body(&res), "<h1>Hello gophers</h1>\n");
}

#[tokio::test]
async fn html_extensions() {
    let options = RenderOptions {
        extensions: vec![".tmpl".into(), ".html".into()],
        ..basic()
    };
    let app = app(options, |r| r.html(StatusCode::OK, "hypertext", &(), None));
    let res = get(&app).await;

    assert_eq!(body(&res), "Hypertext!\n");
}

#[tokio::test]
async fn html_default_extension_skips_tmpl() {
    let app = app(basic(), |r| r.html(StatusCode::OK, "hypertext", &(), None));
    let res = get(&app).await;

    assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn html_custom_funcs() {
    let options = RenderOptions {
        directory: fixtures("custom_funcs"),
        funcs: vec![FuncMap::new().with("myCustomFunc", Value::from_function(|| "My custom function"))],
        ..Default::default()
    };
    let app = app(options, |r| r.html(StatusCode::OK, "index", "jeremy", None));
    let res = get(&app).await;

    assert_eq!(body(&res), "My custom function\n");
}

#[tokio::test]
async fn html_layout() {
    let options = RenderOptions { layout: Some("layout".into()), ..basic() };
    let app = app(options, |r| r.html(StatusCode::OK, "content", "gophers", None));
    let res = get(&app).await;

    assert_eq!(body(&res), "head\n<h1>gophers</h1>\n\nfoot\n");
}

#[tokio::test]
async fn html_layout_current() {
    let options = RenderOptions { layout: Some("current_layout".into()), ..basic() };
    let app = app(options, |r| r.html(StatusCode::OK, "content", "gophers", None));
    let res = get(&app).await;

    assert_eq!(body(&res), "content head\n<h1>gophers</h1>\n\ncontent foot\n");
}

#[tokio::test]
async fn html_override_layout() {
    let options = RenderOptions { layout: Some("layout".into()), ..basic() };
    let app = app(options, |r| {
        r.html(StatusCode::OK, "content", "gophers", HtmlOptions::layout("another_layout"))
    });
    let res = get(&app).await;

    assert_eq!(body(&res), "another head\n<h1>gophers</h1>\n\nanother foot\n");
}

#[tokio::test]
async fn html_disable_layout_per_call() {
    let options = RenderOptions { layout: Some("layout".into()), ..basic() };
    let app = app(options, |r| r.html(StatusCode::OK, "content", "gophers", HtmlOptions::no_layout()));
    let res = get(&app).await;

    assert_eq!(body(&res), "<h1>gophers</h1>\n");
}

#[tokio::test]
async fn html_yield_without_layout_fails() {
    let app = app(basic(), |r| r.html(StatusCode::OK, "layout", &(), None));
    let res = get(&app).await;

    assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body(&res).contains("yield called with no layout defined"), "{}", body(&res));
}

#[tokio::test]
async fn html_nested_directory() {
    let app = app(basic(), |r| r.html(StatusCode::OK, "admin/index", "gophers", None));
    let res = get(&app).await;

    assert_eq!(body(&res), "<h1>Admin gophers</h1>\n");
}

#[tokio::test]
async fn html_bad_path_is_500() {
    let app = app(basic(), |r| r.html(StatusCode::OK, "nope/index", "gophers", None));
    let res = get(&app).await;

    assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn html_custom_delimiters() {
    let options = RenderOptions { delims: Some(Delims::new("{[{", "}]}")), ..basic() };
    let app = app(options, |r| r.html(StatusCode::OK, "delims", "gophers", None));
    let res = get(&app).await;

    assert_eq!(body(&res), "<h1>Hello gophers</h1>");
}

#[tokio::test]
async fn html_sees_request_data() {
    #[derive(Serialize)]
    struct Page {
        name: &'static str,
    }

    let app = app(basic(), |r| {
        r.data_mut().insert("title", "Welcome");
        assert!(r.data().get("title").is_some());
        r.html(StatusCode::OK, "data", &Page { name: "gophers" }, None);
    });
    let res = get(&app).await;

    assert_eq!(body(&res), "<h1>Welcome: gophers</h1>\n");
}

#[tokio::test]
async fn html_sees_elapsed_time() {
    let app = app(basic(), |r| r.html(StatusCode::OK, "elapsed", &(), None));
    let res = get(&app).await;

    assert_eq!(body(&res), "true\n");
}

#[tokio::test]
async fn html_string_matches_html() {
    let options = RenderOptions { layout: Some("layout".into()), ..basic() };
    let renderer = Renderer::new(options).unwrap();
    let mut r = renderer.render(Response::new(), &request(Method::GET, "/")).unwrap();

    let out = r.html_string("content", "gophers", None).unwrap();
    assert_eq!(out, "head\n<h1>gophers</h1>\n\nfoot\n");
    assert!(r.html_string("nope", "gophers", HtmlOptions::no_layout()).is_err());
    assert!(r.template().get_template("admin/index").is_ok());
}

#[tokio::test]
async fn layouts_do_not_leak_between_concurrent_requests() {
    let options = RenderOptions { layout: Some("layout".into()), ..basic() };
    let app = Arc::new(
        Router::new()
            .middleware(Renderer::new(options).unwrap())
            .get("/hello/{name}", |mut req: Request| async move {
                let name = req.param("name").unwrap_or_default().to_owned();
                let mut r = Render::take(&mut req).expect("renderer middleware ran");
                let template = if name.len() % 2 == 0 { "content" } else { "hello" };
                r.html(StatusCode::OK, template, &name, None);
                r.into_writer()
            }),
    );

    let mut tasks = tokio::task::JoinSet::new();
    for i in 1..=64 {
        let app = Arc::clone(&app);
        tasks.spawn(async move {
            let name = "x".repeat(i);
            let res = app.handle(request(Method::GET, &format!("/hello/{name}"))).await;
            let inner = if i % 2 == 0 { format!("<h1>{name}</h1>\n") } else { format!("<h1>Hello {name}</h1>\n") };
            assert_eq!(body(&res), format!("head\n{inner}\nfoot\n"));
        });
    }
    while let Some(joined) = tasks.join_next().await {
        joined.unwrap();
    }
}

// ── Compilation ───────────────────────────────────────────────────────────────

#[test]
fn compile_is_repeatable() {
    let options = basic();
    let a = compile(&options).unwrap();
    let b = compile(&options).unwrap();

    let render = |env: &minijinja::Environment<'_>| {
        env.get_template("hello").unwrap().render(minijinja::context! { this => "gophers" }).unwrap()
    };
    assert_eq!(render(&a), render(&b));
}

#[test]
fn broken_template_fails_construction() {
    let options = RenderOptions { directory: fixtures("broken"), ..Default::default() };
    assert!(Renderer::new(options).is_err());
}

#[tokio::test]
async fn reload_picks_up_changes() {
    let dir = std::env::temp_dir().join(format!("tsu-reload-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("page.html"), "v1").unwrap();

    let options = RenderOptions { directory: dir.clone(), reload: true, ..Default::default() };
    let app = app(options, |r| r.html(StatusCode::OK, "page", &(), None));
    assert_eq!(body(&get(&app).await), "v1");

    std::fs::write(dir.join("page.html"), "v2").unwrap();
    assert_eq!(body(&get(&app).await), "v2");

    std::fs::remove_dir_all(&dir).unwrap();
}

// ── Binary data ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn data_defaults_to_octet_stream() {
    let app = app(RenderOptions::default(), |r| r.write_data(StatusCode::OK, b"hello there"));
    let res = get(&app).await;

    assert_eq!(content_type(&res), "application/octet-stream");
    assert_eq!(body(&res), "hello there");
}

#[tokio::test]
async fn data_keeps_custom_mime_type() {
    let app = app(RenderOptions::default(), |r| {
        r.header_mut().insert(CONTENT_TYPE, HeaderValue::from_static("image/jpeg"));
        r.write_data(StatusCode::OK, b"..jpeg data..");
    });
    let res = get(&app).await;

    assert_eq!(content_type(&res), "image/jpeg");
    assert_eq!(body(&res), "..jpeg data..");
}

// ── Status, error, redirect ───────────────────────────────────────────────────

#[tokio::test]
async fn status_only() {
    let app = app(RenderOptions::default(), |r| r.status(StatusCode::NO_CONTENT));
    let res = get(&app).await;

    assert_eq!(res.status_code(), StatusCode::NO_CONTENT);
    assert!(res.body().is_empty());
}

#[tokio::test]
async fn error_without_message() {
    let app = app(RenderOptions::default(), |r| r.error(StatusCode::NOT_FOUND, None));
    let res = get(&app).await;

    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    assert!(res.body().is_empty());
}

#[tokio::test]
async fn error_with_message() {
    let app = app(RenderOptions::default(), |r| r.error(StatusCode::INTERNAL_SERVER_ERROR, "Something bad"));
    let res = get(&app).await;

    assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body(&res), "Something bad");
}

fn redirect_app() -> Router {
    let handler = || render_with(|r| r.redirect("two", None));
    Router::new()
        .middleware(Renderer::new(RenderOptions::default()).unwrap())
        .get("/path/one", handler())
        .on(Method::HEAD, "/path/one", handler())
        .get("/moved", render_with(|r| r.redirect("https://example.com/x", StatusCode::MOVED_PERMANENTLY)))
}

#[tokio::test]
async fn redirect_defaults_to_found() {
    let res = redirect_app().handle(request(Method::GET, "/path/one")).await;

    assert_eq!(res.status_code(), StatusCode::FOUND);
    assert_eq!(res.headers()[LOCATION], "/path/two");
    assert_eq!(content_type(&res), "text/html; charset=utf-8");
    assert_eq!(body(&res), "<a href=\"/path/two\">Found</a>.\n");
}

#[tokio::test]
async fn redirect_head_has_no_body() {
    let res = redirect_app().handle(request(Method::HEAD, "/path/one")).await;

    assert_eq!(res.status_code(), StatusCode::FOUND);
    assert_eq!(content_type(&res), "text/html; charset=utf-8");
    assert!(res.body().is_empty());
}

#[tokio::test]
async fn redirect_with_code_and_absolute_url() {
    let res = redirect_app().handle(request(Method::GET, "/moved")).await;

    assert_eq!(res.status_code(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(res.headers()[LOCATION], "https://example.com/x");
}

#[tokio::test]
async fn handlers_see_no_render_without_middleware() {
    let app = Router::new().get("/", |mut req: Request| async move {
        if Render::take(&mut req).is_some() { StatusCode::OK } else { StatusCode::NOT_IMPLEMENTED }
    });
    let res = app.handle(request(Method::GET, "/")).await;
    assert_eq!(res.status_code(), StatusCode::NOT_IMPLEMENTED);
}
