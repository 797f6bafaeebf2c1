//! Gzip response compression.
//!
//! Only clients that send `gzip` somewhere in `Accept-Encoding` are served
//! compressed bodies; everyone else gets the downstream response untouched,
//! headers included.
//!
//! ```rust,no_run
//! use tsu_web::middleware::Gzip;
//! use tsu_web::{Request, Router};
//!
//! let app = Router::new()
//!     .middleware(Gzip::new())
//!     .get("/", |_req: Request| async { "hello" });
//! ```

use std::io::{self, Write};

use flate2::Compression;
use flate2::write::GzEncoder;
use http::header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, VARY};
use http::{HeaderMap, HeaderValue, StatusCode};
use tracing::{trace, warn};

use crate::handler::BoxFuture;
use crate::middleware::{Middleware, Next};
use crate::request::Request;
use crate::response::Response;
use crate::sniff::detect_content_type;
use crate::writer::ResponseWriter;

/// Middleware that gzip-encodes response bodies for clients that accept it.
#[derive(Clone, Copy, Debug)]
pub struct Gzip {
    level: Compression,
}

impl Gzip {
    pub fn new() -> Self {
        Self { level: Compression::default() }
    }

    /// Compression level, `0` (store) to `9` (best). Larger values are clamped.
    pub fn level(mut self, level: u32) -> Self {
        self.level = Compression::new(level.min(9));
        self
    }
}

impl Default for Gzip {
    fn default() -> Self { Self::new() }
}

impl Middleware for Gzip {
    fn handle(&self, req: Request, next: Next) -> BoxFuture {
        let level = self.level;
        Box::pin(async move {
            // Substring match, case-sensitive: `gzip;q=0.5` and `deflate, gzip` both opt in.
            let accepts = req.header(ACCEPT_ENCODING.as_str())
                .is_some_and(|v| v.contains("gzip"));
            if !accepts {
                return next.run(req).await;
            }

            let mut out = Response::new();
            out.header_mut().insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
            out.header_mut().insert(VARY, HeaderValue::from_static("Accept-Encoding"));
            let mut gz = GzipWriter::new(out, level);

            let downstream = next.run(req).await;
            trace!(status = %downstream.status_code(), len = downstream.body().len(), "compressing response");
            if let Err(e) = downstream.replay_into(&mut gz) {
                warn!("gzip write failed: {e}");
            }

            match gz.finish() {
                Ok(mut out) => {
                    let headers = out.header_mut();
                    // The downstream length describes the uncompressed body.
                    headers.remove(CONTENT_LENGTH);
                    // Downstream headers replace ours on replay; the body is gzip regardless.
                    headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
                    if !varies_on_encoding(headers) {
                        headers.append(VARY, HeaderValue::from_static("Accept-Encoding"));
                    }
                    out
                }
                Err(e) => {
                    warn!("gzip finish failed: {e}");
                    Response::status(StatusCode::INTERNAL_SERVER_ERROR)
                }
            }
        })
    }
}

fn varies_on_encoding(headers: &HeaderMap) -> bool {
    headers.get_all(VARY).iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|name| {
            let name = name.trim();
            name == "*" || name.eq_ignore_ascii_case("accept-encoding")
        })
}

/// A [`ResponseWriter`] that compresses everything written through it.
///
/// Headers and status go straight to the inner writer. On the first body
/// write a missing `Content-Type` is filled in by sniffing the uncompressed
/// bytes, since nothing downstream of this writer can see them.
///
/// Call [`finish`](GzipWriter::finish) to flush the gzip trailer and get the
/// inner writer back. If the writer is dropped instead (early return, panic
/// unwind) the encoder still finalizes the stream on a best-effort basis.
pub struct GzipWriter<W: ResponseWriter> {
    encoder: GzEncoder<BodySink<W>>,
}

impl<W: ResponseWriter> GzipWriter<W> {
    pub fn new(inner: W, level: Compression) -> Self {
        Self { encoder: GzEncoder::new(BodySink(inner), level) }
    }

    pub fn get_ref(&self) -> &W { &self.encoder.get_ref().0 }

    /// Flushes buffered compressed bytes plus the gzip trailer into the inner
    /// writer and returns it.
    pub fn finish(self) -> io::Result<W> {
        self.encoder.finish().map(|sink| sink.0)
    }
}

impl<W: ResponseWriter> ResponseWriter for GzipWriter<W> {
    fn header(&self) -> &HeaderMap { self.encoder.get_ref().0.header() }
    fn header_mut(&mut self) -> &mut HeaderMap { self.encoder.get_mut().0.header_mut() }
    fn write_status(&mut self, status: StatusCode) { self.encoder.get_mut().0.write_status(status) }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.header().contains_key(CONTENT_TYPE) {
            let sniffed = detect_content_type(buf);
            self.header_mut().insert(CONTENT_TYPE, HeaderValue::from_static(sniffed));
        }
        self.encoder.write_all(buf)?;
        Ok(buf.len())
    }
}

/// Adapts a [`ResponseWriter`] body to `io::Write` for the encoder.
struct BodySink<W>(W);

impl<W: ResponseWriter> Write for BodySink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        ResponseWriter::write(&mut self.0, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
