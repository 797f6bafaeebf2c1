//! The response-writer capability.
//!
//! Middleware that rewrites output does so by decoration: a wrapper holds one
//! writer, implements the same trait, and forwards everything except the
//! calls it intercepts.
//!
//! ```text
//! handler ──► Render<W> ──► GzipWriter<W> ──► Response
//!             (headers,      (sniffs type,     (buffers status,
//!              status)        compresses)       headers, body)
//! ```

use std::io;

use http::{HeaderMap, StatusCode};

/// Something a response can be written into.
///
/// Header mutations are expected before the first body write. The status is
/// single-shot: implementations keep the first one they see.
pub trait ResponseWriter {
    fn header(&self) -> &HeaderMap;
    fn header_mut(&mut self) -> &mut HeaderMap;
    fn write_status(&mut self, status: StatusCode);

    /// Writes body bytes, committing `200 OK` if no status was written yet.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;
}

impl<W: ResponseWriter + ?Sized> ResponseWriter for &mut W {
    fn header(&self) -> &HeaderMap { (**self).header() }
    fn header_mut(&mut self) -> &mut HeaderMap { (**self).header_mut() }
    fn write_status(&mut self, status: StatusCode) { (**self).write_status(status) }
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> { (**self).write(buf) }
}
