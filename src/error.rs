//! Unified error type.

use thiserror::Error;

/// The error type returned by tsu's fallible operations.
///
/// Application-level errors (404, 422, etc.) are expressed as HTTP
/// [`Response`](crate::Response) values, not as `Error`s. This type surfaces
/// infrastructure failures: binding to a port, accepting a connection, or
/// loading and compiling templates. Serialization and template execution
/// failures also travel as `Error` until the render helper turns them into a
/// `500` response.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid listen address: {0}")]
    Addr(#[from] std::net::AddrParseError),

    #[error("walk: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("{0}")]
    Template(#[from] minijinja::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// quick-xml's error type differs between releases, so only the message
    /// is kept.
    #[error("xml: {0}")]
    Xml(String),
}
