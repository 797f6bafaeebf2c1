//! Content-type sniffing for bodies written without a `Content-Type`.
//!
//! Implements the subset of the WHATWG MIME sniffing algorithm that common
//! browsers and HTTP servers agree on. Only the first [`SNIFF_LEN`] bytes are
//! inspected. The result is always a valid header value; unknown data falls
//! back to `text/plain; charset=utf-8` or `application/octet-stream`.

/// Maximum number of bytes considered.
pub const SNIFF_LEN: usize = 512;

const OCTET_STREAM: &str = "application/octet-stream";
const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

enum Sig {
    /// Tag name, matched case-insensitively after leading whitespace and
    /// followed by a space or `>`.
    Html(&'static [u8]),
    /// Byte prefix after optional leading whitespace.
    Trimmed(&'static [u8], &'static str),
    /// Exact byte prefix.
    Exact(&'static [u8], &'static str),
    /// Prefix compared under a mask (`0xFF` = must match, `0x00` = any).
    Masked(&'static [u8], &'static [u8], &'static str),
}

const HTML: &str = "text/html; charset=utf-8";

const SIGNATURES: &[Sig] = &[
    Sig::Html(b"<!DOCTYPE HTML"),
    Sig::Html(b"<HTML"),
    Sig::Html(b"<HEAD"),
    Sig::Html(b"<SCRIPT"),
    Sig::Html(b"<IFRAME"),
    Sig::Html(b"<H1"),
    Sig::Html(b"<DIV"),
    Sig::Html(b"<FONT"),
    Sig::Html(b"<TABLE"),
    Sig::Html(b"<A"),
    Sig::Html(b"<STYLE"),
    Sig::Html(b"<TITLE"),
    Sig::Html(b"<B"),
    Sig::Html(b"<BODY"),
    Sig::Html(b"<BR"),
    Sig::Html(b"<P"),
    Sig::Html(b"<!--"),
    Sig::Trimmed(b"<?xml", "text/xml; charset=utf-8"),
    Sig::Exact(b"%PDF-", "application/pdf"),
    Sig::Exact(b"%!PS-Adobe-", "application/postscript"),
    Sig::Exact(b"\xFE\xFF", "text/plain; charset=utf-16be"),
    Sig::Exact(b"\xFF\xFE", "text/plain; charset=utf-16le"),
    Sig::Exact(b"\xEF\xBB\xBF", TEXT_PLAIN),
    Sig::Exact(b"\x00\x00\x01\x00", "image/x-icon"),
    Sig::Exact(b"\x00\x00\x02\x00", "image/x-icon"),
    Sig::Exact(b"BM", "image/bmp"),
    Sig::Exact(b"GIF87a", "image/gif"),
    Sig::Exact(b"GIF89a", "image/gif"),
    Sig::Masked(
        b"RIFF\x00\x00\x00\x00WEBPVP",
        b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF\xFF\xFF",
        "image/webp",
    ),
    Sig::Exact(b"\x89PNG\x0D\x0A\x1A\x0A", "image/png"),
    Sig::Exact(b"\xFF\xD8\xFF", "image/jpeg"),
    Sig::Exact(b"OggS\x00", "application/ogg"),
    Sig::Exact(b"ID3", "audio/mpeg"),
    Sig::Exact(b"\x00asm", "application/wasm"),
    Sig::Exact(b"\x1F\x8B\x08", "application/x-gzip"),
    Sig::Exact(b"PK\x03\x04", "application/zip"),
    Sig::Exact(b"Rar!\x1A\x07\x00", "application/x-rar-compressed"),
    Sig::Exact(b"Rar!\x1A\x07\x01\x00", "application/x-rar-compressed"),
];

/// Guesses the content type of `data`.
pub fn detect_content_type(data: &[u8]) -> &'static str {
    let data = &data[..data.len().min(SNIFF_LEN)];
    let trimmed = trim_leading_ws(data);

    for sig in SIGNATURES {
        let hit = match sig {
            Sig::Html(tag) => html_tag_matches(trimmed, tag).then_some(HTML),
            Sig::Trimmed(prefix, ct) => trimmed.starts_with(prefix).then_some(*ct),
            Sig::Exact(prefix, ct) => data.starts_with(prefix).then_some(*ct),
            Sig::Masked(pattern, mask, ct) => masked_matches(data, pattern, mask).then_some(*ct),
        };
        if let Some(ct) = hit {
            return ct;
        }
    }

    if data.iter().copied().any(is_binary) { OCTET_STREAM } else { TEXT_PLAIN }
}

fn trim_leading_ws(data: &[u8]) -> &[u8] {
    let start = data.iter()
        .position(|b| !matches!(b, b'\t' | b'\n' | b'\x0C' | b'\r' | b' '))
        .unwrap_or(data.len());
    &data[start..]
}

fn html_tag_matches(data: &[u8], tag: &[u8]) -> bool {
    if data.len() < tag.len() + 1 {
        return false;
    }
    let (head, rest) = data.split_at(tag.len());
    head.eq_ignore_ascii_case(tag) && matches!(rest[0], b' ' | b'>')
}

fn masked_matches(data: &[u8], pattern: &[u8], mask: &[u8]) -> bool {
    data.len() >= pattern.len()
        && data.iter().zip(pattern).zip(mask).all(|((d, p), m)| d & m == *p)
}

/// Control bytes that never appear in text.
fn is_binary(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}
