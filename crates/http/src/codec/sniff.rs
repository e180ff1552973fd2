//! Content-Type detection from the first bytes of a response body.
//!
//! A small subset of the WHATWG MIME sniffing table: markup signatures (after
//! leading whitespace), common binary signatures, then a text-or-binary check.
//! At most [`SNIFF_LEN`] bytes are inspected.

use http::HeaderValue;

/// Maximum number of body bytes inspected.
pub const SNIFF_LEN: usize = 512;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const TEXT_HTML: &str = "text/html; charset=utf-8";
const OCTET_STREAM: &str = "application/octet-stream";

enum Signature {
    /// Case-insensitive tag prefix, which must be followed by a space or `>`.
    Html(&'static [u8]),
    /// Exact prefix, checked after leading whitespace.
    Markup(&'static [u8], &'static str),
    /// Exact prefix at offset zero.
    Exact(&'static [u8], &'static str),
    /// `RIFF` container with the given form type at offset 8.
    Riff(&'static [u8; 4], &'static str),
}

const SIGNATURES: &[Signature] = &[
    Signature::Html(b"<!DOCTYPE HTML"),
    Signature::Html(b"<HTML"),
    Signature::Html(b"<HEAD"),
    Signature::Html(b"<SCRIPT"),
    Signature::Html(b"<IFRAME"),
    Signature::Html(b"<H1"),
    Signature::Html(b"<DIV"),
    Signature::Html(b"<FONT"),
    Signature::Html(b"<TABLE"),
    Signature::Html(b"<A"),
    Signature::Html(b"<STYLE"),
    Signature::Html(b"<TITLE"),
    Signature::Html(b"<B"),
    Signature::Html(b"<BODY"),
    Signature::Html(b"<BR"),
    Signature::Html(b"<P"),
    Signature::Html(b"<!--"),
    Signature::Markup(b"<?xml", "text/xml; charset=utf-8"),
    Signature::Exact(b"%PDF-", "application/pdf"),
    Signature::Exact(b"%!PS-Adobe-", "application/postscript"),
    Signature::Exact(b"\xFE\xFF", "text/plain; charset=utf-16be"),
    Signature::Exact(b"\xFF\xFE", "text/plain; charset=utf-16le"),
    Signature::Exact(b"\xEF\xBB\xBF", "text/plain; charset=utf-8"),
    Signature::Exact(b"\x00\x00\x01\x00", "image/x-icon"),
    Signature::Exact(b"\x00\x00\x02\x00", "image/x-icon"),
    Signature::Exact(b"BM", "image/bmp"),
    Signature::Exact(b"GIF87a", "image/gif"),
    Signature::Exact(b"GIF89a", "image/gif"),
    Signature::Exact(b"\x89PNG\x0D\x0A\x1A\x0A", "image/png"),
    Signature::Exact(b"\xFF\xD8\xFF", "image/jpeg"),
    Signature::Riff(b"WEBP", "image/webp"),
    Signature::Riff(b"WAVE", "audio/wave"),
    Signature::Riff(b"AVI ", "video/avi"),
    Signature::Exact(b"ID3", "audio/mpeg"),
    Signature::Exact(b"OggS\x00", "application/ogg"),
    Signature::Exact(b"\x1A\x45\xDF\xA3", "video/webm"),
    Signature::Exact(b"wOFF", "font/woff"),
    Signature::Exact(b"wOF2", "font/woff2"),
    Signature::Exact(b"\x1F\x8B\x08", "application/x-gzip"),
    Signature::Exact(b"PK\x03\x04", "application/zip"),
    Signature::Exact(b"Rar!\x1A\x07\x00", "application/x-rar-compressed"),
    Signature::Exact(b"\x00\x61\x73\x6D", "application/wasm"),
];

/// Guesses a `Content-Type` for `data`. Always returns a value, falling back
/// to `application/octet-stream`. Empty input is plain text.
pub fn detect_content_type(data: &[u8]) -> HeaderValue {
    HeaderValue::from_static(sniff(data))
}

fn sniff(data: &[u8]) -> &'static str {
    let data = &data[..data.len().min(SNIFF_LEN)];
    let trimmed = data.trim_ascii_start();

    for signature in SIGNATURES {
        match signature {
            Signature::Html(tag) => {
                if matches_tag(trimmed, tag) {
                    return TEXT_HTML;
                }
            }
            Signature::Markup(prefix, content_type) => {
                if trimmed.starts_with(prefix) {
                    return *content_type;
                }
            }
            Signature::Exact(prefix, content_type) => {
                if data.starts_with(prefix) {
                    return *content_type;
                }
            }
            Signature::Riff(form, content_type) => {
                if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == form.as_slice() {
                    return *content_type;
                }
            }
        }
    }

    if data.iter().any(|b| is_binary(*b)) { OCTET_STREAM } else { TEXT_PLAIN }
}

fn matches_tag(data: &[u8], tag: &[u8]) -> bool {
    if data.len() <= tag.len() || !data[..tag.len()].eq_ignore_ascii_case(tag) {
        return false;
    }
    matches!(data[tag.len()], b' ' | b'>')
}

fn is_binary(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_plain_text() {
        assert_eq!(detect_content_type(b""), "text/plain; charset=utf-8");
    }

    #[test]
    fn html_after_whitespace() {
        assert_eq!(detect_content_type(b"\n  <!doctype html><html>"), "text/html; charset=utf-8");
        assert_eq!(detect_content_type(b"<p>hello</p>"), "text/html; charset=utf-8");
        assert_eq!(detect_content_type(b"<pre>"), "text/plain; charset=utf-8");
    }

    #[test]
    fn binary_signatures() {
        assert_eq!(detect_content_type(b"\x89PNG\x0D\x0A\x1A\x0A...."), "image/png");
        assert_eq!(detect_content_type(b"%PDF-1.7"), "application/pdf");
        assert_eq!(detect_content_type(b"RIFF\x00\x00\x00\x00WEBPVP8 "), "image/webp");
        assert_eq!(detect_content_type(b"\x1F\x8B\x08\x00"), "application/x-gzip");
        assert_eq!(detect_content_type(b"<?xml version=\"1.0\"?>"), "text/xml; charset=utf-8");
    }

    #[test]
    fn text_or_binary() {
        assert_eq!(detect_content_type(b"{\"hello\": \"world\"}"), "text/plain; charset=utf-8");
        assert_eq!(detect_content_type(b"hello\x00world"), "application/octet-stream");
    }

    #[test]
    fn only_the_prefix_is_inspected() {
        let mut data = vec![b'a'; SNIFF_LEN];
        data.push(0x00);
        assert_eq!(detect_content_type(&data), "text/plain; charset=utf-8");
    }
}
