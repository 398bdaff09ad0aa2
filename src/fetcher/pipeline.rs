use encoding_rs::Encoding;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

static CHARSET_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)charset\s*=\s*["']?([^"'\s;]+)"#).unwrap());

static META_CHARSET_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<meta\s+[^>]*?charset\s*=\s*["']?([^"'\s/>]+)"#).unwrap());

static META_HTTP_EQUIV_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta\s+[^>]*?http-equiv\s*=\s*["']?content-type["']?[^>]*?content\s*=\s*["']?[^"'>]*?charset\s*=\s*([^"'\s;/>]+)"#).unwrap()
});

/// Bytes of the body searched for `<meta>` charset declarations.
const META_SNIFF_LEN: usize = 4096;

/// Decode a response body to UTF-8.
///
/// Older directory pages are frequently served as windows-1252 without a
/// header charset, so the order is: Content-Type header, `<meta>` tags in the
/// first 4KB, then chardetng. Malformed sequences are replaced rather than
/// failing the page.
pub fn decode_body(content_type: &str, body: &[u8]) -> (&'static Encoding, String) {
    let encoding = detect_charset(content_type, body);
    let (decoded, _encoding, had_errors) = encoding.decode(body);
    if had_errors {
        debug!(
            "Replaced malformed sequences while decoding as {}",
            encoding.name()
        );
    }
    (encoding, decoded.into_owned())
}

fn detect_charset(content_type: &str, body: &[u8]) -> &'static Encoding {
    if let Some(encoding) = label_from(&CHARSET_REGEX, content_type) {
        return encoding;
    }

    let head = &body[..body.len().min(META_SNIFF_LEN)];
    let head_str = String::from_utf8_lossy(head);
    for regex in [&*META_CHARSET_REGEX, &*META_HTTP_EQUIV_REGEX] {
        if let Some(encoding) = label_from(regex, &head_str) {
            return encoding;
        }
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(head, false);
    detector.guess(None, true)
}

fn label_from(regex: &Regex, haystack: &str) -> Option<&'static Encoding> {
    let label = regex.captures(haystack)?.get(1)?.as_str().to_lowercase();
    Encoding::for_label(label.as_bytes())
}
