//! `Content-Disposition` for file downloads
//!
//! Header values are ASCII-only, so non-ASCII names are sent twice (RFC 6266):
//! a plain `filename` with the name folded to ASCII for old clients, and an
//! RFC 5987 `filename*=UTF-8''…` carrying the exact name percent-encoded.

use unicode_normalization::UnicodeNormalization;

/// Used when nothing of the name survives ASCII folding
const FALLBACK_NAME: &str = "download";

pub fn attachment(filename: &str) -> String {
    if filename.is_ascii() {
        return format!("attachment; filename=\"{}\"", quote(filename));
    }

    // NFKD splits "ü" into "u" + combining diaeresis; dropping the non-ASCII
    // remainder leaves a readable approximation.
    let simple: String = filename.nfkd().filter(char::is_ascii).collect();
    let simple = quote(&simple);
    let simple = if simple.trim().is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        simple
    };

    format!(
        "attachment; filename=\"{simple}\"; filename*=UTF-8''{}",
        urlencoding::encode(filename)
    )
}

/// Make a string safe inside a quoted-string: no control characters, and
/// quotes and backslashes escaped.
fn quote(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars().filter(|c| !c.is_control()) {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
