use std::ffi::OsStr;
use std::path::Path;
use url::Url;

/// Name used when every hint (path, query, header) comes up empty.
const FALLBACK_STEM: &str = "download";

/// Default name for prescription downloads; the Content-Disposition
/// header may override it.
const PRESCRIPTION_DEFAULT: &str = "prescription.pdf";

/// Resolve the local filename for a plain file download.
///
/// Priority, lowest to highest: last path segment of the URL, the `name`
/// query parameter, the `Content-Disposition` filename. The result is
/// sanitized and, when it carries no extension, given a `.pdf` suffix.
/// Never returns an empty name.
pub fn resolve_filename(url: &Url, content_disposition: Option<&str>) -> String {
    let mut name = last_path_segment(url).unwrap_or_default();
    if let Some(param) = name_query_param(url) {
        name = param;
    }
    if let Some(header_name) = content_disposition.and_then(disposition_filename) {
        name = header_name;
    }
    let mut name = sanitize_filename(&name);
    if extension_of(&name).is_none() {
        name.push_str(".pdf");
    }
    name
}

/// Resolve the local filename for a prescription download. The URL
/// contributes nothing here: the name defaults to `prescription.pdf`,
/// the header may override it, and the result always ends in `.pdf`.
pub fn resolve_prescription_filename(content_disposition: Option<&str>) -> String {
    let name = content_disposition
        .and_then(disposition_filename)
        .unwrap_or_else(|| PRESCRIPTION_DEFAULT.to_string());
    let mut name = sanitize_filename(&name);
    if !name.to_lowercase().ends_with(".pdf") {
        name.push_str(".pdf");
    }
    name
}

/// Extract the filename from a `Content-Disposition` header value.
///
/// Accepts `filename="value"` (quotes stripped), bare `filename=value`
/// tokens, and RFC 5987 `filename*=UTF-8''percent-encoded` values; the
/// starred form wins when both are present. Returns `None` when the
/// header names nothing usable.
pub fn disposition_filename(header_value: &str) -> Option<String> {
    let mut plain: Option<String> = None;

    for param in header_value.split(';') {
        let (name, value) = match param.trim().split_once('=') {
            Some((name, value)) => (name.trim(), value.trim()),
            None => continue,
        };

        if name.eq_ignore_ascii_case("filename*") {
            if let Some(rest) = value
                .strip_prefix("UTF-8''")
                .or_else(|| value.strip_prefix("utf-8''"))
            {
                let decoded = percent_decode(rest);
                if !decoded.is_empty() {
                    return Some(decoded);
                }
            }
        }

        if name.eq_ignore_ascii_case("filename") {
            let unquoted = if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
                &value[1..value.len() - 1]
            } else {
                value
            };
            if !unquoted.is_empty() {
                plain = Some(unquoted.to_string());
            }
        }
    }

    plain
}

/// First non-empty `name` query parameter, percent-decoded. Unlike form
/// decoding, `+` is left alone; file names may legitimately contain it.
pub fn name_query_param(url: &Url) -> Option<String> {
    let query = url.query()?;
    for pair in query.split('&') {
        let (key, value) = match pair.split_once('=') {
            Some((key, value)) => (key, value),
            None => (pair, ""),
        };
        if key == "name" && !value.is_empty() {
            return Some(percent_decode(value));
        }
    }
    None
}

/// Last non-empty path segment of the URL, percent-decoded.
pub fn last_path_segment(url: &Url) -> Option<String> {
    let segment = url.path().split('/').filter(|s| !s.is_empty()).next_back()?;
    Some(percent_decode(segment))
}

/// Lowercased extension of a file name, `None` when there is none.
pub fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(OsStr::to_str)
        .filter(|ext| !ext.is_empty())
        .map(str::to_lowercase)
}

/// Reduce a candidate name to something safe to write: keep only the
/// final path component, replace control characters, trim surrounding
/// dots and spaces. Empty results fall back to a fixed stem so a name
/// is never empty.
pub fn sanitize_filename(name: &str) -> String {
    let tail = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = tail
        .chars()
        .map(|c| if c.is_control() { '_' } else { c })
        .collect();
    let trimmed = cleaned.trim_matches(|c| c == '.' || c == ' ');
    if trimmed.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        trimmed.to_string()
    }
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(high), Some(low)) = (hex_digit(bytes[i + 1]), hex_digit(bytes[i + 2])) {
                out.push(high << 4 | low);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
