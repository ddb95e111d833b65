//! URL helpers: output file naming and query-string assembly.

/// Final path segment of `url`, used as the stored file name.
///
/// Query and fragment are stripped before taking the segment. Returns
/// `None` when the URL has no path or ends in `/`; callers must treat
/// that as a canceled transfer, there is no fallback name.
///
/// ```
/// use skiff_transfer::file_name_from_url;
///
/// assert_eq!(
///     file_name_from_url("http://host/images/manual.pdf?v=2"),
///     Some("manual.pdf")
/// );
/// assert_eq!(file_name_from_url("http://host/"), None);
/// ```
pub fn file_name_from_url(url: &str) -> Option<&str> {
    let url = url.split(['?', '#']).next().unwrap_or(url);
    let after_scheme = match url.find("://") {
        Some(pos) => &url[pos + 3..],
        None => url,
    };
    let (_, path) = after_scheme.split_once('/')?;
    let segment = path.rsplit('/').next().unwrap_or(path);
    (!segment.is_empty()).then_some(segment)
}

/// Append `key=value` pairs to `url` as a query string.
///
/// Pairs are joined with `&` after a single `?`. No percent-encoding
/// is applied; callers own the key/value alphabet.
pub fn with_query(url: &str, pairs: &[(String, String)]) -> String {
    if pairs.is_empty() {
        return url.to_string();
    }
    let query = pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    format!("{url}?{query}")
}
