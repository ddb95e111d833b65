//! Multipart/form-data and URL-encoded body composition.
//!
//! Pure string assembly. The streaming side (interleaving a composed
//! part header with file bytes) lives in `effects::entity`.

use crate::data::FileFormat;

/// Boundary marker separating form parts. Entity content-type
/// detection searches literal prefixes for this string.
pub const BOUNDARY: &str = "SkiffFormBoundary1a2b3c4d";

/// `Content-Type` for multipart bodies. Kept in sync with [`BOUNDARY`].
pub const FORM_DATA_CONTENT_TYPE: &str =
    "multipart/form-data; boundary=SkiffFormBoundary1a2b3c4d";

/// `Content-Type` for plain key/value bodies.
pub const URLENCODED_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Complete literal body carrying one `key=value` form field.
pub fn field_part(key: &str, value: &str) -> String {
    format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{key}\"\r\n\r\n{value}\r\n--{BOUNDARY}--\r\n"
    )
}

/// Part header emitted before the bytes of an uploaded file.
///
/// For [`FileFormat::None`] the header carries no filename or part
/// content type; the caller is sending a bare field.
pub fn file_part_header(key: &str, file_name: &str, format: FileFormat) -> String {
    match format {
        FileFormat::None => format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{key}\"\r\n\r\n"
        ),
        FileFormat::Binary => format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{key}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        ),
        FileFormat::Text => format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{key}\"; filename=\"{file_name}\"\r\nContent-Type: text/plain\r\n\r\n"
        ),
    }
}

/// Closing boundary terminating a multipart body.
pub fn closing_boundary() -> String {
    format!("\r\n--{BOUNDARY}--\r\n")
}

/// URL-encoded body from key/value pairs. No percent-encoding is
/// applied; callers own the key/value alphabet.
pub fn urlencoded_body(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}
