//! Pure transformations: no I/O, no state.

pub mod multipart;
pub mod url;

pub use multipart::{
    BOUNDARY, FORM_DATA_CONTENT_TYPE, URLENCODED_CONTENT_TYPE, closing_boundary, field_part,
    file_part_header, urlencoded_body,
};
pub use url::{file_name_from_url, with_query};
