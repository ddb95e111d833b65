//! Transfer configuration.
//!
//! Resolved once at startup; nothing here mutates at runtime.

/// Content classification for an uploaded multipart file part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileFormat {
    /// No file: a plain URL-encoded form field.
    #[default]
    None,
    /// Binary file, sent as `application/octet-stream`.
    Binary,
    /// Text file, sent as `text/plain`.
    Text,
}

/// Configuration surface of the transfer engine.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Target URL for downloads.
    pub download_url: String,
    /// Target URL for uploads and form posts.
    pub upload_url: String,
    /// Maximum stored file name length, bytes.
    pub max_file_name_len: usize,
    /// Maximum accepted extension length (dot included), bytes.
    pub max_file_ext_len: usize,
    /// Responses no larger than this may arrive inline with headers.
    pub inline_body_limit: usize,
    /// Capacity used when pulling outbound entity chunks.
    pub recv_buffer_size: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            download_url: String::new(),
            upload_url: String::new(),
            max_file_name_len: 250,
            max_file_ext_len: 8,
            inline_body_limit: 1446,
            recv_buffer_size: 1446,
        }
    }
}

impl TransferConfig {
    pub fn new(download_url: impl Into<String>) -> Self {
        Self {
            download_url: download_url.into(),
            ..Self::default()
        }
    }

    pub fn with_upload_url(mut self, url: impl Into<String>) -> Self {
        self.upload_url = url.into();
        self
    }

    pub fn with_max_file_name_len(mut self, len: usize) -> Self {
        self.max_file_name_len = len;
        self
    }

    pub fn with_max_file_ext_len(mut self, len: usize) -> Self {
        self.max_file_ext_len = len;
        self
    }

    pub fn with_inline_body_limit(mut self, limit: usize) -> Self {
        self.inline_body_limit = limit;
        self
    }

    pub fn with_recv_buffer_size(mut self, size: usize) -> Self {
        self.recv_buffer_size = size;
        self
    }
}
