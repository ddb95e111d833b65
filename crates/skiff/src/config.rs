//! Optional TOML configuration, merged under command-line flags.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;
use skiff_transfer::TransferConfig;

/// Values readable from a config file. Every field is optional; the
/// command line and built-in defaults fill the rest.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub download_url: Option<String>,
    pub upload_url: Option<String>,
    pub out_dir: Option<PathBuf>,
    pub max_file_name_len: Option<usize>,
    pub max_file_ext_len: Option<usize>,
    pub inline_body_limit: Option<usize>,
    pub recv_buffer_size: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
}

impl FileConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Engine configuration with file values applied over defaults.
    pub fn transfer_config(&self, download_url: String, upload_url: String) -> TransferConfig {
        let mut config = TransferConfig::new(download_url).with_upload_url(upload_url);
        if let Some(len) = self.max_file_name_len {
            config = config.with_max_file_name_len(len);
        }
        if let Some(len) = self.max_file_ext_len {
            config = config.with_max_file_ext_len(len);
        }
        if let Some(limit) = self.inline_body_limit {
            config = config.with_inline_body_limit(limit);
        }
        if let Some(size) = self.recv_buffer_size {
            config = config.with_recv_buffer_size(size);
        }
        config
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs.unwrap_or(30)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries.unwrap_or(5)
    }
}
