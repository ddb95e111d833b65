use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use skiff_transfer::FileFormat;

#[derive(Clone, Debug, Parser)]
#[command(name="skiff",version=env!("CARGO_PKG_VERSION"),about="Single-shot HTTP file transfers",long_about=None,propagate_version=true)]
pub struct App {
    /// TOML configuration file; command-line flags take precedence.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory downloaded files are stored into.
    #[arg(long, global = true)]
    pub out_dir: Option<PathBuf>,

    /// Seconds to wait for the storage medium to become ready.
    #[arg(long, global = true, default_value_t = 5)]
    pub storage_wait: u64,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    #[command(alias = "g", name = "get", about = "Download a file into storage")]
    Get(GetArg),
    #[command(alias = "u", name = "upload", about = "Upload a stored file as a multipart form")]
    Upload(UploadArg),
    #[command(alias = "p", name = "post", about = "Post URL-encoded key=value pairs")]
    Post(PostArg),
}

#[derive(Clone, Debug, Args)]
pub struct GetArg {
    /// Source URL; defaults to `download_url` from the config file.
    pub url: Option<String>,
}

#[derive(Clone, Debug, Args)]
pub struct UploadArg {
    /// Name of the stored file to upload.
    pub file: String,

    /// Target URL; defaults to `upload_url` from the config file.
    #[arg(long)]
    pub url: Option<String>,

    /// Form field name for the file part.
    #[arg(long, default_value = "file")]
    pub key: String,

    /// Field value, used only with `--format none`.
    #[arg(long, default_value = "")]
    pub value: String,

    #[arg(long, value_enum, default_value_t = Format::Binary)]
    pub format: Format,
}

#[derive(Clone, Debug, Args)]
pub struct PostArg {
    /// Target URL; defaults to `upload_url` from the config file.
    #[arg(long)]
    pub url: Option<String>,

    /// key=value pairs, repeated in the query string and the body.
    pub pairs: Vec<String>,
}

/// Content classification for an uploaded file part.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Format {
    /// Plain form field, no file attached.
    None,
    Binary,
    Text,
}

impl From<Format> for FileFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::None => FileFormat::None,
            Format::Binary => FileFormat::Binary,
            Format::Text => FileFormat::Text,
        }
    }
}

/// Split `key=value` arguments at the first `=`.
pub fn parse_pairs(raw: &[String]) -> anyhow::Result<Vec<(String, String)>> {
    raw.iter()
        .map(|pair| {
            let (key, value) = pair
                .split_once('=')
                .with_context(|| format!("expected key=value, got {pair:?}"))?;
            if key.is_empty() {
                bail!("empty key in pair {pair:?}");
            }
            Ok((key.to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_split_at_first_equals() {
        let raw = vec!["a=1".to_string(), "b=x=y".to_string()];
        let pairs = parse_pairs(&raw).unwrap();
        assert_eq!(pairs[0], ("a".to_string(), "1".to_string()));
        assert_eq!(pairs[1], ("b".to_string(), "x=y".to_string()));
    }

    #[test]
    fn pair_without_equals_is_rejected() {
        assert!(parse_pairs(&["nope".to_string()]).is_err());
        assert!(parse_pairs(&["=value".to_string()]).is_err());
    }

    #[test]
    fn cli_parses_get_with_flags() {
        let app = App::parse_from(["skiff", "--out-dir", "/tmp/dl", "get", "http://host/f.bin"]);
        assert_eq!(app.out_dir.as_deref(), Some(std::path::Path::new("/tmp/dl")));
        match app.cmd {
            Commands::Get(arg) => assert_eq!(arg.url.as_deref(), Some("http://host/f.bin")),
            _ => panic!("expected get"),
        }
    }
}
