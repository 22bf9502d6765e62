//! Storage of uploaded log files.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;
use unicode_normalization::UnicodeNormalization;

use crate::error::Result;

/// Extensions accepted for uploads, compared case-insensitively
pub const ALLOWED_EXTENSIONS: [&str; 2] = ["log", "txt"];

static UNSAFE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_.-]").expect("valid regex"));

/// Checks whether `filename` ends in `.log` or `.txt`
pub fn has_allowed_extension(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| {
            ALLOWED_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}

/// Reduces a client-supplied filename to a safe, flat name
///
/// The name is NFKD-normalized so accented letters keep their base
/// letter, then anything left outside ASCII is dropped. `/` becomes a
/// space, whitespace runs collapse to `_`, anything outside
/// `[A-Za-z0-9_.-]` (including `\`) is removed and leading/trailing dots
/// and underscores are stripped. The result may be empty.
pub fn sanitize_filename(filename: &str) -> String {
    let flattened: String = filename
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| if c == '/' { ' ' } else { c })
        .collect();
    let joined = flattened.split_whitespace().collect::<Vec<_>>().join("_");
    UNSAFE_CHARS
        .replace_all(&joined, "")
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

/// Writes the uploaded bytes to `upload_dir/filename`, creating the directory
pub async fn save_upload(upload_dir: &Path, filename: &str, contents: &[u8]) -> Result<PathBuf> {
    fs::create_dir_all(upload_dir).await?;
    let path = upload_dir.join(filename);
    fs::write(&path, contents).await?;
    info!("File saved: {}", path.display());
    Ok(path)
}

/// Reads a saved upload back as UTF-8 text
pub async fn read_upload(path: &Path) -> Result<String> {
    let content = fs::read_to_string(path).await?;
    info!(
        "Successfully read file: {}, size: {} chars",
        path.display(),
        content.chars().count()
    );
    Ok(content)
}
