//! Uploads-directory collaborator: writes an uploaded archive to a unique
//! path under the configured uploads directory.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;

/// Writes `bytes` to `uploads_dir/abs-upload-<nanotime>.<ext>` and returns
/// the path written. `ext` should not include a leading dot; `json` is used
/// when the caller has no better guess.
pub async fn write_upload(uploads_dir: &Path, ext: &str, bytes: &[u8]) -> Result<PathBuf> {
    tokio::fs::create_dir_all(uploads_dir)
        .await
        .with_context(|| format!("creating uploads directory {}", uploads_dir.display()))?;

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let ext = if ext.is_empty() { "json" } else { ext };
    let path = uploads_dir.join(format!("abs-upload-{nanos}.{ext}"));

    let mut file = tokio::fs::File::create(&path)
        .await
        .with_context(|| format!("creating upload file {}", path.display()))?;
    file.write_all(bytes)
        .await
        .with_context(|| format!("writing upload file {}", path.display()))?;
    file.flush().await?;

    Ok(path)
}

/// Extracts a lowercase extension (no dot) from a client-supplied filename,
/// falling back to `json` for anything unrecognized or absent.
pub fn guess_extension(filename: Option<&str>) -> String {
    filename
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .unwrap_or_else(|| "json".to_string())
}
