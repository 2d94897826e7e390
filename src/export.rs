use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::compositor::FinalRasterArtifact;

/// File name every export is saved under.
pub const EXPORT_FILE_NAME: &str = "text-behind-image.png";

/// Writes `artifact` into `dir` as [`EXPORT_FILE_NAME`], replacing any earlier export.
pub async fn save_artifact(artifact: &FinalRasterArtifact, dir: &Path) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("creating export directory {}", dir.display()))?;
    let path = dir.join(EXPORT_FILE_NAME);
    tokio::fs::write(&path, &artifact.png)
        .await
        .with_context(|| format!("writing composite to {}", path.display()))?;
    info!(path = %path.display(), bytes = artifact.png.len(), "saved composite");
    Ok(path)
}
