use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Disk-backed storage for uploaded pictures and icons, rooted at the
/// configured media directory. Stored names are UUIDs so client-supplied
/// filenames never touch the filesystem.
pub struct FileStore;

impl FileStore {
    /// Write bytes under `<media_dir>/<subdir>/` and return the relative
    /// path recorded in the database.
    pub async fn save(
        media_dir: &str,
        subdir: &str,
        original_name: &str,
        data: &[u8],
    ) -> anyhow::Result<String> {
        let ext = Path::new(original_name)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or("bin");
        let stored = format!("{subdir}/{}.{ext}", Uuid::new_v4());

        let full: PathBuf = Path::new(media_dir).join(&stored);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, data).await?;

        Ok(stored)
    }

    /// Best-effort removal of a stored file; the row is already gone, so a
    /// missing file is not an error.
    pub async fn remove(media_dir: &str, relative: &str) {
        let full = Path::new(media_dir).join(relative);
        if let Err(e) = tokio::fs::remove_file(&full).await {
            tracing::debug!("could not remove {}: {}", full.display(), e);
        }
    }
}
