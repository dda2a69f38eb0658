use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use streamftp_protocol::FileMetaData;

/// Reads size and timestamps of a persisted file.
///
/// `create_time` is the inode change time on Unix; elsewhere the
/// platform's creation time, falling back to the modification time.
pub async fn file_metadata(path: &Path) -> std::io::Result<FileMetaData> {
    let meta = tokio::fs::metadata(path).await?;
    let modified = meta.modified()?;
    let accessed = meta.accessed().unwrap_or(modified);

    Ok(FileMetaData {
        path: path.display().to_string(),
        size: meta.len(),
        create_time: change_time(&meta).unwrap_or_else(|| to_utc(modified)),
        modify_time: to_utc(modified),
        access_time: to_utc(accessed),
    })
}

fn to_utc(t: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(t)
}

#[cfg(unix)]
fn change_time(meta: &std::fs::Metadata) -> Option<DateTime<Utc>> {
    use std::os::unix::fs::MetadataExt;
    DateTime::from_timestamp(meta.ctime(), meta.ctime_nsec() as u32)
}

#[cfg(not(unix))]
fn change_time(meta: &std::fs::Metadata) -> Option<DateTime<Utc>> {
    meta.created().ok().map(to_utc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_size_and_times() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, b"hello").unwrap();

        let meta = file_metadata(&path).await.unwrap();
        assert_eq!(meta.size, 5);
        assert_eq!(meta.path, path.display().to_string());

        let now = Utc::now();
        assert!(meta.modify_time <= now);
        assert!(now - meta.modify_time < chrono::Duration::minutes(5));
        assert!(now - meta.create_time < chrono::Duration::minutes(5));
    }

    #[tokio::test]
    async fn missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(file_metadata(&dir.path().join("nope")).await.is_err());
    }
}
