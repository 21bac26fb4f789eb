use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, info, warn};

use crate::paths;

/// Subfolder of each destination that receives pre-overwrite backups.
const BACKUP_SUBFOLDER: &str = "Backup";

/// Timestamp prefix for backup file names, minute precision.
const BACKUP_STAMP_FORMAT: &str = "%Y.%m.%d.%H%M";

/// What happened to a single file.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum CopyStatus {
    /// The file landed at the destination (with or without a prior backup).
    Copied,
    /// Source and destination are the same location; nothing to do.
    SkippedSameLocation,
    /// The file was rejected before copying (author validation).
    Blocked,
    /// The copy did not happen.
    Failed(FailureReason),
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum FailureReason {
    CannotCreateDirectory,
    BackupFailed,
    CopyFailed,
}

/// Per-file record kept for the run report.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CopyOutcome {
    pub file_name: String,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub status: CopyStatus,
    pub backup: Option<PathBuf>,
    pub detail: Option<String>,
}

impl CopyOutcome {
    pub fn copied(&self) -> bool {
        self.status == CopyStatus::Copied
    }
}

/// Copy `source` into `dest_dir`, backing up any file already there first.
///
/// Order matters: the destination directory is created before anything else,
/// the same-location check runs before any backup, and a failed backup
/// aborts the copy so the existing file is never overwritten unprotected.
pub fn copy_with_backup(source: &Path, dest_dir: &Path) -> CopyOutcome {
    let file_name = source
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    let destination = dest_dir.join(&file_name);

    if let Err(e) = fs::create_dir_all(dest_dir) {
        warn!(dir = %dest_dir.display(), error = %e, "cannot create destination directory");
        return CopyOutcome {
            file_name,
            source: source.to_path_buf(),
            destination,
            status: CopyStatus::Failed(FailureReason::CannotCreateDirectory),
            backup: None,
            detail: Some(e.to_string()),
        };
    }

    if paths::same_target(source, &destination) {
        debug!(file = %file_name, "source and destination are the same file");
        return CopyOutcome {
            file_name,
            source: source.to_path_buf(),
            destination,
            status: CopyStatus::SkippedSameLocation,
            backup: None,
            detail: None,
        };
    }

    let mut backup = None;
    if destination.exists() {
        match back_up(&destination, dest_dir, &file_name) {
            Ok(path) => {
                info!(file = %file_name, backup = %path.display(), "existing file backed up");
                backup = Some(path);
            }
            Err(e) => {
                warn!(file = %file_name, error = %e, "backup failed; keeping existing file");
                return CopyOutcome {
                    file_name,
                    source: source.to_path_buf(),
                    destination,
                    status: CopyStatus::Failed(FailureReason::BackupFailed),
                    backup: None,
                    detail: Some(e.to_string()),
                };
            }
        }
    }

    match fs::copy(source, &destination) {
        Ok(_) => {
            info!(file = %file_name, dest = %destination.display(), "template installed");
            CopyOutcome {
                file_name,
                source: source.to_path_buf(),
                destination,
                status: CopyStatus::Copied,
                backup,
                detail: None,
            }
        }
        Err(e) => {
            warn!(file = %file_name, error = %e, "copy failed");
            CopyOutcome {
                file_name,
                source: source.to_path_buf(),
                destination,
                status: CopyStatus::Failed(FailureReason::CopyFailed),
                backup,
                detail: Some(e.to_string()),
            }
        }
    }
}

/// Record a file the author gate rejected, so the report still lists it.
pub fn blocked(source: &Path, dest_dir: &Path, detail: String) -> CopyOutcome {
    let file_name = source
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    CopyOutcome {
        destination: dest_dir.join(&file_name),
        file_name,
        source: source.to_path_buf(),
        status: CopyStatus::Blocked,
        backup: None,
        detail: Some(detail),
    }
}

fn back_up(existing: &Path, dest_dir: &Path, file_name: &str) -> std::io::Result<PathBuf> {
    let backup_dir = dest_dir.join(BACKUP_SUBFOLDER);
    fs::create_dir_all(&backup_dir)?;
    let stamp = Local::now().format(BACKUP_STAMP_FORMAT);
    let backup_path = backup_dir.join(format!("{stamp}_{file_name}"));
    fs::copy(existing, &backup_path)?;
    Ok(backup_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn copies_into_created_destination() {
        let src_dir = TempDir::new().unwrap();
        let dest_root = TempDir::new().unwrap();
        let source = src_dir.path().join("Report.dotx");
        fs::write(&source, b"template bytes").unwrap();

        let dest_dir = dest_root.path().join("Custom Templates");
        let outcome = copy_with_backup(&source, &dest_dir);

        assert_eq!(outcome.status, CopyStatus::Copied);
        assert!(outcome.backup.is_none());
        assert_eq!(fs::read(dest_dir.join("Report.dotx")).unwrap(), b"template bytes");
    }

    #[test]
    fn existing_file_is_backed_up_before_overwrite() {
        let src_dir = TempDir::new().unwrap();
        let dest_dir = TempDir::new().unwrap();
        let source = src_dir.path().join("Normal.dotm");
        fs::write(&source, b"new contents").unwrap();
        fs::write(dest_dir.path().join("Normal.dotm"), b"old contents").unwrap();

        let outcome = copy_with_backup(&source, dest_dir.path());

        assert_eq!(outcome.status, CopyStatus::Copied);
        let backup = outcome.backup.expect("backup path recorded");
        assert!(backup.starts_with(dest_dir.path().join(BACKUP_SUBFOLDER)));
        assert!(backup
            .file_name()
            .unwrap()
            .to_string_lossy()
            .ends_with("_Normal.dotm"));
        assert_eq!(fs::read(&backup).unwrap(), b"old contents");
        assert_eq!(fs::read(dest_dir.path().join("Normal.dotm")).unwrap(), b"new contents");
    }

    #[test]
    fn same_location_is_skipped_without_backup() {
        let dest_dir = TempDir::new().unwrap();
        let source = dest_dir.path().join("Book.xltx");
        fs::write(&source, b"contents").unwrap();

        let outcome = copy_with_backup(&source, dest_dir.path());

        assert_eq!(outcome.status, CopyStatus::SkippedSameLocation);
        assert!(outcome.backup.is_none());
        assert!(!dest_dir.path().join(BACKUP_SUBFOLDER).exists());
        assert_eq!(fs::read(&source).unwrap(), b"contents");
    }

    #[test]
    fn missing_source_reports_copy_failure() {
        let dest_dir = TempDir::new().unwrap();
        let outcome = copy_with_backup(Path::new("no/such/Template.dotx"), dest_dir.path());
        assert_eq!(outcome.status, CopyStatus::Failed(FailureReason::CopyFailed));
        assert!(outcome.detail.is_some());
    }

    #[cfg(unix)]
    #[test]
    fn unwritable_destination_reports_directory_failure() {
        use std::os::unix::fs::PermissionsExt;

        let src_dir = TempDir::new().unwrap();
        let source = src_dir.path().join("Report.dotx");
        fs::write(&source, b"x").unwrap();

        let locked = TempDir::new().unwrap();
        fs::set_permissions(locked.path(), fs::Permissions::from_mode(0o555)).unwrap();
        let outcome = copy_with_backup(&source, &locked.path().join("nested"));
        fs::set_permissions(locked.path(), fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(
            outcome.status,
            CopyStatus::Failed(FailureReason::CannotCreateDirectory)
        );
    }

    #[test]
    fn blocked_outcome_carries_detail() {
        let outcome = blocked(
            Path::new("src/Evil.dotx"),
            Path::new("dest"),
            "author not in allow-list: evil.com".to_string(),
        );
        assert_eq!(outcome.status, CopyStatus::Blocked);
        assert_eq!(outcome.file_name, "Evil.dotx");
        assert!(!outcome.copied());
    }
}
