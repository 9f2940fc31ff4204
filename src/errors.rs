use std::{io, path::PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ItemError {
    #[error("permission denied: {}", path.display())]
    PermissionDenied { path: PathBuf },
    #[error("file in use: {}", path.display())]
    InUse { path: PathBuf },
    #[error("not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("{}: {}", reason, path.display())]
    Other { path: PathBuf, reason: String },
}

impl ItemError {
    pub fn from_io(path: &std::path::Path, err: &io::Error) -> Self {
        let path = path.to_path_buf();
        match err.kind() {
            io::ErrorKind::PermissionDenied => ItemError::PermissionDenied { path },
            io::ErrorKind::NotFound => ItemError::NotFound { path },
            _ => {
                if is_in_use(err) {
                    ItemError::InUse { path }
                } else {
                    ItemError::Other {
                        path,
                        reason: err.to_string(),
                    }
                }
            }
        }
    }

    pub fn path(&self) -> &std::path::Path {
        match self {
            ItemError::PermissionDenied { path }
            | ItemError::InUse { path }
            | ItemError::NotFound { path }
            | ItemError::Other { path, .. } => path,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ItemError::NotFound { .. })
    }
}

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("launch the game once first: {} is missing", path.display())]
    LaunchRequired { path: PathBuf },
    #[error("permission denied: {}", path.display())]
    PermissionDenied { path: PathBuf },
    #[error("backup failed for {}: {}", path.display(), reason)]
    BackupFailed { path: PathBuf, reason: String },
    #[error("write failed for {}: {}", path.display(), reason)]
    WriteFailed { path: PathBuf, reason: String },
}

// ERROR_SHARING_VIOLATION / ERROR_LOCK_VIOLATION on Windows, EBUSY / ETXTBSY
// elsewhere.
fn is_in_use(err: &io::Error) -> bool {
    match err.raw_os_error() {
        Some(code) => {
            if cfg!(windows) {
                code == 32 || code == 33
            } else {
                code == 16 || code == 26
            }
        }
        None => false,
    }
}
