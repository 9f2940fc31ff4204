use crate::{errors::ItemError, logger::Logger};
use serde::{Deserialize, Serialize};
use std::{fs, io, path::Path, path::PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteMode {
    Trash,
    Permanent,
}

impl Default for DeleteMode {
    fn default() -> Self {
        DeleteMode::Trash
    }
}

impl DeleteMode {
    pub fn label(self) -> &'static str {
        match self {
            DeleteMode::Trash => "trash",
            DeleteMode::Permanent => "permanent",
        }
    }
}

#[derive(Debug, Default)]
pub struct DeleteOutcome {
    pub processed: usize,
    pub permanent: bool,
    pub used_trash: bool,
    pub failures: Vec<ItemError>,
}

pub fn trash_available() -> bool {
    if cfg!(windows) || cfg!(target_os = "macos") {
        return true;
    }
    // The XDG trash lives under the home directory; without one there is
    // nowhere to move files.
    std::env::var_os("HOME").is_some()
}

pub fn delete(paths: &[PathBuf], mode: DeleteMode, logger: &mut Logger) -> DeleteOutcome {
    let mut outcome = DeleteOutcome::default();

    // Degrade is a single decision made up front for the whole batch.
    let effective = match mode {
        DeleteMode::Trash if !trash_available() => {
            logger.info("Trash unavailable, falling back to permanent deletion".to_string());
            DeleteMode::Permanent
        }
        other => other,
    };
    outcome.permanent = effective == DeleteMode::Permanent;
    outcome.used_trash = effective == DeleteMode::Trash;

    for path in paths {
        match delete_one(path, effective) {
            Ok(()) => {
                outcome.processed += 1;
                logger.debug(format!("Deleted ({}): {}", effective.label(), path.display()));
            }
            Err(err) if err.is_not_found() => {
                logger.debug(format!("Already gone: {}", path.display()));
            }
            Err(err) => {
                logger.info(format!("Delete failed: {err}"));
                outcome.failures.push(err);
            }
        }
    }

    outcome
}

fn delete_one(path: &Path, mode: DeleteMode) -> Result<(), ItemError> {
    let meta = fs::symlink_metadata(path).map_err(|err| ItemError::from_io(path, &err))?;

    match mode {
        DeleteMode::Trash => trash::delete(path).map_err(|err| ItemError::Other {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }),
        DeleteMode::Permanent => {
            let result = if meta.file_type().is_symlink() {
                remove_symlink(path, &meta)
            } else if meta.is_dir() {
                // remove_dir_all does not follow symlinks inside the tree.
                fs::remove_dir_all(path)
            } else {
                fs::remove_file(path)
            };
            result.map_err(|err| ItemError::from_io(path, &err))
        }
    }
}

#[cfg(unix)]
fn remove_symlink(path: &Path, _meta: &fs::Metadata) -> io::Result<()> {
    fs::remove_file(path)
}

#[cfg(not(unix))]
fn remove_symlink(path: &Path, meta: &fs::Metadata) -> io::Result<()> {
    if meta.is_dir() {
        fs::remove_dir(path)
    } else {
        fs::remove_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn permanent_delete_handles_files_and_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("stale.bak");
        let tree = dir.path().join("Cache");
        fs::write(&file, b"x").unwrap();
        fs::create_dir_all(tree.join("sub")).unwrap();
        fs::write(tree.join("sub/data"), b"x").unwrap();

        let mut logger = Logger::new(false);
        let outcome = delete(
            &[file.clone(), tree.clone()],
            DeleteMode::Permanent,
            &mut logger,
        );

        assert_eq!(outcome.processed, 2);
        assert!(outcome.permanent);
        assert!(!outcome.used_trash);
        assert!(outcome.failures.is_empty());
        assert!(!file.exists());
        assert!(!tree.exists());
    }

    #[test]
    fn vanished_paths_count_as_processed_zero() {
        let dir = tempfile::tempdir().unwrap();
        let ghost = dir.path().join("gone.old");

        let mut logger = Logger::new(false);
        let outcome = delete(&[ghost], DeleteMode::Permanent, &mut logger);

        assert_eq!(outcome.processed, 0);
        assert!(outcome.failures.is_empty());
    }

    #[test]
    fn failures_do_not_abort_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.bak");
        let real = dir.path().join("real.bak");
        fs::write(&real, b"x").unwrap();

        let mut logger = Logger::new(false);
        let outcome = delete(&[missing, real.clone()], DeleteMode::Permanent, &mut logger);

        assert_eq!(outcome.processed, 1);
        assert!(!real.exists());
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directory_is_removed_without_touching_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("keep.txt"), b"x").unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let mut logger = Logger::new(false);
        let outcome = delete(&[link.clone()], DeleteMode::Permanent, &mut logger);

        assert_eq!(outcome.processed, 1);
        assert!(!link.exists());
        assert!(target.join("keep.txt").exists());
    }
}
