use crate::wow::{SubPath, Version};
use std::{fs, path::PathBuf, time::SystemTime};
use walkdir::WalkDir;

const STALE_SUFFIXES: &[&str] = &[".bak", ".old"];
const SCREENSHOT_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tga", "gif"];

#[derive(Debug, Clone)]
pub struct StaleGroup {
    pub version: Version,
    pub files: Vec<PathBuf>,
}

pub fn scan_stale(versions: &[Version]) -> Vec<StaleGroup> {
    let mut groups = Vec::new();
    for version in versions {
        let mut files = Vec::new();
        for entry in WalkDir::new(&version.path)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| entry.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_lowercase();
            if STALE_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)) {
                files.push(entry.into_path());
            }
        }
        if !files.is_empty() {
            groups.push(StaleGroup {
                version: version.clone(),
                files,
            });
        }
    }
    groups
}

#[derive(Debug, Clone)]
pub struct Cleanable {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CleanableGroup {
    pub version: Version,
    pub entries: Vec<Cleanable>,
}

pub fn scan_cleanables(versions: &[Version]) -> Vec<CleanableGroup> {
    let mut groups = Vec::new();
    for version in versions {
        let mut entries = Vec::new();
        for kind in [SubPath::Logs, SubPath::Errors, SubPath::Cache] {
            let path = version.subpath(kind);
            if path.is_dir() {
                entries.push(Cleanable {
                    name: folder_name(kind).to_string(),
                    path,
                });
            }
        }
        entries.extend(legacy_manifest_backups(version));
        if !entries.is_empty() {
            groups.push(CleanableGroup {
                version: version.clone(),
                entries,
            });
        }
    }
    groups
}

fn folder_name(kind: SubPath) -> &'static str {
    match kind {
        SubPath::Logs => "Logs",
        SubPath::Errors => "Errors",
        SubPath::Cache => "Cache",
        _ => unreachable!("not a cleanable folder"),
    }
}

// Stale AddOns.txt.bak files live next to each character's AddOns.txt.
fn legacy_manifest_backups(version: &Version) -> Vec<Cleanable> {
    let mut found = Vec::new();
    let account = version.subpath(SubPath::Account);
    let Ok(realms) = fs::read_dir(&account) else {
        return found;
    };
    for realm in realms.filter_map(|entry| entry.ok()) {
        if !realm.path().is_dir() {
            continue;
        }
        let Ok(characters) = fs::read_dir(realm.path()) else {
            continue;
        };
        for character in characters.filter_map(|entry| entry.ok()) {
            let candidate = character.path().join("AddOns.txt.bak");
            if candidate.is_file() {
                found.push(Cleanable {
                    name: "AddOns.txt.bak".to_string(),
                    path: candidate,
                });
            }
        }
    }
    found
}

#[derive(Debug, Clone)]
pub struct Screenshot {
    pub path: PathBuf,
    pub modified: Option<SystemTime>,
}

pub fn list_screenshots(version: &Version) -> Vec<Screenshot> {
    let dir = version.subpath(SubPath::Screenshots);
    let Ok(entries) = fs::read_dir(&dir) else {
        return Vec::new();
    };

    let mut shots: Vec<Screenshot> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|ty| ty.is_file()).unwrap_or(false))
        .filter(|entry| {
            let name = entry.file_name().to_string_lossy().to_lowercase();
            SCREENSHOT_EXTENSIONS
                .iter()
                .any(|ext| name.ends_with(&format!(".{ext}")))
        })
        .map(|entry| Screenshot {
            modified: entry.metadata().ok().and_then(|meta| meta.modified().ok()),
            path: entry.path(),
        })
        .collect();

    // Newest first; unreadable mtimes sort last.
    shots.sort_by(|a, b| match (b.modified, a.modified) {
        (Some(b_time), Some(a_time)) => b_time.cmp(&a_time),
        (Some(_), None) => std::cmp::Ordering::Greater,
        (None, Some(_)) => std::cmp::Ordering::Less,
        (None, None) => std::cmp::Ordering::Equal,
    });
    shots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{deleter, logger::Logger, wow};
    use std::fs;

    fn retail_fixture() -> (tempfile::TempDir, Version) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("_retail_/Interface/AddOns")).unwrap();
        fs::create_dir_all(dir.path().join("_retail_/WTF")).unwrap();
        let version = wow::versions(dir.path()).remove(0);
        (dir, version)
    }

    #[test]
    fn stale_scan_matches_suffixes_case_insensitively() {
        let (_dir, version) = retail_fixture();
        let wtf = version.path.join("WTF");
        fs::write(wtf.join("Config.wtf.bak"), b"x").unwrap();
        fs::write(wtf.join("SAVED.OLD"), b"x").unwrap();
        fs::write(wtf.join("Config.wtf"), b"x").unwrap();
        fs::write(version.path.join("notes.txt"), b"x").unwrap();

        let groups = scan_stale(&[version.clone()]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].files.len(), 2);
    }

    #[test]
    fn stale_scan_omits_versions_without_hits() {
        let (_dir, version) = retail_fixture();
        assert!(scan_stale(&[version]).is_empty());
    }

    #[test]
    fn scan_delete_rescan_is_empty() {
        let (_dir, version) = retail_fixture();
        fs::write(version.path.join("a.bak"), b"x").unwrap();
        fs::write(version.path.join("b.old"), b"x").unwrap();

        let groups = scan_stale(&[version.clone()]);
        let paths: Vec<_> = groups[0].files.clone();
        let mut logger = Logger::new(false);
        let outcome = deleter::delete(&paths, deleter::DeleteMode::Permanent, &mut logger);
        assert_eq!(outcome.processed, 2);

        assert!(scan_stale(&[version]).is_empty());
    }

    #[test]
    fn cleanables_report_present_folders_and_manifest_backups() {
        let (_dir, version) = retail_fixture();
        fs::create_dir(version.path.join("Logs")).unwrap();
        fs::create_dir(version.path.join("Cache")).unwrap();
        let character = version.path.join("WTF/Account/REALM/Char");
        fs::create_dir_all(&character).unwrap();
        fs::write(character.join("AddOns.txt.bak"), b"x").unwrap();

        let groups = scan_cleanables(&[version]);
        let names: Vec<&str> = groups[0]
            .entries
            .iter()
            .map(|entry| entry.name.as_str())
            .collect();
        assert_eq!(names, ["Logs", "Cache", "AddOns.txt.bak"]);
    }

    #[test]
    fn screenshots_sorted_newest_first() {
        let (_dir, version) = retail_fixture();
        let shots = version.path.join("Screenshots");
        fs::create_dir(&shots).unwrap();
        fs::write(shots.join("old.jpg"), b"x").unwrap();
        fs::write(shots.join("skip.txt"), b"x").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        fs::write(shots.join("new.png"), b"x").unwrap();

        let listed = list_screenshots(&version);
        assert_eq!(listed.len(), 2);
        assert!(listed[0].path.ends_with("new.png"));
        assert!(listed[1].path.ends_with("old.jpg"));
    }
}
