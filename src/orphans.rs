use crate::{
    config::write_atomic,
    errors::ItemError,
    logger::Logger,
    wow::{SubPath, Version},
};
use std::{
    collections::{HashMap, HashSet},
    fs,
    path::{Path, PathBuf},
};

// Longest suffix first.
const SV_SUFFIXES: &[&str] = &[".lua.bak", ".lua", ".bak"];
const SV_SENTINEL: &str = "savedvariables";
const BLIZZARD_PREFIX: &str = "blizzard_";

pub fn addon_key(file_name: &str) -> Option<String> {
    let lower = file_name.to_lowercase();
    for suffix in SV_SUFFIXES {
        if lower.ends_with(suffix) {
            let residue = &lower[..lower.len() - suffix.len()];
            if residue.is_empty() {
                return None;
            }
            return Some(residue.to_string());
        }
    }
    None
}

// Blizzard core modules never appear in the addon set, but their plain .lua
// SavedVariables must survive; only the .lua.bak siblings are eligible.
pub fn is_protected_blizzard(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    lower.starts_with(BLIZZARD_PREFIX) && lower.ends_with(".lua")
}

pub fn is_orphan(file_name: &str, addon_keys: &HashSet<String>) -> bool {
    if is_protected_blizzard(file_name) {
        return false;
    }
    match addon_key(file_name) {
        Some(key) => !addon_keys.contains(&key),
        None => false,
    }
}

#[derive(Debug, Clone)]
pub struct AddonInventory {
    // Every addon folder in directory-listing order, original casing.
    pub folders: Vec<String>,
    // Casefolded names minus blizzard_ entries; the set orphan checks run against.
    pub keys: HashSet<String>,
}

impl AddonInventory {
    pub fn load(version: &Version) -> Self {
        let mut folders = Vec::new();
        let mut keys = HashSet::new();
        if let Ok(entries) = fs::read_dir(version.subpath(SubPath::AddOns)) {
            for entry in entries.filter_map(|entry| entry.ok()) {
                if !entry.path().is_dir() {
                    continue;
                }
                let name = entry.file_name().to_string_lossy().into_owned();
                let lower = name.to_lowercase();
                if !lower.starts_with(BLIZZARD_PREFIX) {
                    keys.insert(lower);
                }
                folders.push(name);
            }
        }
        Self { folders, keys }
    }
}

#[derive(Debug, Clone)]
pub struct OrphanGroup {
    pub version: Version,
    pub files: Vec<PathBuf>,
}

pub fn scan(versions: &[Version]) -> Vec<OrphanGroup> {
    let mut groups = Vec::new();
    for version in versions {
        let files = scan_version(version);
        if !files.is_empty() {
            groups.push(OrphanGroup {
                version: version.clone(),
                files,
            });
        }
    }
    groups
}

pub fn scan_version(version: &Version) -> Vec<PathBuf> {
    let inventory = AddonInventory::load(version);
    let mut orphans = Vec::new();
    for dir in saved_variables_dirs(version) {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.filter_map(|entry| entry.ok()) {
            if !entry.path().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_orphan(&name, &inventory.keys) {
                orphans.push(entry.path());
            }
        }
    }
    orphans
}

// Account scope, then realm, then character. A directory literally named
// SavedVariables (any casing) is never a realm or character.
pub fn saved_variables_dirs(version: &Version) -> Vec<PathBuf> {
    let account = version.subpath(SubPath::Account);
    let mut dirs = Vec::new();

    let account_sv = account.join("SavedVariables");
    if account_sv.is_dir() {
        dirs.push(account_sv);
    }

    for realm in subdirs_excluding_sentinel(&account) {
        let realm_sv = realm.join("SavedVariables");
        if realm_sv.is_dir() {
            dirs.push(realm_sv);
        }
        for character in subdirs_excluding_sentinel(&realm) {
            let character_sv = character.join("SavedVariables");
            if character_sv.is_dir() {
                dirs.push(character_sv);
            }
        }
    }
    dirs
}

fn subdirs_excluding_sentinel(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter(|entry| {
            entry.file_name().to_string_lossy().to_lowercase() != SV_SENTINEL
        })
        .map(|entry| entry.path())
        .collect()
}

#[derive(Debug, Clone)]
pub struct CharacterManifest {
    pub character: String,
    pub written: usize,
    pub removed: usize,
}

#[derive(Debug, Default)]
pub struct ManifestReport {
    pub characters: Vec<CharacterManifest>,
    pub failures: Vec<ItemError>,
}

pub fn rebuild_manifests(version: &Version, logger: &mut Logger) -> ManifestReport {
    let inventory = AddonInventory::load(version);
    let installed: HashSet<String> = inventory
        .folders
        .iter()
        .map(|name| name.to_lowercase())
        .collect();
    let mut report = ManifestReport::default();

    let account = version.subpath(SubPath::Account);
    for realm in subdirs_excluding_sentinel(&account) {
        let realm_name = dir_name(&realm);
        for character in subdirs_excluding_sentinel(&realm) {
            let manifest = character.join("AddOns.txt");
            if !manifest.is_file() {
                continue;
            }
            let label = format!("{}/{}", realm_name, dir_name(&character));
            match rebuild_one(&manifest, &inventory, &installed) {
                Ok((written, removed)) => {
                    logger.debug(format!(
                        "Rebuilt {}: {written} entries, {removed} removed",
                        manifest.display()
                    ));
                    report.characters.push(CharacterManifest {
                        character: label,
                        written,
                        removed,
                    });
                }
                Err(err) => {
                    logger.info(format!("Manifest rewrite failed: {err}"));
                    report.failures.push(err);
                }
            }
        }
    }
    report
}

fn rebuild_one(
    manifest: &Path,
    inventory: &AddonInventory,
    installed: &HashSet<String>,
) -> Result<(usize, usize), ItemError> {
    let raw = fs::read_to_string(manifest).map_err(|err| ItemError::from_io(manifest, &err))?;
    let previous = parse_manifest(&raw);

    let removed = previous
        .keys()
        .filter(|name| !installed.contains(*name))
        .count();

    let mut out = String::new();
    for folder in &inventory.folders {
        let enabled = previous
            .get(&folder.to_lowercase())
            .copied()
            .unwrap_or(true);
        out.push_str(folder);
        out.push('\t');
        out.push_str(if enabled { "enabled" } else { "disabled" });
        out.push('\n');
    }

    write_atomic(manifest, out.as_bytes()).map_err(|err| ItemError::Other {
        path: manifest.to_path_buf(),
        reason: err.to_string(),
    })?;
    Ok((inventory.folders.len(), removed))
}

// name\tenabled records; empty lines and unknown tokens dropped; the last
// occurrence of a duplicated name wins.
fn parse_manifest(raw: &str) -> HashMap<String, bool> {
    let mut entries = HashMap::new();
    for line in raw.lines() {
        let Some((name, bit)) = line.split_once('\t') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let enabled = match bit.trim().to_lowercase().as_str() {
            "enabled" => true,
            "disabled" => false,
            _ => continue,
        };
        entries.insert(name.to_lowercase(), enabled);
    }
    entries
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
