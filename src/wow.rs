use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

pub const GAME_NAME: &str = "World of Warcraft";

const VERSION_CACHE_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flavor {
    Retail,
    Classic,
    ClassicEra,
}

impl Flavor {
    pub fn display_name(self) -> &'static str {
        match self {
            Flavor::Retail => "Retail",
            Flavor::Classic => "Classic",
            Flavor::ClassicEra => "Classic Era",
        }
    }

    pub fn is_classic_family(self) -> bool {
        matches!(self, Flavor::Classic | Flavor::ClassicEra)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Live,
    Ptr,
    Beta,
}

impl Variant {
    fn suffix(self) -> &'static str {
        match self {
            Variant::Live => "",
            Variant::Ptr => " PTR",
            Variant::Beta => " Beta",
        }
    }
}

// Enumeration order: Classic Era before Classic before Retail, base folder
// before PTR before Beta.
const VERSION_DIRS: &[(&str, Flavor, Variant)] = &[
    ("_classic_era_", Flavor::ClassicEra, Variant::Live),
    ("_classic_era_ptr_", Flavor::ClassicEra, Variant::Ptr),
    ("_classic_era_beta_", Flavor::ClassicEra, Variant::Beta),
    ("_classic_", Flavor::Classic, Variant::Live),
    ("_classic_ptr_", Flavor::Classic, Variant::Ptr),
    ("_classic_beta_", Flavor::Classic, Variant::Beta),
    ("_retail_", Flavor::Retail, Variant::Live),
    ("_ptr_", Flavor::Retail, Variant::Ptr),
    ("_beta_", Flavor::Retail, Variant::Beta),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub path: PathBuf,
    pub flavor: Flavor,
    pub variant: Variant,
}

impl Version {
    pub fn label(&self) -> String {
        format!("{}{}", self.flavor.display_name(), self.variant.suffix())
    }

    pub fn subpath(&self, kind: SubPath) -> PathBuf {
        match kind {
            SubPath::Wtf => self.path.join("WTF"),
            SubPath::AddOns => self.path.join("Interface").join("AddOns"),
            SubPath::Screenshots => self.path.join("Screenshots"),
            SubPath::Logs => self.path.join("Logs"),
            SubPath::Errors => self.path.join("Errors"),
            SubPath::Cache => self.path.join("Cache"),
            SubPath::Account => self.path.join("WTF").join("Account"),
            SubPath::ConfigWtf => self.path.join("WTF").join("Config.wtf"),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.subpath(SubPath::AddOns).is_dir() && self.subpath(SubPath::Wtf).is_dir()
    }

    pub fn has_config(&self) -> bool {
        self.subpath(SubPath::ConfigWtf).is_file()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubPath {
    Wtf,
    AddOns,
    Screenshots,
    Logs,
    Errors,
    Cache,
    Account,
    ConfigWtf,
}

pub fn versions(root: &Path) -> Vec<Version> {
    let mut found = Vec::new();
    for (dir, flavor, variant) in VERSION_DIRS {
        let path = root.join(dir);
        if path.is_dir() {
            found.push(Version {
                path,
                flavor: *flavor,
                variant: *variant,
            });
        }
    }
    found
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootCheck {
    Versions,
    LauncherOnly,
    Invalid,
}

pub fn check_root(root: &Path) -> RootCheck {
    if !versions(root).is_empty() {
        return RootCheck::Versions;
    }
    if has_launcher(root) {
        return RootCheck::LauncherOnly;
    }
    RootCheck::Invalid
}

fn has_launcher(root: &Path) -> bool {
    root.join("Wow.exe").is_file()
        || root.join("World of Warcraft Launcher.app").exists()
        || root.join("Launcher.app").exists()
}

pub fn suggest_roots() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if cfg!(windows) {
        candidates.push(PathBuf::from("C:\\Program Files (x86)\\World of Warcraft"));
        candidates.push(PathBuf::from("C:\\Program Files\\World of Warcraft"));
    }
    if cfg!(target_os = "macos") {
        candidates.push(PathBuf::from("/Applications/World of Warcraft"));
    }
    if let Some(home) = dirs_home() {
        candidates.push(home.join("Games/world-of-warcraft/drive_c/Program Files (x86)/World of Warcraft"));
        candidates.push(home.join("Games/battlenet/drive_c/Program Files (x86)/World of Warcraft"));
        candidates.push(home.join(".wine/drive_c/Program Files (x86)/World of Warcraft"));
    }

    candidates
        .into_iter()
        .filter(|path| check_root(path) != RootCheck::Invalid)
        .collect()
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

#[derive(Debug)]
pub struct VersionCache {
    root: Option<PathBuf>,
    listed_at: Option<Instant>,
    versions: Vec<Version>,
}

impl VersionCache {
    pub fn new() -> Self {
        Self {
            root: None,
            listed_at: None,
            versions: Vec::new(),
        }
    }

    pub fn versions(&mut self, root: &Path) -> Vec<Version> {
        let fresh = self.root.as_deref() == Some(root)
            && self
                .listed_at
                .map(|at| at.elapsed() < VERSION_CACHE_TTL)
                .unwrap_or(false);
        if !fresh {
            self.versions = versions(root);
            self.root = Some(root.to_path_buf());
            self.listed_at = Some(Instant::now());
        }
        self.versions.clone()
    }

    pub fn invalidate(&mut self) {
        self.root = None;
        self.listed_at = None;
        self.versions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn enumerates_in_fixed_precedence() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["_retail_", "_ptr_", "_classic_", "_classic_era_"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        let labels: Vec<String> = versions(dir.path()).iter().map(Version::label).collect();
        assert_eq!(labels, ["Classic Era", "Classic", "Retail", "Retail PTR"]);
    }

    #[test]
    fn unknown_folders_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("_retail_")).unwrap();
        fs::create_dir(dir.path().join("Data")).unwrap();
        fs::create_dir(dir.path().join("_retail_backup_")).unwrap();
        let found = versions(dir.path());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].flavor, Flavor::Retail);
    }

    #[test]
    fn completeness_requires_addons_and_wtf() {
        let dir = tempfile::tempdir().unwrap();
        let retail = dir.path().join("_retail_");
        fs::create_dir_all(retail.join("Interface/AddOns")).unwrap();
        let version = versions(dir.path()).remove(0);
        assert!(!version.is_complete());
        fs::create_dir_all(retail.join("WTF")).unwrap();
        assert!(version.is_complete());
    }

    #[test]
    fn root_check_recognizes_launcher_without_versions() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(check_root(dir.path()), RootCheck::Invalid);
        fs::write(dir.path().join("Wow.exe"), b"mz").unwrap();
        assert_eq!(check_root(dir.path()), RootCheck::LauncherOnly);
        fs::create_dir(dir.path().join("_classic_")).unwrap();
        assert_eq!(check_root(dir.path()), RootCheck::Versions);
    }

    #[test]
    fn cache_serves_stale_listing_until_invalidated() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("_retail_")).unwrap();
        let mut cache = VersionCache::new();
        assert_eq!(cache.versions(dir.path()).len(), 1);

        fs::create_dir(dir.path().join("_classic_")).unwrap();
        assert_eq!(cache.versions(dir.path()).len(), 1);

        cache.invalidate();
        assert_eq!(cache.versions(dir.path()).len(), 2);
    }
}
