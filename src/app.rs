use crate::{
    config::{GlobalConfig, UiConfig},
    deleter::{self, DeleteMode, DeleteOutcome},
    hardware::{self, GameProfile, HardwareProfile},
    logger::{ExportMode, Logger},
    orphans::{self, ManifestReport},
    scanner,
    update::{self, UpdateStatus},
    wow::{self, RootCheck, Version, VersionCache},
    wtf::{self, Preset, PresetOutcome},
};
use anyhow::{bail, Result};
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::mpsc::{self, Receiver, Sender},
    thread,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Stale,
    Folders,
    Orphans,
    Optimize,
}

impl OpKind {
    pub fn label(self) -> &'static str {
        match self {
            OpKind::Stale => "stale backups",
            OpKind::Folders => "folders",
            OpKind::Orphans => "orphan SavedVariables",
            OpKind::Optimize => "optimize",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Candidate {
    pub label: String,
    pub path: PathBuf,
    pub selected: bool,
}

#[derive(Debug, Clone)]
pub struct CandidateGroup {
    pub version_label: String,
    pub items: Vec<Candidate>,
}

#[derive(Debug, Default)]
pub struct OpPane {
    pub groups: Vec<CandidateGroup>,
    pub scanning: bool,
    pub last_outcome: Option<String>,
}

impl OpPane {
    pub fn selected_paths(&self) -> Vec<PathBuf> {
        self.groups
            .iter()
            .flat_map(|group| group.items.iter())
            .filter(|item| item.selected)
            .map(|item| item.path.clone())
            .collect()
    }

    pub fn total(&self) -> usize {
        self.groups.iter().map(|group| group.items.len()).sum()
    }
}

#[derive(Debug, Clone)]
pub enum PendingAction {
    Delete {
        op: OpKind,
        paths: Vec<PathBuf>,
        mode: DeleteMode,
    },
    ApplyPreset {
        version: Version,
        preset: Preset,
    },
    RebuildManifests {
        versions: Vec<Version>,
    },
}

pub enum WorkerMessage {
    ScanDone {
        op: OpKind,
        root: PathBuf,
        groups: Vec<CandidateGroup>,
    },
    HardwareReady(HardwareProfile),
    UpdateChecked(Result<UpdateStatus, String>),
}

pub struct App {
    pub ui_config: UiConfig,
    pub global: GlobalConfig,
    pub logger: Logger,
    pub status: String,
    pub should_quit: bool,
    pub pending: Option<PendingAction>,
    pub stale: OpPane,
    pub folders: OpPane,
    pub orphans: OpPane,
    version_cache: VersionCache,
    inflight: HashSet<(OpKind, PathBuf)>,
    root_override: bool,
    trash_warned: bool,
    worker_tx: Sender<WorkerMessage>,
    worker_rx: Receiver<WorkerMessage>,
}

impl App {
    pub fn initialize() -> Result<Self> {
        let ui_config = UiConfig::load_or_create();
        let global = GlobalConfig::load_or_create();
        let logger = Logger::new(global.verbose);
        let (worker_tx, worker_rx) = mpsc::channel();

        let mut app = Self {
            ui_config,
            global,
            logger,
            status: String::new(),
            should_quit: false,
            pending: None,
            stale: OpPane::default(),
            folders: OpPane::default(),
            orphans: OpPane::default(),
            version_cache: VersionCache::new(),
            inflight: HashSet::new(),
            root_override: false,
            trash_warned: false,
            worker_tx,
            worker_rx,
        };

        if app.global.install_root.is_none() {
            if let Some(found) = wow::suggest_roots().into_iter().next() {
                app.status = format!("Found install at {}", found.display());
                app.logger
                    .info(format!("Suggested install root: {}", found.display()));
            }
        }
        Ok(app)
    }

    pub fn root(&self) -> Option<&Path> {
        self.global.install_root.as_deref()
    }

    pub fn set_root(&mut self, path: PathBuf, override_invalid: bool) -> Result<()> {
        match wow::check_root(&path) {
            RootCheck::Versions | RootCheck::LauncherOnly => {}
            RootCheck::Invalid if override_invalid => {
                self.root_override = true;
                self.logger
                    .info(format!("Root accepted by override: {}", path.display()));
            }
            RootCheck::Invalid => {
                bail!(
                    "no WoW versions or launcher found under {} (override to use it anyway)",
                    path.display()
                );
            }
        }
        self.logger.info(format!("Install root: {}", path.display()));
        self.global.install_root = Some(path);
        self.global.save();
        self.version_cache.invalidate();
        Ok(())
    }

    pub fn versions(&mut self) -> Result<Vec<Version>> {
        let Some(root) = self.global.install_root.clone() else {
            bail!("no install root selected");
        };
        let versions = self.version_cache.versions(&root);
        if versions.is_empty() && !self.root_override {
            bail!("no WoW versions under {}", root.display());
        }
        Ok(versions)
    }

    pub fn complete_versions(&mut self) -> Result<Vec<Version>> {
        Ok(self
            .versions()?
            .into_iter()
            .filter(Version::is_complete)
            .collect())
    }

    pub fn hardware(&mut self, refresh: bool) -> HardwareProfile {
        if !refresh {
            if let Some(cached) = &self.global.hardware {
                return cached.clone();
            }
        }
        let hw = hardware::probe();
        self.logger.info(format!(
            "Hardware: {} ({}c/{}t), {:.1} GiB RAM, GPUs: {}",
            hw.cpu_name,
            hw.cpu_cores,
            hw.cpu_threads,
            hw.ram_gb,
            hw.gpus.join(", ")
        ));
        self.global.hardware = Some(hw.clone());
        self.global.save();
        hw
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.global.verbose = verbose;
        self.logger.set_verbose(verbose);
        self.global.save();
    }

    pub fn set_delete_mode(&mut self, mode: DeleteMode) {
        self.global.delete_mode = mode;
        self.global.save();
    }

    pub fn export_log(&mut self, path: &Path, mode: ExportMode) -> Result<()> {
        self.logger.export(path, mode)?;
        self.ui_config.last_export_append = mode == ExportMode::Append;
        self.ui_config.save();
        self.logger.info(format!("Log exported to {}", path.display()));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Synchronous operation entry points (CLI, and TUI apply step)

    pub fn scan_stale_sync(&mut self) -> Result<Vec<CandidateGroup>> {
        let versions = self.versions()?;
        let guard = self.take_guard(OpKind::Stale)?;
        let groups = stale_groups(&versions);
        self.release_guard(guard);
        self.log_scan(OpKind::Stale, &groups);
        Ok(groups)
    }

    pub fn scan_folders_sync(&mut self) -> Result<Vec<CandidateGroup>> {
        let versions = self.versions()?;
        let guard = self.take_guard(OpKind::Folders)?;
        let groups = folder_groups(&versions);
        self.release_guard(guard);
        self.log_scan(OpKind::Folders, &groups);
        Ok(groups)
    }

    pub fn scan_orphans_sync(&mut self) -> Result<Vec<CandidateGroup>> {
        let versions = self.complete_versions()?;
        let guard = self.take_guard(OpKind::Orphans)?;
        let groups = orphan_groups(&versions);
        self.release_guard(guard);
        self.log_scan(OpKind::Orphans, &groups);
        Ok(groups)
    }

    pub fn delete_paths(&mut self, op: OpKind, paths: &[PathBuf]) -> DeleteOutcome {
        let mode = self.global.delete_mode;
        self.logger.info(format!(
            "Deleting {} {} item(s), mode {}",
            paths.len(),
            op.label(),
            mode.label()
        ));
        let outcome = deleter::delete(paths, mode, &mut self.logger);
        if mode == DeleteMode::Trash && !outcome.used_trash && !self.trash_warned {
            self.trash_warned = true;
            self.status =
                "Trash is unavailable here; items were deleted permanently".to_string();
        }
        self.logger.info(format!(
            "Deleted {}/{} item(s) ({} failure(s))",
            outcome.processed,
            paths.len(),
            outcome.failures.len()
        ));
        outcome
    }

    pub fn rebuild_manifests_sync(&mut self, version: &Version) -> ManifestReport {
        let report = orphans::rebuild_manifests(version, &mut self.logger);
        self.logger.info(format!(
            "{}: rebuilt AddOns.txt for {} character(s), {} failure(s)",
            version.label(),
            report.characters.len(),
            report.failures.len()
        ));
        report
    }

    pub fn apply_preset_sync(
        &mut self,
        version: &Version,
        preset: Preset,
    ) -> Result<PresetOutcome, crate::errors::ApplyError> {
        let hw = self.hardware(false);
        wtf::apply_preset(version, preset, Some(&hw), &mut self.logger)
    }

    pub fn suggested_preset_for(&mut self, version: &Version) -> Preset {
        let hw = self.hardware(false);
        let tiers = hardware::classify(&hw, GameProfile::for_version(version));
        hardware::suggested_preset(tiers.overall)
    }

    // ------------------------------------------------------------------
    // Background scans and probes (TUI)

    pub fn start_scan(&mut self, op: OpKind) {
        let versions = match if op == OpKind::Orphans {
            self.complete_versions()
        } else {
            self.versions()
        } {
            Ok(versions) => versions,
            Err(err) => {
                self.status = format!("Scan failed: {err}");
                self.logger.info(format!("Scan refused: {err}"));
                return;
            }
        };
        let Some(root) = self.global.install_root.clone() else {
            return;
        };
        if !self.inflight.insert((op, root.clone())) {
            self.status = format!("A {} scan is already running", op.label());
            return;
        }

        self.pane_mut(op).scanning = true;
        self.logger.debug(format!("Scan started: {}", op.label()));
        let tx = self.worker_tx.clone();
        thread::spawn(move || {
            let groups = match op {
                OpKind::Stale => stale_groups(&versions),
                OpKind::Folders => folder_groups(&versions),
                OpKind::Orphans => orphan_groups(&versions),
                OpKind::Optimize => Vec::new(),
            };
            let _ = tx.send(WorkerMessage::ScanDone { op, root, groups });
        });
    }

    pub fn start_hardware_probe(&mut self) {
        let tx = self.worker_tx.clone();
        thread::spawn(move || {
            let _ = tx.send(WorkerMessage::HardwareReady(hardware::probe()));
        });
    }

    pub fn start_update_check(&mut self) {
        if !self.global.check_updates {
            return;
        }
        let tx = self.worker_tx.clone();
        thread::spawn(move || {
            let result = update::check_for_updates(env!("CARGO_PKG_VERSION"))
                .map_err(|err| err.to_string());
            let _ = tx.send(WorkerMessage::UpdateChecked(result));
        });
    }

    pub fn tick(&mut self) {
        while let Ok(message) = self.worker_rx.try_recv() {
            match message {
                WorkerMessage::ScanDone { op, root, groups } => {
                    self.inflight.remove(&(op, root));
                    let total: usize = groups.iter().map(|group| group.items.len()).sum();
                    let pane = self.pane_mut(op);
                    pane.scanning = false;
                    pane.groups = groups;
                    self.logger
                        .info(format!("Scan finished: {} {} item(s)", total, op.label()));
                    self.status = format!("{} candidate(s) found", total);
                }
                WorkerMessage::HardwareReady(hw) => {
                    self.logger.info(format!(
                        "Hardware: {} ({}c/{}t), {:.1} GiB RAM, GPUs: {}",
                        hw.cpu_name,
                        hw.cpu_cores,
                        hw.cpu_threads,
                        hw.ram_gb,
                        hw.gpus.join(", ")
                    ));
                    self.global.hardware = Some(hw);
                    self.global.save();
                    self.status = "Hardware probe finished".to_string();
                }
                WorkerMessage::UpdateChecked(result) => match result {
                    Ok(UpdateStatus::Available { version }) => {
                        self.status = format!("Update available: v{version}");
                        self.logger.info(format!("Update available: v{version}"));
                    }
                    Ok(UpdateStatus::UpToDate) => {
                        self.logger.debug("Update check: up to date".to_string());
                    }
                    Err(err) => {
                        self.logger.info(format!("Update check failed: {err}"));
                    }
                },
            }
        }
    }

    // ------------------------------------------------------------------
    // Confirmation flow

    pub fn request_delete(&mut self, op: OpKind) {
        let paths = self.pane_mut(op).selected_paths();
        if paths.is_empty() {
            self.status = "Nothing selected".to_string();
            return;
        }
        self.pending = Some(PendingAction::Delete {
            op,
            paths,
            mode: self.global.delete_mode,
        });
    }

    pub fn request_preset(&mut self, version: Version, preset: Preset) {
        self.pending = Some(PendingAction::ApplyPreset { version, preset });
    }

    pub fn request_manifest_rebuild(&mut self) {
        match self.complete_versions() {
            Ok(versions) if !versions.is_empty() => {
                self.pending = Some(PendingAction::RebuildManifests { versions });
            }
            Ok(_) => self.status = "No complete versions".to_string(),
            Err(err) => self.status = format!("Manifest rebuild refused: {err}"),
        }
    }

    pub fn confirm_pending(&mut self) {
        let Some(action) = self.pending.take() else {
            return;
        };
        match action {
            PendingAction::Delete { op, paths, .. } => {
                let outcome = self.delete_paths(op, &paths);
                let summary = format!(
                    "Processed {} item(s), {} failure(s)",
                    outcome.processed,
                    outcome.failures.len()
                );
                self.pane_mut(op).last_outcome = Some(summary.clone());
                self.status = summary;
                self.start_scan(op);
            }
            PendingAction::ApplyPreset { version, preset } => {
                match self.apply_preset_sync(&version, preset) {
                    Ok(outcome) => {
                        self.status = format!(
                            "{}: applied {} ({} setting(s))",
                            version.label(),
                            preset.label(),
                            outcome.keys_applied
                        );
                    }
                    Err(err) => {
                        self.status = format!("Preset failed: {err}");
                        self.logger.info(format!("Preset failed: {err}"));
                    }
                }
            }
            PendingAction::RebuildManifests { versions } => {
                let mut characters = 0;
                for version in &versions {
                    characters += self.rebuild_manifests_sync(version).characters.len();
                }
                self.status = format!("Rebuilt manifests for {characters} character(s)");
            }
        }
    }

    pub fn cancel_pending(&mut self) {
        if self.pending.take().is_some() {
            self.status = "Cancelled".to_string();
            self.logger.info("Action cancelled".to_string());
        }
    }

    pub fn pane_mut(&mut self, op: OpKind) -> &mut OpPane {
        match op {
            OpKind::Stale => &mut self.stale,
            OpKind::Folders => &mut self.folders,
            OpKind::Orphans | OpKind::Optimize => &mut self.orphans,
        }
    }

    pub fn pane(&self, op: OpKind) -> &OpPane {
        match op {
            OpKind::Stale => &self.stale,
            OpKind::Folders => &self.folders,
            OpKind::Orphans | OpKind::Optimize => &self.orphans,
        }
    }

    fn take_guard(&mut self, op: OpKind) -> Result<(OpKind, PathBuf)> {
        let root = self
            .global
            .install_root
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        let key = (op, root);
        if !self.inflight.insert(key.clone()) {
            bail!("a {} operation is already running", op.label());
        }
        Ok(key)
    }

    fn release_guard(&mut self, key: (OpKind, PathBuf)) {
        self.inflight.remove(&key);
    }

    fn log_scan(&mut self, op: OpKind, groups: &[CandidateGroup]) {
        let total: usize = groups.iter().map(|group| group.items.len()).sum();
        self.logger
            .info(format!("Scan finished: {} {} item(s)", total, op.label()));
    }
}

fn stale_groups(versions: &[Version]) -> Vec<CandidateGroup> {
    scanner::scan_stale(versions)
        .into_iter()
        .map(|group| CandidateGroup {
            version_label: group.version.label(),
            items: group
                .files
                .into_iter()
                .map(|path| Candidate {
                    label: display_relative(&path, &group.version.path),
                    path,
                    selected: false,
                })
                .collect(),
        })
        .collect()
}

fn folder_groups(versions: &[Version]) -> Vec<CandidateGroup> {
    let mut groups = Vec::new();
    for version in versions {
        let mut items = Vec::new();
        for found in scanner::scan_cleanables(std::slice::from_ref(version)) {
            for entry in found.entries {
                items.push(Candidate {
                    label: entry.name,
                    path: entry.path,
                    selected: false,
                });
            }
        }
        for shot in scanner::list_screenshots(version) {
            items.push(Candidate {
                label: format!(
                    "Screenshots/{}",
                    shot.path
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_default()
                ),
                path: shot.path,
                selected: false,
            });
        }
        if !items.is_empty() {
            groups.push(CandidateGroup {
                version_label: version.label(),
                items,
            });
        }
    }
    groups
}

fn orphan_groups(versions: &[Version]) -> Vec<CandidateGroup> {
    orphans::scan(versions)
        .into_iter()
        .map(|group| CandidateGroup {
            version_label: group.version.label(),
            items: group
                .files
                .into_iter()
                .map(|path| Candidate {
                    label: display_relative(&path, &group.version.path),
                    path,
                    selected: false,
                })
                .collect(),
        })
        .collect()
}

fn display_relative(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .display()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn app_with_root(root: &Path) -> App {
        let (worker_tx, worker_rx) = mpsc::channel();
        App {
            ui_config: UiConfig::default(),
            global: GlobalConfig {
                install_root: Some(root.to_path_buf()),
                delete_mode: DeleteMode::Permanent,
                ..GlobalConfig::default()
            },
            logger: Logger::new(false),
            status: String::new(),
            should_quit: false,
            pending: None,
            stale: OpPane::default(),
            folders: OpPane::default(),
            orphans: OpPane::default(),
            version_cache: VersionCache::new(),
            inflight: HashSet::new(),
            root_override: false,
            trash_warned: false,
            worker_tx,
            worker_rx,
        }
    }

    #[test]
    fn scan_refused_without_versions() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with_root(dir.path());
        assert!(app.scan_stale_sync().is_err());
    }

    #[test]
    fn scan_delete_rescan_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let retail = dir.path().join("_retail_");
        fs::create_dir_all(retail.join("Interface/AddOns")).unwrap();
        fs::create_dir_all(retail.join("WTF")).unwrap();
        fs::write(retail.join("WTF/Config.wtf.bak"), b"x").unwrap();

        let mut app = app_with_root(dir.path());
        let groups = app.scan_stale_sync().unwrap();
        assert_eq!(groups.len(), 1);

        let paths: Vec<PathBuf> = groups[0].items.iter().map(|item| item.path.clone()).collect();
        let outcome = app.delete_paths(OpKind::Stale, &paths);
        assert_eq!(outcome.processed, 1);
        assert!(outcome.permanent);

        assert!(app.scan_stale_sync().unwrap().is_empty());
    }

    #[test]
    fn inflight_guard_serializes_same_operation() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("_retail_")).unwrap();
        let mut app = app_with_root(dir.path());

        let guard = app.take_guard(OpKind::Stale).unwrap();
        assert!(app.take_guard(OpKind::Stale).is_err());
        assert!(app.take_guard(OpKind::Folders).is_ok());
        app.release_guard(guard);
        assert!(app.take_guard(OpKind::Stale).is_ok());
    }

    #[test]
    fn cancellation_is_first_class() {
        let dir = tempfile::tempdir().unwrap();
        let retail = dir.path().join("_retail_");
        fs::create_dir_all(retail.join("Interface/AddOns")).unwrap();
        fs::create_dir_all(retail.join("WTF")).unwrap();
        fs::write(retail.join("old.bak"), b"x").unwrap();

        let mut app = app_with_root(dir.path());
        let groups = app.scan_stale_sync().unwrap();
        app.stale.groups = groups;
        app.stale.groups[0].items[0].selected = true;
        app.request_delete(OpKind::Stale);
        assert!(app.pending.is_some());

        app.cancel_pending();
        assert!(app.pending.is_none());
        assert!(retail.join("old.bak").exists());
    }
}
