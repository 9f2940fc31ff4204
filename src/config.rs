use crate::{deleter::DeleteMode, hardware::HardwareProfile};
use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub hide_trash_warning: bool,
    #[serde(default)]
    pub last_export_append: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            theme: default_theme(),
            language: default_language(),
            hide_trash_warning: false,
            last_export_append: false,
        }
    }
}

impl UiConfig {
    pub fn load_or_create() -> Self {
        load_store("ui.json").unwrap_or_default()
    }

    pub fn save(&self) {
        let _ = save_store("ui.json", self);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub install_root: Option<PathBuf>,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub delete_mode: DeleteMode,
    #[serde(default = "default_true")]
    pub check_updates: bool,
    #[serde(default)]
    pub hardware: Option<HardwareProfile>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            install_root: None,
            verbose: false,
            delete_mode: DeleteMode::default(),
            check_updates: true,
            hardware: None,
        }
    }
}

impl GlobalConfig {
    pub fn load_or_create() -> Self {
        load_store("global.json").unwrap_or_default()
    }

    pub fn save(&self) {
        let _ = save_store("global.json", self);
    }
}

fn load_store<T: serde::de::DeserializeOwned>(name: &str) -> Option<T> {
    let path = base_data_dir().ok()?.join(name);
    let raw = fs::read_to_string(path).ok()?;
    serde_json::from_str(&raw).ok()
}

fn save_store<T: Serialize>(name: &str, value: &T) -> Result<()> {
    let dir = base_data_dir()?;
    fs::create_dir_all(&dir).context("create app data dir")?;
    let raw = serde_json::to_string_pretty(value).context("serialize settings")?;
    write_atomic(&dir.join(name), raw.as_bytes())
}

pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = match path.file_name() {
        Some(name) => {
            let mut tmp_name = name.to_os_string();
            tmp_name.push(".tmp");
            path.with_file_name(tmp_name)
        }
        None => anyhow::bail!("invalid target path: {}", path.display()),
    };
    fs::write(&tmp, bytes).with_context(|| format!("write {}", tmp.display()))?;
    if let Err(err) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(err).with_context(|| format!("replace {}", path.display()));
    }
    Ok(())
}

fn base_data_dir() -> Result<PathBuf> {
    let base = BaseDirs::new().context("resolve home dir")?;
    Ok(base.data_local_dir().join("runekeeper"))
}

pub fn default_log_path() -> Option<PathBuf> {
    let dir = base_data_dir().ok()?;
    fs::create_dir_all(&dir).ok()?;
    Some(dir.join("runekeeper.log"))
}

fn default_theme() -> String {
    "dark".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_atomic_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("global.json");
        write_atomic(&path, b"one").unwrap();
        write_atomic(&path, b"two").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "two");
        assert!(!path.with_file_name("global.json.tmp").exists());
    }

    #[test]
    fn global_config_defaults_are_safe() {
        let config: GlobalConfig = serde_json::from_str("{}").unwrap();
        assert!(config.install_root.is_none());
        assert!(!config.verbose);
        assert!(config.check_updates);
        assert_eq!(config.delete_mode, DeleteMode::Trash);
    }
}
