use crate::{
    errors::ApplyError,
    hardware::{self, HardwareProfile},
    logger::Logger,
    wow::{SubPath, Version},
};
use std::{fs, path::PathBuf};

#[cfg(windows)]
const LINE_ENDING: &str = "\r\n";
#[cfg(not(windows))]
const LINE_ENDING: &str = "\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preset {
    Low,
    Medium,
    High,
    Ultra,
}

impl Preset {
    pub fn label(self) -> &'static str {
        match self {
            Preset::Low => "Low",
            Preset::Medium => "Medium",
            Preset::High => "High",
            Preset::Ultra => "Ultra",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "low" => Some(Preset::Low),
            "medium" => Some(Preset::Medium),
            "high" => Some(Preset::High),
            "ultra" => Some(Preset::Ultra),
            _ => None,
        }
    }

    pub fn assignments(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Preset::Low => &[
                ("renderScale", "0.8"),
                ("graphicsTextureResolution", "1"),
                ("graphicsShadowQuality", "1"),
                ("graphicsSSAO", "0"),
                ("MSAAQuality", "0"),
                ("gxVSync", "0"),
                ("graphicsViewDistance", "3"),
                ("graphicsEnvironmentDetail", "3"),
            ],
            Preset::Medium => &[
                ("renderScale", "1.0"),
                ("graphicsTextureResolution", "2"),
                ("graphicsShadowQuality", "2"),
                ("graphicsSSAO", "1"),
                ("MSAAQuality", "0"),
                ("gxVSync", "0"),
                ("graphicsViewDistance", "5"),
                ("graphicsEnvironmentDetail", "5"),
            ],
            Preset::High => &[
                ("renderScale", "1.0"),
                ("graphicsTextureResolution", "3"),
                ("graphicsShadowQuality", "3"),
                ("graphicsSSAO", "2"),
                ("MSAAQuality", "2"),
                ("gxVSync", "0"),
                ("graphicsViewDistance", "7"),
                ("graphicsEnvironmentDetail", "7"),
            ],
            Preset::Ultra => &[
                ("renderScale", "1.0"),
                ("graphicsTextureResolution", "3"),
                ("graphicsShadowQuality", "4"),
                ("graphicsSSAO", "3"),
                ("MSAAQuality", "4"),
                ("gxVSync", "0"),
                ("graphicsViewDistance", "10"),
                ("graphicsEnvironmentDetail", "10"),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WtfLine {
    Assign { key: String, value: String },
    Verbatim(String),
}

#[derive(Debug, Clone, Default)]
pub struct WtfConfig {
    pub lines: Vec<WtfLine>,
    trailing_newline: bool,
}

impl WtfConfig {
    pub fn parse(raw: &str) -> Self {
        let trailing_newline = raw.is_empty() || raw.ends_with('\n');
        let mut lines: Vec<WtfLine> = Vec::new();
        for line in raw.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            match parse_assignment(line) {
                Some((key, value)) => lines.push(WtfLine::Assign { key, value }),
                None => lines.push(WtfLine::Verbatim(line.to_string())),
            }
        }
        if trailing_newline {
            // split leaves one empty piece after the final newline
            lines.pop();
        }

        // Duplicate keys keep the last occurrence, at its own position.
        let mut keep = vec![true; lines.len()];
        for (idx, line) in lines.iter().enumerate() {
            if let WtfLine::Assign { key, .. } = line {
                for later in lines.iter().skip(idx + 1) {
                    if matches!(later, WtfLine::Assign { key: other, .. } if other == key) {
                        keep[idx] = false;
                        break;
                    }
                }
            }
        }
        let mut kept = Vec::with_capacity(lines.len());
        for (idx, line) in lines.into_iter().enumerate() {
            if keep[idx] {
                kept.push(line);
            }
        }

        Self {
            lines: kept,
            trailing_newline,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines.iter().find_map(|line| match line {
            WtfLine::Assign { key: k, value } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    pub fn assignments(&self) -> impl Iterator<Item = (&str, &str)> {
        self.lines.iter().filter_map(|line| match line {
            WtfLine::Assign { key, value } => Some((key.as_str(), value.as_str())),
            WtfLine::Verbatim(_) => None,
        })
    }

    // Existing keys are overwritten in place; new keys append in the given
    // order. Returns (overwritten, appended).
    pub fn merge(&mut self, assignments: &[(&str, &str)]) -> (usize, usize) {
        let mut overwritten = 0;
        let mut appended = 0;
        for (key, value) in assignments {
            let existing = self.lines.iter_mut().find_map(|line| match line {
                WtfLine::Assign { key: k, value } if k.as_str() == *key => Some(value),
                _ => None,
            });
            match existing {
                Some(slot) => {
                    if slot.as_str() != *value {
                        *slot = value.to_string();
                    }
                    overwritten += 1;
                }
                None => {
                    self.lines.push(WtfLine::Assign {
                        key: key.to_string(),
                        value: value.to_string(),
                    });
                    appended += 1;
                    self.trailing_newline = true;
                }
            }
        }
        (overwritten, appended)
    }

    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for (idx, line) in self.lines.iter().enumerate() {
            if idx > 0 {
                out.push_str(LINE_ENDING);
            }
            match line {
                WtfLine::Assign { key, value } => {
                    out.push_str("SET ");
                    out.push_str(key);
                    out.push_str(" \"");
                    out.push_str(value);
                    out.push('"');
                }
                WtfLine::Verbatim(text) => out.push_str(text),
            }
        }
        if self.trailing_newline && !self.lines.is_empty() {
            out.push_str(LINE_ENDING);
        }
        out
    }
}

// SET <key> "<value>", key an ASCII identifier, value quote-free text,
// optional trailing whitespace. Anything else is preserved verbatim.
fn parse_assignment(line: &str) -> Option<(String, String)> {
    let rest = line.strip_prefix("SET")?;
    if !rest.starts_with(|c: char| c.is_ascii_whitespace()) {
        return None;
    }
    let rest = rest.trim_start();

    let key_end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    let key = &rest[..key_end];
    let first = key.chars().next()?;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return None;
    }

    let rest = &rest[key_end..];
    if !rest.starts_with(|c: char| c.is_ascii_whitespace()) {
        return None;
    }
    let rest = rest.trim_start().strip_prefix('"')?;
    let close = rest.find('"')?;
    if !rest[close + 1..].trim().is_empty() {
        return None;
    }
    Some((key.to_string(), rest[..close].to_string()))
}

#[derive(Debug, Clone)]
pub struct PresetOutcome {
    pub path: PathBuf,
    pub keys_applied: usize,
    pub backup: Option<PathBuf>,
}

pub fn read(version: &Version) -> WtfConfig {
    let path = version.subpath(SubPath::ConfigWtf);
    match fs::read(&path) {
        Ok(bytes) => WtfConfig::parse(&String::from_utf8_lossy(&bytes)),
        Err(_) => WtfConfig::default(),
    }
}

pub fn apply_preset(
    version: &Version,
    preset: Preset,
    hardware: Option<&HardwareProfile>,
    logger: &mut Logger,
) -> Result<PresetOutcome, ApplyError> {
    let wtf_dir = version.subpath(SubPath::Wtf);
    if !wtf_dir.is_dir() {
        return Err(ApplyError::LaunchRequired { path: wtf_dir });
    }

    let path = version.subpath(SubPath::ConfigWtf);
    let mut config = WtfConfig::default();
    let exists = path.is_file();
    if exists {
        let meta = fs::metadata(&path).map_err(|err| ApplyError::WriteFailed {
            path: path.clone(),
            reason: err.to_string(),
        })?;
        if meta.permissions().readonly() {
            return Err(ApplyError::PermissionDenied { path });
        }
        let bytes = fs::read(&path).map_err(|err| ApplyError::WriteFailed {
            path: path.clone(),
            reason: err.to_string(),
        })?;
        config = WtfConfig::parse(&String::from_utf8_lossy(&bytes));
    }

    config.merge(preset.assignments());

    if let Some(hw) = hardware {
        if let Some(index) = hardware::select_adapter_index(hw) {
            let value = index.to_string();
            config.merge(&[("gxAdapter", value.as_str())]);
            logger.debug(format!(
                "Pinned gxAdapter={value} ({})",
                hw.gpus.get(index).map(String::as_str).unwrap_or("?")
            ));
        }
    }

    let backup = if exists {
        let backup_path = path.with_file_name("Config.wtf.bak");
        fs::copy(&path, &backup_path).map_err(|err| ApplyError::BackupFailed {
            path: path.clone(),
            reason: err.to_string(),
        })?;
        Some(backup_path)
    } else {
        None
    };

    let serialized = config.serialize();
    let tmp = path.with_file_name("Config.wtf.tmp");
    if let Err(err) = fs::write(&tmp, serialized.as_bytes()) {
        return Err(ApplyError::WriteFailed {
            path: tmp,
            reason: err.to_string(),
        });
    }
    if let Err(err) = fs::rename(&tmp, &path) {
        let _ = fs::remove_file(&tmp);
        return Err(ApplyError::WriteFailed {
            path,
            reason: err.to_string(),
        });
    }

    logger.info(format!(
        "Applied {} preset to {}",
        preset.label(),
        path.display()
    ));
    Ok(PresetOutcome {
        path,
        keys_applied: preset.assignments().len(),
        backup,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wow;
    use std::fs;

    fn retail_fixture() -> (tempfile::TempDir, Version) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("_retail_/WTF")).unwrap();
        fs::create_dir_all(dir.path().join("_retail_/Interface/AddOns")).unwrap();
        let version = wow::versions(dir.path()).remove(0);
        (dir, version)
    }

    #[test]
    fn comments_and_blanks_round_trip() {
        let raw = "# comment\n\nnot an assignment\n";
        let config = WtfConfig::parse(raw);
        assert_eq!(config.serialize(), raw);

        let no_trailing = "# comment";
        assert_eq!(WtfConfig::parse(no_trailing).serialize(), no_trailing);
    }

    #[test]
    fn assignment_grammar_is_strict() {
        assert!(parse_assignment("SET renderScale \"1.0\"").is_some());
        assert!(parse_assignment("SET   renderScale   \"1.0\"  ").is_some());
        assert!(parse_assignment("SETrenderScale \"1.0\"").is_none());
        assert!(parse_assignment("SET 9key \"1.0\"").is_none());
        assert!(parse_assignment("SET renderScale 1.0").is_none());
        assert!(parse_assignment("SET renderScale \"1.0\" extra").is_none());
        assert_eq!(
            parse_assignment("SET gxApi \"d3d12\""),
            Some(("gxApi".to_string(), "d3d12".to_string()))
        );
    }

    #[test]
    fn duplicate_keys_keep_last_occurrence() {
        let config = WtfConfig::parse("SET a \"1\"\nSET b \"2\"\nSET a \"3\"\n");
        let pairs: Vec<(&str, &str)> = config.assignments().collect();
        assert_eq!(pairs, [("b", "2"), ("a", "3")]);
    }

    #[test]
    fn apply_preset_overlays_and_appends_in_order() {
        let (_dir, version) = retail_fixture();
        let path = version.subpath(SubPath::ConfigWtf);
        fs::write(&path, "SET renderScale \"0.7\"\nSET gxApi \"d3d12\"\n").unwrap();

        let mut logger = Logger::new(false);
        let outcome = apply_preset(&version, Preset::High, None, &mut logger).unwrap();
        assert_eq!(outcome.keys_applied, 8);

        let raw = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines[0], "SET renderScale \"1.0\"");
        assert_eq!(lines[1], "SET gxApi \"d3d12\"");
        assert_eq!(lines[2], "SET graphicsTextureResolution \"3\"");
        assert_eq!(lines.last().unwrap(), &"SET graphicsEnvironmentDetail \"7\"");

        let backup = fs::read_to_string(outcome.backup.unwrap()).unwrap();
        assert_eq!(backup, "SET renderScale \"0.7\"\nSET gxApi \"d3d12\"\n");
    }

    #[test]
    fn apply_preset_is_idempotent() {
        let (_dir, version) = retail_fixture();
        let path = version.subpath(SubPath::ConfigWtf);
        fs::write(&path, "SET gxApi \"d3d12\"\n").unwrap();

        let mut logger = Logger::new(false);
        apply_preset(&version, Preset::Ultra, None, &mut logger).unwrap();
        let first = fs::read(&path).unwrap();
        apply_preset(&version, Preset::Ultra, None, &mut logger).unwrap();
        let second = fs::read(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn preset_keys_land_and_others_survive() {
        let (_dir, version) = retail_fixture();
        let path = version.subpath(SubPath::ConfigWtf);
        fs::write(&path, "SET accounttype \"LK\"\nSET gxVSync \"1\"\n").unwrap();

        let mut logger = Logger::new(false);
        apply_preset(&version, Preset::Medium, None, &mut logger).unwrap();

        let config = read(&version);
        for (key, value) in Preset::Medium.assignments() {
            assert_eq!(config.get(key), Some(*value), "key {key}");
        }
        assert_eq!(config.get("accounttype"), Some("LK"));
    }

    #[test]
    fn missing_wtf_dir_is_launch_required() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("_retail_/Interface/AddOns")).unwrap();
        let version = wow::versions(dir.path()).remove(0);

        let mut logger = Logger::new(false);
        let err = apply_preset(&version, Preset::Low, None, &mut logger).unwrap_err();
        assert!(matches!(err, ApplyError::LaunchRequired { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn readonly_config_is_permission_denied() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, version) = retail_fixture();
        let path = version.subpath(SubPath::ConfigWtf);
        fs::write(&path, "SET gxApi \"d3d12\"\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o444)).unwrap();

        let mut logger = Logger::new(false);
        let err = apply_preset(&version, Preset::Low, None, &mut logger).unwrap_err();
        assert!(matches!(err, ApplyError::PermissionDenied { .. }));
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "SET gxApi \"d3d12\"\n"
        );
    }

    #[test]
    fn adapter_pin_lands_when_hardware_mixes_gpus() {
        let (_dir, version) = retail_fixture();
        let path = version.subpath(SubPath::ConfigWtf);
        fs::write(&path, "SET gxApi \"d3d12\"\n").unwrap();

        let hw = HardwareProfile {
            cpu_name: "Intel Core i7-10700K".to_string(),
            cpu_cores: 8,
            cpu_threads: 16,
            ram_gb: 32.0,
            gpus: vec![
                "Intel UHD Graphics 630".to_string(),
                "NVIDIA GeForce RTX 3060".to_string(),
            ],
        };
        let mut logger = Logger::new(false);
        apply_preset(&version, Preset::High, Some(&hw), &mut logger).unwrap();
        assert_eq!(read(&version).get("gxAdapter"), Some("1"));
    }
}
