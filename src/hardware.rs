use crate::{
    wow::Version,
    wtf::Preset,
};
use serde::{Deserialize, Serialize};
use std::{
    process::{Command, Stdio},
    sync::mpsc,
    thread,
    time::Duration,
};
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};

const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);
const GPU_NOT_DETECTED: &str = "Not detected";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareProfile {
    pub cpu_name: String,
    pub cpu_cores: usize,
    pub cpu_threads: usize,
    pub ram_gb: f64,
    pub gpus: Vec<String>,
}

pub fn probe() -> HardwareProfile {
    let sys = System::new_with_specifics(
        RefreshKind::new()
            .with_cpu(CpuRefreshKind::everything())
            .with_memory(MemoryRefreshKind::everything()),
    );

    let cpu_name = sys
        .cpus()
        .first()
        .map(|cpu| cpu.brand().trim().to_string())
        .filter(|name| !name.is_empty())
        .or_else(cpu_name_fallback)
        .unwrap_or_else(|| "Unknown CPU".to_string());

    let cpu_threads = sys.cpus().len();
    let cpu_cores = sys.physical_core_count().unwrap_or(cpu_threads);

    let ram_gb = round_gib(sys.total_memory());

    let mut gpus = dedup_preserving_order(probe_gpus(&cpu_name));
    if gpus.is_empty() {
        gpus.push(GPU_NOT_DETECTED.to_string());
    }

    HardwareProfile {
        cpu_name,
        cpu_cores,
        cpu_threads,
        ram_gb,
        gpus,
    }
}

fn round_gib(bytes: u64) -> f64 {
    let gib = bytes as f64 / (1024.0 * 1024.0 * 1024.0);
    (gib * 10.0).round() / 10.0
}

fn dedup_preserving_order(names: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    names
        .into_iter()
        .filter(|name| seen.insert(name.to_lowercase()))
        .collect()
}

fn cpu_name_fallback() -> Option<String> {
    if cfg!(windows) {
        if let Some(out) = run_command("wmic", &["cpu", "get", "name"]) {
            if let Some(name) = wmic_value(&out) {
                return Some(name);
            }
        }
        return run_command(
            "powershell",
            &["-NoProfile", "-Command", "(Get-CimInstance Win32_Processor).Name"],
        )
        .map(|out| out.trim().to_string())
        .filter(|name| !name.is_empty());
    }
    if cfg!(target_os = "macos") {
        return run_command("sysctl", &["-n", "machdep.cpu.brand_string"])
            .map(|out| out.trim().to_string())
            .filter(|name| !name.is_empty());
    }
    if let Ok(cpuinfo) = std::fs::read_to_string("/proc/cpuinfo") {
        for line in cpuinfo.lines() {
            if let Some(value) = line.strip_prefix("model name") {
                if let Some((_, name)) = value.split_once(':') {
                    let name = name.trim();
                    if !name.is_empty() {
                        return Some(name.to_string());
                    }
                }
            }
        }
    }
    run_command("lscpu", &[]).and_then(|out| {
        out.lines().find_map(|line| {
            line.strip_prefix("Model name:")
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
        })
    })
}

fn probe_gpus(cpu_name: &str) -> Vec<String> {
    if cfg!(windows) {
        if let Some(out) = run_command("wmic", &["path", "win32_videocontroller", "get", "name"]) {
            let names = wmic_values(&out);
            if !names.is_empty() {
                return names;
            }
        }
        return run_command(
            "powershell",
            &[
                "-NoProfile",
                "-Command",
                "(Get-CimInstance Win32_VideoController).Name",
            ],
        )
        .map(|out| {
            out.lines()
                .map(|line| line.trim().to_string())
                .filter(|line| !line.is_empty())
                .collect()
        })
        .unwrap_or_default();
    }
    if cfg!(target_os = "macos") {
        let mut names: Vec<String> =
            run_command("/usr/sbin/system_profiler", &["SPDisplaysDataType"])
                .map(|out| {
                    out.lines()
                        .filter_map(|line| line.trim().strip_prefix("Chipset Model:"))
                        .map(|name| name.trim().to_string())
                        .filter(|name| !name.is_empty())
                        .collect()
                })
                .unwrap_or_default();
        // Apple Silicon reports the SoC as the adapter.
        if names.is_empty() && cpu_name.to_lowercase().contains("apple") {
            names.push(cpu_name.to_string());
        }
        return names;
    }
    run_command("lspci", &[])
        .map(|out| {
            out.lines()
                .filter(|line| {
                    let lower = line.to_lowercase();
                    lower.contains("vga compatible controller")
                        || lower.contains("3d controller")
                        || lower.contains("display controller")
                })
                .filter_map(|line| line.rsplit_once(": ").map(|(_, name)| name.trim().to_string()))
                .filter(|name| !name.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn wmic_value(out: &str) -> Option<String> {
    wmic_values(out).into_iter().next()
}

fn wmic_values(out: &str) -> Vec<String> {
    out.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.eq_ignore_ascii_case("name"))
        .map(|line| line.to_string())
        .collect()
}

fn run_command(program: &str, args: &[&str]) -> Option<String> {
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .ok()?;

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(child.wait_with_output());
    });
    match rx.recv_timeout(COMMAND_TIMEOUT) {
        Ok(Ok(output)) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).into_owned())
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Adapter selection

const INTEGRATED_INTEL: &[&str] = &[
    "intel hd graphics",
    "intel uhd graphics",
    "iris",
    "intel xe graphics",
];
const INTEGRATED_AMD: &[&str] = &["amd radeon graphics", "amd vega", "amd radeon(tm) graphics"];
const AMD_DISCRETE_MARKS: &[&str] = &["rx", "r9", "r7", "r5"];

pub fn is_integrated_gpu(name: &str) -> bool {
    let lower = name.to_lowercase();
    if INTEGRATED_INTEL.iter().any(|mark| lower.contains(mark)) {
        return true;
    }
    if INTEGRATED_AMD.iter().any(|mark| lower.contains(mark)) {
        return !AMD_DISCRETE_MARKS.iter().any(|mark| lower.contains(mark));
    }
    false
}

pub fn is_apple_silicon(cpu_name: &str) -> bool {
    cpu_name.to_lowercase().contains("apple")
}

// Index (in original list order) of the first discrete GPU, when the machine
// mixes integrated and discrete adapters. Apple Silicon never gets pinned.
pub fn select_adapter_index(hw: &HardwareProfile) -> Option<usize> {
    if hw.gpus.len() < 2 || is_apple_silicon(&hw.cpu_name) {
        return None;
    }
    let integrated: Vec<bool> = hw.gpus.iter().map(|gpu| is_integrated_gpu(gpu)).collect();
    if !integrated.iter().any(|flag| *flag) {
        return None;
    }
    integrated.iter().position(|flag| !*flag)
}

// ---------------------------------------------------------------------------
// Tier classification

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tier {
    Below,
    Min,
    Rec,
}

impl Tier {
    pub fn label(self) -> &'static str {
        match self {
            Tier::Below => "below",
            Tier::Min => "min",
            Tier::Rec => "rec",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameProfile {
    Retail,
    Classic,
}

impl GameProfile {
    pub fn for_version(version: &Version) -> Self {
        if version.flavor.is_classic_family() {
            GameProfile::Classic
        } else {
            GameProfile::Retail
        }
    }
}

struct GpuTierTable {
    rec: &'static [&'static str],
    min: &'static [&'static str],
}

struct ProfileThresholds {
    ram_min: f64,
    ram_rec: f64,
    cores_min: usize,
    threads_min: usize,
    cores_rec: usize,
    threads_rec: usize,
    gpu: GpuTierTable,
}

const RETAIL_THRESHOLDS: ProfileThresholds = ProfileThresholds {
    ram_min: 8.0,
    ram_rec: 16.0,
    cores_min: 4,
    threads_min: 8,
    cores_rec: 6,
    threads_rec: 12,
    gpu: GpuTierTable {
        rec: &[
            "rtx 20", "rtx 30", "rtx 40", "rtx 50", "rx 6", "rx 7", "rx 9", "arc a7", "arc b",
            "apple m",
        ],
        min: &[
            "gtx 9", "gtx 10", "gtx 16", "rx 4", "rx 5", "vega", "radeon rx", "intel uhd",
            "intel hd", "iris", "intel xe", "radeon graphics", "geforce mx", "quadro",
        ],
    },
};

const CLASSIC_THRESHOLDS: ProfileThresholds = ProfileThresholds {
    ram_min: 4.0,
    ram_rec: 8.0,
    cores_min: 2,
    threads_min: 4,
    cores_rec: 4,
    threads_rec: 8,
    gpu: GpuTierTable {
        rec: &[
            "rtx", "rx 5", "rx 6", "rx 7", "rx 9", "gtx 16", "gtx 10", "arc a", "arc b", "apple m",
        ],
        min: &[
            "gtx", "gt ", "geforce", "radeon", "vega", "intel hd", "intel uhd", "iris",
            "intel xe", "quadro", "firepro",
        ],
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierBreakdown {
    pub ram: Tier,
    pub cpu: Tier,
    pub gpu: Tier,
    pub overall: Tier,
}

pub fn classify(hw: &HardwareProfile, profile: GameProfile) -> TierBreakdown {
    let thresholds = match profile {
        GameProfile::Retail => &RETAIL_THRESHOLDS,
        GameProfile::Classic => &CLASSIC_THRESHOLDS,
    };

    let ram = if hw.ram_gb >= thresholds.ram_rec {
        Tier::Rec
    } else if hw.ram_gb >= thresholds.ram_min {
        Tier::Min
    } else {
        Tier::Below
    };

    let cpu = if hw.cpu_cores >= thresholds.cores_rec && hw.cpu_threads >= thresholds.threads_rec {
        Tier::Rec
    } else if hw.cpu_cores >= thresholds.cores_min && hw.cpu_threads >= thresholds.threads_min {
        Tier::Min
    } else {
        Tier::Below
    };

    let joined = hw.gpus.join("; ").to_lowercase();
    let gpu = if thresholds.gpu.rec.iter().any(|mark| joined.contains(mark)) {
        Tier::Rec
    } else if thresholds.gpu.min.iter().any(|mark| joined.contains(mark)) {
        Tier::Min
    } else {
        Tier::Below
    };

    TierBreakdown {
        ram,
        cpu,
        gpu,
        overall: ram.min(cpu).min(gpu),
    }
}

pub fn suggested_preset(tier: Tier) -> Preset {
    match tier {
        Tier::Below => Preset::Low,
        Tier::Min => Preset::Medium,
        Tier::Rec => Preset::High,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(ram: f64, cores: usize, threads: usize, gpus: &[&str]) -> HardwareProfile {
        HardwareProfile {
            cpu_name: "Intel Core i7".to_string(),
            cpu_cores: cores,
            cpu_threads: threads,
            ram_gb: ram,
            gpus: gpus.iter().map(|name| name.to_string()).collect(),
        }
    }

    #[test]
    fn probe_never_panics_and_fills_every_field() {
        let hw = probe();
        assert!(!hw.cpu_name.is_empty());
        assert!(!hw.gpus.is_empty());
    }

    #[test]
    fn rtx_3070_rig_classifies_rec_for_retail() {
        let hw = profile(16.0, 6, 12, &["NVIDIA GeForce RTX 3070"]);
        let tiers = classify(&hw, GameProfile::Retail);
        assert_eq!(tiers.overall, Tier::Rec);
        assert_eq!(suggested_preset(tiers.overall), Preset::High);
    }

    #[test]
    fn overall_tier_is_the_weakest_dimension() {
        let hw = profile(4.0, 6, 12, &["NVIDIA GeForce RTX 3070"]);
        let tiers = classify(&hw, GameProfile::Retail);
        assert_eq!(tiers.ram, Tier::Below);
        assert_eq!(tiers.overall, Tier::Below);
    }

    #[test]
    fn missing_probe_dimensions_classify_below() {
        let hw = profile(0.0, 0, 0, &["Not detected"]);
        let tiers = classify(&hw, GameProfile::Retail);
        assert_eq!(tiers.overall, Tier::Below);
        assert_eq!(suggested_preset(tiers.overall), Preset::Low);
    }

    #[test]
    fn classic_profile_has_lower_bars() {
        let hw = profile(8.0, 4, 8, &["NVIDIA GeForce GTX 1060"]);
        assert_eq!(classify(&hw, GameProfile::Classic).overall, Tier::Rec);
        assert_eq!(classify(&hw, GameProfile::Retail).overall, Tier::Min);
    }

    #[test]
    fn tier_mapping_is_monotone_in_ram() {
        for (cores, threads, gpu) in [(2, 4, "GeForce GT 710"), (6, 12, "RTX 3070")] {
            let mut last = Tier::Below;
            for ram in [2.0, 8.0, 16.0] {
                let tiers = classify(&profile(ram, cores, threads, &[gpu]), GameProfile::Retail);
                assert!(tiers.overall >= last, "ram {ram} lowered the tier");
                last = tiers.overall;
            }
        }
    }

    #[test]
    fn integrated_detection_respects_amd_discrete_marks() {
        assert!(is_integrated_gpu("Intel UHD Graphics 630"));
        assert!(is_integrated_gpu("Intel Iris Xe Graphics"));
        assert!(is_integrated_gpu("AMD Radeon Graphics"));
        assert!(is_integrated_gpu("AMD Radeon(TM) Graphics"));
        assert!(!is_integrated_gpu("AMD Radeon RX 6700 XT"));
        assert!(!is_integrated_gpu("NVIDIA GeForce RTX 3060"));
    }

    #[test]
    fn adapter_pick_is_first_discrete_gpu() {
        let hw = profile(
            16.0,
            8,
            16,
            &["Intel UHD Graphics 630", "NVIDIA GeForce RTX 3060"],
        );
        assert_eq!(select_adapter_index(&hw), Some(1));

        let reversed = profile(
            16.0,
            8,
            16,
            &["NVIDIA GeForce RTX 3060", "Intel UHD Graphics 630"],
        );
        assert_eq!(select_adapter_index(&reversed), Some(0));
    }

    #[test]
    fn adapter_pick_declines_without_a_mix() {
        let single = profile(16.0, 8, 16, &["NVIDIA GeForce RTX 3060"]);
        assert_eq!(select_adapter_index(&single), None);

        let all_discrete = profile(
            16.0,
            8,
            16,
            &["NVIDIA GeForce RTX 3060", "NVIDIA GeForce RTX 3070"],
        );
        assert_eq!(select_adapter_index(&all_discrete), None);

        let mut apple = profile(16.0, 8, 8, &["Intel UHD Graphics", "AMD Radeon Pro 5500M"]);
        apple.cpu_name = "Apple M2 Pro".to_string();
        assert_eq!(select_adapter_index(&apple), None);
    }
}
