use crate::{
    app::{App, CandidateGroup, OpKind},
    deleter::DeleteMode,
    hardware::{self, GameProfile},
    logger::ExportMode,
    orphans::AddonInventory,
    ui, update,
    wow::Version,
    wtf::Preset,
};
use anyhow::{bail, Result};
use std::{
    io::{self, Write},
    path::PathBuf,
};

#[derive(Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "json" => Some(OutputFormat::Json),
            "text" => Some(OutputFormat::Text),
            _ => None,
        }
    }
}

struct GlobalOptions {
    format: OutputFormat,
    root: Option<PathBuf>,
    override_root: bool,
    assume_yes: bool,
    delete_mode: Option<DeleteMode>,
}

enum CliCommand {
    Ui,
    Versions,
    ScanStale,
    CleanStale,
    Folders,
    CleanFolders,
    Orphans { delete: bool, rebuild: bool },
    Preset { choice: PresetChoice, version: Option<String> },
    Hardware { refresh: bool },
    ExportLog { path: PathBuf, append: bool },
    CheckUpdate,
    Help,
    Version,
}

enum PresetChoice {
    Auto,
    Fixed(Preset),
}

pub fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (command, options) = parse_args(&args)?;

    match command {
        CliCommand::Help => {
            print_help();
            return Ok(());
        }
        CliCommand::Version => {
            println!("RuneKeeper v{}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    let mut app = App::initialize()?;
    if let Some(root) = options.root.clone() {
        app.set_root(root, options.override_root)?;
    }
    if let Some(mode) = options.delete_mode {
        app.set_delete_mode(mode);
    }

    match command {
        CliCommand::Ui => ui::run(&mut app),
        CliCommand::Versions => cmd_versions(&mut app, options.format),
        CliCommand::ScanStale => {
            let groups = app.scan_stale_sync()?;
            print_groups(&groups, options.format);
            Ok(())
        }
        CliCommand::CleanStale => cmd_clean(&mut app, OpKind::Stale, &options),
        CliCommand::Folders => {
            let groups = app.scan_folders_sync()?;
            print_groups(&groups, options.format);
            Ok(())
        }
        CliCommand::CleanFolders => cmd_clean(&mut app, OpKind::Folders, &options),
        CliCommand::Orphans { delete, rebuild } => cmd_orphans(&mut app, delete, rebuild, &options),
        CliCommand::Preset { choice, version } => cmd_preset(&mut app, choice, version, &options),
        CliCommand::Hardware { refresh } => cmd_hardware(&mut app, refresh, options.format),
        CliCommand::ExportLog { path, append } => {
            let mode = if append {
                ExportMode::Append
            } else {
                ExportMode::Fresh
            };
            app.export_log(&path, mode)
        }
        CliCommand::CheckUpdate => cmd_check_update(options.format),
        CliCommand::Help | CliCommand::Version => unreachable!(),
    }
}

fn parse_args(args: &[String]) -> Result<(CliCommand, GlobalOptions)> {
    let mut options = GlobalOptions {
        format: OutputFormat::Text,
        root: None,
        override_root: false,
        assume_yes: false,
        delete_mode: None,
    };
    let mut positional: Vec<String> = Vec::new();
    let mut delete = false;
    let mut rebuild = false;
    let mut refresh = false;
    let mut append = false;
    let mut version_filter: Option<String> = None;

    let mut iter = args.iter().peekable();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--format" => {
                let value = iter.next().map(String::as_str).unwrap_or("");
                options.format = OutputFormat::parse(value)
                    .ok_or_else(|| anyhow::anyhow!("unknown format: {value}"))?;
            }
            "--root" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--root requires a path"))?;
                options.root = Some(PathBuf::from(value));
            }
            "--override-root" => options.override_root = true,
            "--yes" | "-y" => options.assume_yes = true,
            "--permanent" => options.delete_mode = Some(DeleteMode::Permanent),
            "--trash" => options.delete_mode = Some(DeleteMode::Trash),
            "--delete" => delete = true,
            "--rebuild-manifest" => rebuild = true,
            "--refresh" => refresh = true,
            "--append" => append = true,
            "--version" if !positional.is_empty() && positional[0] == "preset" => {
                version_filter = iter.next().cloned();
            }
            "--help" | "-h" => positional = vec!["help".to_string()],
            "--version" | "-V" => positional = vec!["version".to_string()],
            other if other.starts_with('-') => bail!("unknown option: {other}"),
            other => positional.push(other.to_string()),
        }
    }

    let command = match positional.first().map(String::as_str) {
        None => CliCommand::Ui,
        Some("versions") => CliCommand::Versions,
        Some("scan-stale") => CliCommand::ScanStale,
        Some("clean-stale") => CliCommand::CleanStale,
        Some("folders") => CliCommand::Folders,
        Some("clean-folders") => CliCommand::CleanFolders,
        Some("orphans") => CliCommand::Orphans { delete, rebuild },
        Some("preset") => {
            let choice = match positional.get(1).map(String::as_str) {
                Some("auto") | None => PresetChoice::Auto,
                Some(raw) => PresetChoice::Fixed(
                    Preset::parse(raw).ok_or_else(|| anyhow::anyhow!("unknown preset: {raw}"))?,
                ),
            };
            CliCommand::Preset {
                choice,
                version: version_filter,
            }
        }
        Some("hardware") => CliCommand::Hardware { refresh },
        Some("export-log") => {
            let path = positional
                .get(1)
                .ok_or_else(|| anyhow::anyhow!("export-log requires a path"))?;
            CliCommand::ExportLog {
                path: PathBuf::from(path),
                append,
            }
        }
        Some("check-update") => CliCommand::CheckUpdate,
        Some("help") => CliCommand::Help,
        Some("version") => CliCommand::Version,
        Some(other) => bail!("unknown command: {other} (see `runekeeper help`)"),
    };

    Ok((command, options))
}

fn cmd_versions(app: &mut App, format: OutputFormat) -> Result<()> {
    let versions = app.versions()?;
    match format {
        OutputFormat::Json => {
            let rows: Vec<serde_json::Value> = versions
                .iter()
                .map(|version| {
                    serde_json::json!({
                        "label": version.label(),
                        "path": version.path,
                        "complete": version.is_complete(),
                        "has_config": version.has_config(),
                        "addons": AddonInventory::load(version).folders.len(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Text => {
            for version in &versions {
                let state = if version.is_complete() {
                    "complete"
                } else {
                    "incomplete (launch the game once)"
                };
                let addons = AddonInventory::load(version).folders.len();
                println!(
                    "{:<16} {} [{}, {} addon(s)]",
                    version.label(),
                    version.path.display(),
                    state,
                    addons
                );
            }
        }
    }
    Ok(())
}

fn cmd_clean(app: &mut App, op: OpKind, options: &GlobalOptions) -> Result<()> {
    let groups = match op {
        OpKind::Stale => app.scan_stale_sync()?,
        OpKind::Folders => app.scan_folders_sync()?,
        _ => unreachable!(),
    };
    let paths: Vec<PathBuf> = groups
        .iter()
        .flat_map(|group| group.items.iter())
        .map(|item| item.path.clone())
        .collect();
    if paths.is_empty() {
        println!("Nothing to clean.");
        return Ok(());
    }

    print_groups(&groups, OutputFormat::Text);
    let mode = app.global.delete_mode;
    if !confirm(
        &format!("Delete {} item(s) ({} mode)?", paths.len(), mode.label()),
        options.assume_yes,
    )? {
        println!("Cancelled.");
        return Ok(());
    }

    let outcome = app.delete_paths(op, &paths);
    report_outcome(app, outcome.processed, outcome.used_trash, &outcome.failures);
    Ok(())
}

fn cmd_orphans(app: &mut App, delete: bool, rebuild: bool, options: &GlobalOptions) -> Result<()> {
    let groups = app.scan_orphans_sync()?;
    print_groups(&groups, options.format);

    if delete {
        let paths: Vec<PathBuf> = groups
            .iter()
            .flat_map(|group| group.items.iter())
            .map(|item| item.path.clone())
            .collect();
        if paths.is_empty() {
            println!("No orphans found.");
        } else {
            let mode = app.global.delete_mode;
            if confirm(
                &format!(
                    "Delete {} orphan SavedVariables file(s) ({} mode)?",
                    paths.len(),
                    mode.label()
                ),
                options.assume_yes,
            )? {
                let outcome = app.delete_paths(OpKind::Orphans, &paths);
                report_outcome(app, outcome.processed, outcome.used_trash, &outcome.failures);
            } else {
                println!("Cancelled.");
            }
        }
    }

    if rebuild {
        for version in app.complete_versions()? {
            if !confirm(
                &format!("Rebuild AddOns.txt manifests for {}?", version.label()),
                options.assume_yes,
            )? {
                println!("Skipped {}.", version.label());
                continue;
            }
            let report = app.rebuild_manifests_sync(&version);
            for character in &report.characters {
                println!(
                    "{}: {} -> {} entries, {} removed",
                    version.label(),
                    character.character,
                    character.written,
                    character.removed
                );
            }
            for failure in &report.failures {
                eprintln!("failed: {failure}");
            }
        }
    }
    Ok(())
}

fn cmd_preset(
    app: &mut App,
    choice: PresetChoice,
    version_filter: Option<String>,
    options: &GlobalOptions,
) -> Result<()> {
    let versions: Vec<Version> = app
        .complete_versions()?
        .into_iter()
        .filter(|version| match &version_filter {
            Some(filter) => version.label().eq_ignore_ascii_case(filter),
            None => true,
        })
        .collect();
    if versions.is_empty() {
        bail!("no matching complete versions");
    }

    for version in versions {
        let preset = match choice {
            PresetChoice::Fixed(preset) => preset,
            PresetChoice::Auto => app.suggested_preset_for(&version),
        };
        if !confirm(
            &format!(
                "Apply {} preset to {} ({} setting(s))?",
                preset.label(),
                version.label(),
                preset.assignments().len()
            ),
            options.assume_yes,
        )? {
            println!("Skipped {}.", version.label());
            continue;
        }
        match app.apply_preset_sync(&version, preset) {
            Ok(outcome) => println!(
                "{}: wrote {} ({} setting(s), backup {})",
                version.label(),
                outcome.path.display(),
                outcome.keys_applied,
                outcome
                    .backup
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "none".to_string())
            ),
            Err(err) => eprintln!("{}: {err}", version.label()),
        }
    }
    Ok(())
}

fn cmd_hardware(app: &mut App, refresh: bool, format: OutputFormat) -> Result<()> {
    let hw = app.hardware(refresh);
    match format {
        OutputFormat::Json => {
            let mut tiers = serde_json::Map::new();
            for version in app.versions().unwrap_or_default() {
                let breakdown = hardware::classify(&hw, GameProfile::for_version(&version));
                tiers.insert(
                    version.label(),
                    serde_json::json!({
                        "tier": breakdown.overall.label(),
                        "suggested": hardware::suggested_preset(breakdown.overall).label(),
                    }),
                );
            }
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "cpu": hw.cpu_name,
                    "cores": hw.cpu_cores,
                    "threads": hw.cpu_threads,
                    "ram_gb": hw.ram_gb,
                    "gpus": hw.gpus,
                    "installs": tiers,
                }))?
            );
        }
        OutputFormat::Text => {
            println!("CPU:  {} ({} cores / {} threads)", hw.cpu_name, hw.cpu_cores, hw.cpu_threads);
            println!("RAM:  {:.1} GiB", hw.ram_gb);
            for gpu in &hw.gpus {
                println!("GPU:  {gpu}");
            }
            for version in app.versions().unwrap_or_default() {
                let breakdown = hardware::classify(&hw, GameProfile::for_version(&version));
                println!(
                    "{:<16} tier {} -> suggested preset {}",
                    version.label(),
                    breakdown.overall.label(),
                    hardware::suggested_preset(breakdown.overall).label()
                );
            }
        }
    }
    Ok(())
}

fn cmd_check_update(format: OutputFormat) -> Result<()> {
    match update::check_for_updates(env!("CARGO_PKG_VERSION")) {
        Ok(update::UpdateStatus::Available { version }) => match format {
            OutputFormat::Json => println!(
                "{}",
                serde_json::json!({ "update": true, "latest": version })
            ),
            OutputFormat::Text => println!("Update available: v{version}"),
        },
        Ok(update::UpdateStatus::UpToDate) => match format {
            OutputFormat::Json => println!("{}", serde_json::json!({ "update": false })),
            OutputFormat::Text => println!("Up to date."),
        },
        Err(err) => eprintln!("Update check failed: {err}"),
    }
    Ok(())
}

fn print_groups(groups: &[CandidateGroup], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let rows: Vec<serde_json::Value> = groups
                .iter()
                .map(|group| {
                    serde_json::json!({
                        "version": group.version_label,
                        "items": group
                            .items
                            .iter()
                            .map(|item| serde_json::json!({
                                "label": item.label,
                                "path": item.path,
                            }))
                            .collect::<Vec<_>>(),
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&rows).unwrap_or_else(|_| "[]".to_string())
            );
        }
        OutputFormat::Text => {
            if groups.is_empty() {
                println!("Nothing found.");
                return;
            }
            for group in groups {
                println!("{}:", group.version_label);
                for item in &group.items {
                    println!("  {}", item.label);
                }
            }
        }
    }
}

fn report_outcome(app: &App, processed: usize, used_trash: bool, failures: &[crate::errors::ItemError]) {
    let mode = if used_trash { "trash" } else { "permanent" };
    println!("Processed {processed} item(s) ({mode}).");
    if app.global.delete_mode == DeleteMode::Trash && !used_trash {
        println!("Warning: trash is unavailable here; deletion was permanent.");
    }
    for failure in failures {
        eprintln!("failed: {failure}");
    }
}

fn confirm(prompt: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    print!("{prompt} [y/N]: ");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

fn print_help() {
    println!("RuneKeeper - World of Warcraft install maintenance");
    println!();
    println!("Usage: runekeeper [command] [options]");
    println!();
    println!("Commands:");
    println!("  (none)                    Launch the TUI");
    println!("  versions                  List detected WoW versions");
    println!("  scan-stale                List .bak/.old files");
    println!("  clean-stale               Delete .bak/.old files");
    println!("  folders                   List regenerable folders and screenshots");
    println!("  clean-folders             Delete regenerable folders and screenshots");
    println!("  orphans [--delete] [--rebuild-manifest]");
    println!("                            Scan (and optionally delete) orphan SavedVariables;");
    println!("                            optionally rebuild AddOns.txt manifests");
    println!("  preset <low|medium|high|ultra|auto> [--version <label>]");
    println!("                            Apply a graphics preset to Config.wtf");
    println!("  hardware [--refresh]      Show the hardware profile and per-install tiers");
    println!("  export-log <path> [--append]");
    println!("  check-update              Query the latest release");
    println!("  help | version");
    println!();
    println!("Options:");
    println!("  --root <path>             Use this WoW install root");
    println!("  --override-root           Accept a root that fails validation");
    println!("  --format <text|json>      Output format for listings");
    println!("  --trash | --permanent     Delete mode for this invocation");
    println!("  --yes, -y                 Skip confirmation prompts");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn no_args_launches_ui() {
        let (command, options) = parse_args(&[]).unwrap();
        assert!(matches!(command, CliCommand::Ui));
        assert!(!options.assume_yes);
    }

    #[test]
    fn orphan_flags_parse() {
        let (command, options) =
            parse_args(&strings(&["orphans", "--delete", "--permanent", "-y"])).unwrap();
        match command {
            CliCommand::Orphans { delete, rebuild } => {
                assert!(delete);
                assert!(!rebuild);
            }
            _ => panic!("wrong command"),
        }
        assert_eq!(options.delete_mode, Some(DeleteMode::Permanent));
        assert!(options.assume_yes);
    }

    #[test]
    fn preset_parses_fixed_and_auto() {
        let (command, _) = parse_args(&strings(&["preset", "high"])).unwrap();
        assert!(matches!(
            command,
            CliCommand::Preset {
                choice: PresetChoice::Fixed(Preset::High),
                ..
            }
        ));

        let (command, _) = parse_args(&strings(&["preset"])).unwrap();
        assert!(matches!(
            command,
            CliCommand::Preset {
                choice: PresetChoice::Auto,
                ..
            }
        ));

        assert!(parse_args(&strings(&["preset", "extreme"])).is_err());
    }

    #[test]
    fn version_flag_is_contextual() {
        let (command, _) =
            parse_args(&strings(&["preset", "low", "--version", "Retail"])).unwrap();
        match command {
            CliCommand::Preset { version, .. } => assert_eq!(version.as_deref(), Some("Retail")),
            _ => panic!("wrong command"),
        }

        let (command, _) = parse_args(&strings(&["--version"])).unwrap();
        assert!(matches!(command, CliCommand::Version));
    }

    #[test]
    fn unknown_options_are_rejected() {
        assert!(parse_args(&strings(&["--bogus"])).is_err());
        assert!(parse_args(&strings(&["frobnicate"])).is_err());
    }
}
