use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

const RELEASES_URL: &str = "https://api.github.com/repos/runekeeper/runekeeper/releases/latest";
const USER_AGENT: &str = "RuneKeeper";

#[derive(Debug, Clone)]
pub enum UpdateStatus {
    UpToDate,
    Available { version: String },
}

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
    prerelease: bool,
}

pub fn check_for_updates(current_version: &str) -> Result<UpdateStatus> {
    let release = fetch_latest_release()?;
    if release.prerelease {
        return Ok(UpdateStatus::UpToDate);
    }

    let latest = normalize_version(&release.tag_name);
    if is_newer_version(&latest, current_version) {
        Ok(UpdateStatus::Available { version: latest })
    } else {
        Ok(UpdateStatus::UpToDate)
    }
}

fn fetch_latest_release() -> Result<Release> {
    let agent = ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(5))
        .timeout_read(Duration::from_secs(5))
        .timeout_write(Duration::from_secs(5))
        .build();
    let response = agent
        .get(RELEASES_URL)
        .set("User-Agent", USER_AGENT)
        .call()
        .context("fetch latest release")?;
    let release: Release = response.into_json().context("decode release")?;
    Ok(release)
}

fn normalize_version(tag: &str) -> String {
    tag.trim_start_matches('v').to_string()
}

fn is_newer_version(latest: &str, current: &str) -> bool {
    match (parse_version(latest), parse_version(current)) {
        (Some(latest), Some(current)) => latest > current,
        _ => false,
    }
}

fn parse_version(raw: &str) -> Option<(u64, u64, u64)> {
    let raw = raw
        .trim_start_matches('v')
        .split('-')
        .next()?
        .split('+')
        .next()?;
    let mut parts = raw.split('.').map(|part| part.parse::<u64>().ok());
    let major = parts.next().flatten()?;
    let minor = parts.next().flatten()?;
    let patch = parts.next().flatten()?;
    Some((major, minor, patch))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_comparison_ignores_prerelease_suffixes() {
        assert!(is_newer_version("0.5.0", "0.4.2"));
        assert!(!is_newer_version("0.4.2", "0.4.2"));
        assert!(!is_newer_version("0.4.1", "0.4.2"));
        assert!(is_newer_version("v1.0.0-rc1", "0.9.9"));
        assert!(!is_newer_version("garbage", "0.4.2"));
    }
}
