use anyhow::{Context, Result};
use std::{fs, path::Path};
use time::{macros::format_description, OffsetDateTime};

const LOG_CAPACITY: usize = 5000;
const SESSION_HEADER: &str = "==== runekeeper session ";
const RETAIN_SESSIONS: usize = 20;
const RETAIN_SESSIONS_VERBOSE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Debug,
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub stamp: String,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn line(&self) -> String {
        format!("[{}] {}", self.stamp, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportMode {
    Fresh,
    Append,
}

#[derive(Debug)]
pub struct Logger {
    entries: Vec<LogEntry>,
    verbose: bool,
}

impl Logger {
    pub fn new(verbose: bool) -> Self {
        Self {
            entries: Vec::new(),
            verbose,
        }
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Info, message.into());
    }

    pub fn debug(&mut self, message: impl Into<String>) {
        if self.verbose {
            self.push(LogLevel::Debug, message.into());
        }
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn lines(&self) -> Vec<String> {
        self.entries.iter().map(LogEntry::line).collect()
    }

    fn push(&mut self, level: LogLevel, message: String) {
        self.entries.push(LogEntry {
            stamp: timestamp(),
            level,
            message,
        });
        if self.entries.len() > LOG_CAPACITY {
            let overflow = self.entries.len() - LOG_CAPACITY;
            self.entries.drain(0..overflow);
        }
    }

    pub fn export(&self, path: &Path, mode: ExportMode) -> Result<()> {
        let header = format!("{}{} ====", SESSION_HEADER, timestamp());
        let mut body = String::new();
        body.push_str(&header);
        body.push('\n');
        for entry in &self.entries {
            body.push_str(&entry.line());
            body.push('\n');
        }

        let output = match mode {
            ExportMode::Fresh => body,
            ExportMode::Append => {
                let existing = fs::read_to_string(path).unwrap_or_default();
                let retain = if self.verbose {
                    RETAIN_SESSIONS_VERBOSE
                } else {
                    RETAIN_SESSIONS
                };
                let mut merged = trim_sessions(&existing, retain.saturating_sub(1));
                if !merged.is_empty() && !merged.ends_with('\n') {
                    merged.push('\n');
                }
                merged.push_str(&body);
                merged
            }
        };

        fs::write(path, output).with_context(|| format!("write log {}", path.display()))?;
        Ok(())
    }
}

fn timestamp() -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    OffsetDateTime::now_utc().format(&format).unwrap_or_default()
}

fn trim_sessions(existing: &str, keep: usize) -> String {
    let mut starts = Vec::new();
    let mut offset = 0;
    for line in existing.split_inclusive('\n') {
        if line.starts_with(SESSION_HEADER) {
            starts.push(offset);
        }
        offset += line.len();
    }
    if starts.len() <= keep {
        return existing.to_string();
    }
    let cut = starts[starts.len() - keep];
    existing[cut..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_entries_dropped_unless_verbose() {
        let mut quiet = Logger::new(false);
        quiet.info("kept");
        quiet.debug("dropped");
        assert_eq!(quiet.entries().len(), 1);

        let mut verbose = Logger::new(true);
        verbose.info("kept");
        verbose.debug("also kept");
        assert_eq!(verbose.entries().len(), 2);
    }

    #[test]
    fn lines_carry_bracketed_timestamp() {
        let mut logger = Logger::new(false);
        logger.info("hello");
        let line = &logger.lines()[0];
        assert!(line.starts_with('['), "line: {line}");
        assert!(line.ends_with("] hello"), "line: {line}");
        // [YYYY-MM-DD HH:MM:SS] is 21 chars.
        assert_eq!(line.find(']'), Some(20));
    }

    #[test]
    fn append_export_trims_old_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keeper.log");

        for round in 0..RETAIN_SESSIONS + 5 {
            let mut logger = Logger::new(false);
            logger.info(format!("round {round}"));
            logger.export(&path, ExportMode::Append).unwrap();
        }

        let raw = fs::read_to_string(&path).unwrap();
        let sessions = raw
            .lines()
            .filter(|line| line.starts_with(SESSION_HEADER))
            .count();
        assert_eq!(sessions, RETAIN_SESSIONS);
        assert!(!raw.contains("round 0"));
        assert!(raw.contains(&format!("round {}", RETAIN_SESSIONS + 4)));
    }

    #[test]
    fn fresh_export_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keeper.log");

        let mut first = Logger::new(false);
        first.info("first session");
        first.export(&path, ExportMode::Append).unwrap();

        let mut second = Logger::new(false);
        second.info("second session");
        second.export(&path, ExportMode::Fresh).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("first session"));
        assert!(raw.contains("second session"));
    }
}
