//! `log` backend that keeps the last lines in memory for the debug pane and can
//! mirror them to a file. Secure input values registered with [`register_secrets`]
//! are masked in every line before it is stored.

use anyhow::{Context, Result};
use log::{LevelFilter, Log, Metadata, Record};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

pub const MAX_LOG_LINES: usize = 200;
const MASK: &str = "***";

struct RingLogger {
    level: LevelFilter,
    lines: Mutex<VecDeque<String>>,
    file: Option<Mutex<File>>,
}

impl RingLogger {
    fn new(level: LevelFilter, file: Option<File>) -> Self {
        Self {
            level,
            lines: Mutex::new(VecDeque::with_capacity(MAX_LOG_LINES)),
            file: file.map(Mutex::new),
        }
    }

    fn push(&self, line: String) {
        if let Some(file) = &self.file {
            if let Ok(mut f) = file.lock() {
                let _ = writeln!(f, "{line}");
            }
        }
        if let Ok(mut lines) = self.lines.lock() {
            if lines.len() >= MAX_LOG_LINES {
                lines.pop_front();
            }
            lines.push_back(line);
        }
    }

    fn snapshot(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|l| l.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl Log for RingLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!(
            "{:<5} {}: {}",
            record.level(),
            record.target(),
            record.args()
        );
        self.push(scrub(&line));
    }

    fn flush(&self) {
        if let Some(file) = &self.file {
            if let Ok(mut f) = file.lock() {
                let _ = f.flush();
            }
        }
    }
}

static LOGGER: OnceLock<RingLogger> = OnceLock::new();

fn secrets() -> &'static Mutex<Vec<String>> {
    static SECRETS: OnceLock<Mutex<Vec<String>>> = OnceLock::new();
    SECRETS.get_or_init(|| Mutex::new(Vec::new()))
}

/// Level from `PAGEBEAM_LOG`; unset or unrecognised means `info`.
pub fn parse_level(s: Option<&str>) -> LevelFilter {
    s.and_then(|v| v.trim().parse().ok())
        .unwrap_or(LevelFilter::Info)
}

/// Install the logger once. Later calls are no-ops.
pub fn init(level: LevelFilter, file: Option<&Path>) -> Result<()> {
    let file = match file {
        Some(p) => Some(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(p)
                .with_context(|| format!("opening log file {p:?}"))?,
        ),
        None => None,
    };
    let logger = LOGGER.get_or_init(|| RingLogger::new(level, file));
    if log::set_logger(logger).is_ok() {
        log::set_max_level(level);
    }
    Ok(())
}

/// Most recent log lines, oldest first.
pub fn recent() -> Vec<String> {
    LOGGER.get().map(RingLogger::snapshot).unwrap_or_default()
}

/// Mask these values in all future log lines and scrubbed messages.
pub fn register_secrets<'a>(values: impl IntoIterator<Item = &'a str>) {
    if let Ok(mut list) = secrets().lock() {
        for v in values {
            if !v.is_empty() && !list.iter().any(|s| s == v) {
                list.push(v.to_string());
            }
        }
    }
}

pub fn scrub(text: &str) -> String {
    let Ok(list) = secrets().lock() else {
        return text.to_string();
    };
    let mut out = text.to_string();
    for s in list.iter() {
        if out.contains(s.as_str()) {
            out = out.replace(s.as_str(), MASK);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_keeps_only_the_newest_lines() {
        let logger = RingLogger::new(LevelFilter::Debug, None);
        for i in 0..(MAX_LOG_LINES + 5) {
            logger.push(format!("line {i}"));
        }
        let lines = logger.snapshot();
        assert_eq!(lines.len(), MAX_LOG_LINES);
        assert_eq!(lines[0], "line 5");
    }

    #[test]
    fn registered_secrets_are_masked() {
        register_secrets(["pagebeam-test-secret-1", ""]);
        assert_eq!(
            scrub("token=pagebeam-test-secret-1 ok"),
            "token=*** ok"
        );
        assert_eq!(scrub("nothing here"), "nothing here");
    }

    #[test]
    fn records_are_scrubbed_before_storage() {
        register_secrets(["pagebeam-test-secret-2"]);
        let logger = RingLogger::new(LevelFilter::Info, None);
        logger.log(
            &Record::builder()
                .level(log::Level::Info)
                .target("pagebeam")
                .args(format_args!("spawn gh --token pagebeam-test-secret-2"))
                .build(),
        );
        logger.log(
            &Record::builder()
                .level(log::Level::Debug)
                .target("pagebeam")
                .args(format_args!("filtered out"))
                .build(),
        );
        assert_eq!(logger.snapshot(), vec!["INFO  pagebeam: spawn gh --token ***"]);
    }

    #[test]
    fn levels_parse_with_info_default() {
        assert_eq!(parse_level(Some("DEBUG")), LevelFilter::Debug);
        assert_eq!(parse_level(Some(" warn ")), LevelFilter::Warn);
        assert_eq!(parse_level(Some("bogus")), LevelFilter::Info);
        assert_eq!(parse_level(None), LevelFilter::Info);
    }
}
