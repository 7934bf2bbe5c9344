use crate::model::Command;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "pagebeam.yaml";

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Root plugin used when no command is given on the command line.
    #[serde(default)]
    pub root: Option<Command>,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
    #[serde(default = "default_preview_timeout_ms")]
    pub preview_timeout_ms: u64,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    // Extra environment for every spawned command
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            root: None,
            theme: None,
            command_timeout_ms: default_command_timeout_ms(),
            preview_timeout_ms: default_preview_timeout_ms(),
            debug: false,
            tick_ms: default_tick_ms(),
            env: BTreeMap::new(),
        }
    }
}

fn default_command_timeout_ms() -> u64 {
    60_000
}

fn default_preview_timeout_ms() -> u64 {
    10_000
}

fn default_tick_ms() -> u64 {
    200
}

fn millis(ms: u64) -> Option<Duration> {
    if ms == 0 {
        None
    } else {
        Some(Duration::from_millis(ms))
    }
}

impl Settings {
    pub fn command_timeout(&self) -> Option<Duration> {
        millis(self.command_timeout_ms)
    }

    pub fn preview_timeout(&self) -> Option<Duration> {
        millis(self.preview_timeout_ms)
    }

    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(20))
    }

    pub fn env_pairs(&self) -> Vec<(String, String)> {
        self.env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let s = fs::read_to_string(path).with_context(|| format!("reading {path:?}"))?;
        serde_yaml::from_str(&s).with_context(|| format!("parsing {path:?}"))
    }

    /// Environment wins over the file.
    pub fn apply_env_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(theme) = get("PAGEBEAM_THEME") {
            self.theme = Some(theme);
        }
        if let Some(ms) = get("PAGEBEAM_TIMEOUT_MS").and_then(|s| s.parse::<u64>().ok()) {
            self.command_timeout_ms = ms;
        }
        if let Some(v) = get("PAGEBEAM_DEBUG") {
            self.debug = truthy(&v);
        }
    }
}

pub fn truthy(v: &str) -> bool {
    v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes")
}

/// Lookup order: `./pagebeam.yaml`, `./.pagebeam/pagebeam.yaml`, then
/// `<ancestor>/.pagebeam/pagebeam.yaml` walking up, then `~/.config/pagebeam/`.
pub fn candidate_paths(cwd: &Path, home: Option<&Path>) -> Vec<PathBuf> {
    let mut out = vec![
        cwd.join(CONFIG_FILE),
        cwd.join(".pagebeam").join(CONFIG_FILE),
    ];
    let mut cur = cwd;
    while let Some(parent) = cur.parent() {
        out.push(parent.join(".pagebeam").join(CONFIG_FILE));
        cur = parent;
    }
    if let Some(home) = home {
        out.push(home.join(".config").join("pagebeam").join(CONFIG_FILE));
    }
    out
}

/// Load settings: `$PAGEBEAM_CONFIG` (a file) or `$PAGEBEAM_CONFIG_DIR/pagebeam.yaml`
/// must exist when set; otherwise the first discovered candidate, else defaults.
pub fn load_settings() -> Result<(Settings, Option<PathBuf>)> {
    let explicit = std::env::var("PAGEBEAM_CONFIG")
        .ok()
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("PAGEBEAM_CONFIG_DIR")
                .ok()
                .map(|d| PathBuf::from(d).join(CONFIG_FILE))
        });
    let path = match explicit {
        Some(p) => Some(p),
        None => {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            let home = std::env::var("HOME")
                .ok()
                .or_else(|| std::env::var("USERPROFILE").ok())
                .map(PathBuf::from);
            candidate_paths(&cwd, home.as_deref())
                .into_iter()
                .find(|p| p.exists())
        }
    };
    let mut settings = match &path {
        Some(p) => Settings::from_path(p)?,
        None => Settings::default(),
    };
    settings.apply_env_overrides(|k| std::env::var(k).ok());
    Ok((settings, path))
}
