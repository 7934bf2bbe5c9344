mod app;
mod error;
mod logging;
mod model;
mod nav;
mod services;
mod theme;
mod ui;
mod widgets;

use anyhow::{Context, Result};
use model::Invocation;
use services::catalog::PageSource;
use services::config::{load_settings, Settings};
use std::path::{Path, PathBuf};

const USAGE: &str = "\
usage: pagebeam <plugin> [args...]
       pagebeam <page.json>

With no arguments the `root` command from pagebeam.yaml is used.

environment:
  PAGEBEAM_CONFIG      config file to load
  PAGEBEAM_LOG         error|warn|info|debug|trace (default info)
  PAGEBEAM_LOG_FILE    also append log lines to this file
  PAGEBEAM_THEME       dark|light
  PAGEBEAM_TIMEOUT_MS  command timeout, 0 for none";

fn main() -> Result<()> {
    let level = logging::parse_level(std::env::var("PAGEBEAM_LOG").ok().as_deref());
    let log_file = std::env::var_os("PAGEBEAM_LOG_FILE").map(PathBuf::from);
    logging::init(level, log_file.as_deref())?;

    let (settings, config_path) = load_settings()?;
    match &config_path {
        Some(p) => log::info!("config: {}", p.display()),
        None => log::debug!("no config file, using defaults"),
    }

    let cwd = std::env::current_dir().context("reading current directory")?;
    let args: Vec<String> = std::env::args().skip(1).collect();
    if matches!(args.first().map(String::as_str), Some("-h" | "--help")) {
        println!("{USAGE}");
        return Ok(());
    }
    let Some(root) = root_source(args, &settings, &cwd)? else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };
    ui::run(settings, root)
}

/// Root page from argv: a single `.json` argument is a page file, anything else is
/// the plugin command line. Falls back to the configured `root` command.
fn root_source(args: Vec<String>, settings: &Settings, cwd: &Path) -> Result<Option<PageSource>> {
    if let [only] = args.as_slice() {
        if only.ends_with(".json") {
            let path = PathBuf::from(only);
            let path = if path.is_relative() {
                cwd.join(path)
            } else {
                path
            };
            return Ok(Some(PageSource::File(path)));
        }
    }
    if let Some(inv) = Invocation::from_argv(args) {
        return Ok(Some(PageSource::Command(inv)));
    }
    match &settings.root {
        Some(cmd) => {
            let inv = cmd
                .to_invocation()
                .context("invalid `root` command in config")?;
            Ok(Some(PageSource::Command(inv)))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Command;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn json_argument_is_a_page_file() {
        let src = root_source(argv(&["pages/root.json"]), &Settings::default(), Path::new("/work"))
            .unwrap();
        assert_eq!(src, Some(PageSource::File("/work/pages/root.json".into())));
    }

    #[test]
    fn remaining_argv_is_the_plugin_command() {
        let src = root_source(
            argv(&["gh-pages", "--repo", "a b"]),
            &Settings::default(),
            Path::new("/work"),
        )
        .unwrap();
        assert_eq!(
            src,
            Some(PageSource::Command(
                Invocation::new("gh-pages").with_args(["--repo", "a b"])
            ))
        );
    }

    #[test]
    fn configured_root_is_the_fallback() {
        let settings = Settings {
            root: Some(Command::Line("plugin list --json".into())),
            ..Settings::default()
        };
        let src = root_source(Vec::new(), &settings, Path::new("/")).unwrap();
        assert_eq!(
            src,
            Some(PageSource::Command(
                Invocation::new("plugin").with_args(["list", "--json"])
            ))
        );
        assert_eq!(
            root_source(Vec::new(), &Settings::default(), Path::new("/")).unwrap(),
            None
        );
    }
}
