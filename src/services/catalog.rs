use crate::error::LoadError;
use crate::model::Invocation;
use std::path::{Path, PathBuf};

/// Where a page came from; `reload` goes back to the same place.
#[derive(Debug, Clone, PartialEq)]
pub enum PageSource {
    /// Plugin invocation whose stdout is a page.
    Command(Invocation),
    /// Static page document on disk.
    File(PathBuf),
    /// Built locally (error pages); reloading keeps the page as is.
    Inline,
}

impl PageSource {
    /// Directory that relative `push.page` identifiers resolve against.
    pub fn base_dir(&self) -> Option<PathBuf> {
        match self {
            PageSource::File(p) => p.parent().map(Path::to_path_buf),
            PageSource::Command(inv) => {
                let program = Path::new(&inv.program);
                if program.components().count() > 1 {
                    let parent = program.parent().map(Path::to_path_buf)?;
                    match &inv.dir {
                        Some(dir) if parent.is_relative() => Some(dir.join(parent)),
                        _ => Some(parent),
                    }
                } else {
                    inv.dir.clone()
                }
            }
            PageSource::Inline => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            PageSource::Command(inv) => inv.display(),
            PageSource::File(p) => p.display().to_string(),
            PageSource::Inline => "(inline)".to_string(),
        }
    }
}

/// Resolves `push.page` identifiers to page sources.
pub trait PageCatalog: Send + Sync {
    fn resolve(&self, id: &str, base: Option<&Path>) -> Result<PageSource, LoadError>;
}

/// Filesystem-backed catalog:
/// - `*.json` paths are static pages,
/// - an existing file is executed as a plugin,
/// - anything else is split as a shell-style command line.
#[derive(Default)]
pub struct FsCatalog;

impl PageCatalog for FsCatalog {
    fn resolve(&self, id: &str, base: Option<&Path>) -> Result<PageSource, LoadError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(LoadError::Catalog(id.to_string()));
        }
        let raw = PathBuf::from(id);
        let candidate = match base {
            Some(b) if raw.is_relative() => b.join(&raw),
            _ => raw.clone(),
        };
        if id.ends_with(".json") {
            if candidate.is_file() {
                return Ok(PageSource::File(candidate));
            }
            if raw.is_file() {
                return Ok(PageSource::File(raw));
            }
            return Err(LoadError::Catalog(id.to_string()));
        }
        if candidate.is_file() {
            return Ok(PageSource::Command(Invocation::new(
                candidate.to_string_lossy().into_owned(),
            )));
        }
        let argv = shlex::split(id)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| LoadError::Catalog(id.to_string()))?;
        let mut inv =
            Invocation::from_argv(argv).ok_or_else(|| LoadError::Catalog(id.to_string()))?;
        inv.dir = base.map(Path::to_path_buf);
        Ok(PageSource::Command(inv))
    }
}
