use crate::error::LoadError;
use crate::model::{decode_page, Page};
use crate::services::catalog::PageSource;
use crate::services::executor::{execute, ExecOptions};
use std::sync::mpsc::Sender;
use std::thread;

/// Fetch and decode a page. A plugin that exits non-zero yields its stderr, never a
/// partially decoded page.
pub fn load_page(source: &PageSource, opts: &ExecOptions) -> Result<Page, LoadError> {
    match source {
        PageSource::File(path) => {
            let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
                path: path.display().to_string(),
                source,
            })?;
            Ok(decode_page(&text)?)
        }
        PageSource::Command(inv) => {
            let out = execute(inv, opts)?;
            if !out.success() {
                return Err(LoadError::Exit {
                    code: out.code,
                    stderr: out.stderr.trim_end().to_string(),
                });
            }
            Ok(decode_page(&out.stdout)?)
        }
        PageSource::Inline => Err(LoadError::Catalog(source.describe())),
    }
}

/// What a page load was for; decides how the stack is mutated on arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPurpose {
    Root,
    Push,
    Reload,
}

pub struct LoadMsg {
    /// Matches the busy state that requested the load; anything else is stale.
    pub ticket: u64,
    pub purpose: LoadPurpose,
    pub source: PageSource,
    pub outcome: Result<Page, LoadError>,
}

pub fn spawn_load_page(
    ticket: u64,
    purpose: LoadPurpose,
    source: PageSource,
    opts: ExecOptions,
    tx: Sender<LoadMsg>,
) {
    thread::spawn(move || {
        let outcome = load_page(&source, &opts);
        if let Err(e) = &outcome {
            log::warn!("load {} failed: {e}", source.describe());
        }
        let _ = tx.send(LoadMsg {
            ticket,
            purpose,
            source,
            outcome,
        });
    });
}
