//! Host capabilities the engine calls into but does not implement itself.

use std::process::{Child, Command, Stdio};
use std::thread;

pub trait Clipboard {
    fn set(&mut self, text: &str) -> Result<(), String>;
}

pub trait Opener {
    fn open(&mut self, target: &str) -> Result<(), String>;
}

/// System clipboard via arboard. The handle is created lazily because some
/// environments (headless CI, bare ttys) have no clipboard at all.
#[derive(Default)]
pub struct SystemClipboard {
    inner: Option<arboard::Clipboard>,
}

impl Clipboard for SystemClipboard {
    fn set(&mut self, text: &str) -> Result<(), String> {
        if self.inner.is_none() {
            self.inner = Some(arboard::Clipboard::new().map_err(|e| e.to_string())?);
        }
        match self.inner.as_mut() {
            Some(cb) => cb.set_text(text.to_string()).map_err(|e| e.to_string()),
            None => Err("clipboard unavailable".into()),
        }
    }
}

/// Hands URLs and paths to the platform opener without waiting for it.
#[derive(Default)]
pub struct SystemOpener;

impl SystemOpener {
    fn program() -> (&'static str, &'static [&'static str]) {
        const NONE: &[&str] = &[];
        const WINDOWS_START: &[&str] = &["/C", "start", ""];
        if cfg!(target_os = "macos") {
            ("open", NONE)
        } else if cfg!(target_os = "windows") {
            ("cmd", WINDOWS_START)
        } else {
            ("xdg-open", NONE)
        }
    }
}

impl Opener for SystemOpener {
    fn open(&mut self, target: &str) -> Result<(), String> {
        let (program, prefix) = Self::program();
        Command::new(program)
            .args(prefix)
            .arg(target)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|child| reap_detached(child, program))
            .map_err(|e| format!("{program}: {e}"))
    }
}

/// Waits for `child` on its own thread so it never lingers as a zombie.
fn reap_detached(mut child: Child, program: &str) {
    let program = program.to_string();
    thread::spawn(move || {
        if let Err(e) = child.wait() {
            log::debug!("{program}: wait failed: {e}");
        }
    });
}

/// Bundle handed to the dispatcher; boxed so tests can swap in recorders.
pub struct Capabilities {
    pub clipboard: Box<dyn Clipboard>,
    pub opener: Box<dyn Opener>,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            clipboard: Box::new(SystemClipboard::default()),
            opener: Box::new(SystemOpener),
        }
    }
}

#[cfg(test)]
pub mod fakes {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Shared log of capability calls, e.g. `copy:hello`, `open:https://x`.
    pub type CallLog = Rc<RefCell<Vec<String>>>;

    pub struct RecordingClipboard(pub CallLog);

    impl Clipboard for RecordingClipboard {
        fn set(&mut self, text: &str) -> Result<(), String> {
            self.0.borrow_mut().push(format!("copy:{text}"));
            Ok(())
        }
    }

    pub struct RecordingOpener(pub CallLog);

    impl Opener for RecordingOpener {
        fn open(&mut self, target: &str) -> Result<(), String> {
            self.0.borrow_mut().push(format!("open:{target}"));
            Ok(())
        }
    }

    pub fn recording() -> (Capabilities, CallLog) {
        let log: CallLog = Rc::new(RefCell::new(Vec::new()));
        let caps = Capabilities {
            clipboard: Box::new(RecordingClipboard(log.clone())),
            opener: Box::new(RecordingOpener(log.clone())),
        };
        (caps, log)
    }
}
