//! Subprocess execution with piped I/O, incremental stdout, timeouts and cancellation.
//!
//! A process never outlives the call that spawned it: every exit path (success,
//! timeout, cancel, panic unwinding through the guard) terminates and reaps the child.

use crate::error::CommandError;
use crate::model::Invocation;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const POLL: Duration = Duration::from_millis(20);
/// How long helpers left behind by an exited leader get after TERM.
const GRACE: Duration = Duration::from_millis(500);

/// Cooperative cancellation flag. Children observe their parent, so cancelling a
/// page frame's token cancels every command started on its behalf.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    parent: Option<Arc<CancelToken>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child(&self) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            parent: Some(Arc::new(self.clone())),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
            || self
                .parent
                .as_ref()
                .map(|p| p.is_cancelled())
                .unwrap_or(false)
    }
}

#[derive(Clone, Debug, Default)]
pub struct ExecOptions {
    /// Base directory; a relative `Invocation::dir` is resolved against it.
    pub cwd: Option<PathBuf>,
    /// Replaces the invocation's own stdin payload when set.
    pub stdin: Option<String>,
    pub timeout: Option<Duration>,
    pub env: Vec<(String, String)>,
    pub cancel: Option<CancelToken>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `-1` when the process was terminated by a signal.
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

pub fn execute(inv: &Invocation, opts: &ExecOptions) -> Result<CommandOutput, CommandError> {
    execute_streaming(inv, opts, |_| {})
}

/// Run `inv` to completion, calling `on_stdout` with each stdout line (newline
/// included) as it arrives. A non-zero exit is reported in the output, not as an error.
pub fn execute_streaming(
    inv: &Invocation,
    opts: &ExecOptions,
    mut on_stdout: impl FnMut(&str),
) -> Result<CommandOutput, CommandError> {
    let payload = opts.stdin.clone().or_else(|| inv.stdin.clone());
    let mut cmd = Command::new(&inv.program);
    cmd.args(&inv.args)
        .env("PAGEBEAM", "1")
        .stdin(if payload.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (k, v) in &opts.env {
        cmd.env(k, v);
    }
    if let Some(dir) = resolve_dir(inv.dir.as_deref(), opts.cwd.as_deref()) {
        cmd.current_dir(dir);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // Own process group so termination reaches grandchildren too.
        cmd.process_group(0);
    }
    log::debug!("spawn: {}", inv.display());
    let child = cmd.spawn().map_err(|source| CommandError::Spawn {
        program: inv.program.clone(),
        source,
    })?;
    let mut guard = ChildGuard::new(child);

    if let Some(payload) = payload {
        if let Some(mut stdin) = guard.child_mut().stdin.take() {
            thread::spawn(move || {
                // Broken pipe just means the child stopped reading early.
                let _ = stdin.write_all(payload.as_bytes());
            });
        }
    }

    let (tx, rx) = mpsc::channel::<std::io::Result<Vec<u8>>>();
    if let Some(stdout) = guard.child_mut().stdout.take() {
        thread::spawn(move || {
            let mut reader = BufReader::new(stdout);
            loop {
                let mut line = Vec::new();
                match reader.read_until(b'\n', &mut line) {
                    Ok(0) => break,
                    Ok(_) => {
                        if tx.send(Ok(line)).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        break;
                    }
                }
            }
        });
    }
    let (err_tx, err_rx) = mpsc::channel::<Vec<u8>>();
    if let Some(mut stderr) = guard.child_mut().stderr.take() {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf);
            let _ = err_tx.send(buf);
        });
    }

    let started = Instant::now();
    let mut stdout_buf: Vec<u8> = Vec::new();
    let mut pipe_error: Option<std::io::Error> = None;
    let mut take_chunk = |chunk: std::io::Result<Vec<u8>>, buf: &mut Vec<u8>| match chunk {
        Ok(bytes) => {
            on_stdout(&String::from_utf8_lossy(&bytes));
            buf.extend_from_slice(&bytes);
        }
        Err(e) => pipe_error = Some(e),
    };

    // The leader exiting does not end the call: helpers it left in the process
    // group may still hold stdout open. They get TERM, then KILL after a grace
    // period, and cancel and timeout keep applying until the pipe closes.
    let mut exit: Option<ExitStatus> = None;
    let mut exited_at: Option<Instant> = None;
    let mut escalated = false;
    let status: ExitStatus = loop {
        if opts.cancel.as_ref().map(|c| c.is_cancelled()).unwrap_or(false) {
            log::debug!("cancelled: {}", inv.display());
            guard.terminate();
            return Err(CommandError::Cancelled);
        }
        if let Some(limit) = opts.timeout {
            if started.elapsed() >= limit {
                log::warn!("timed out after {}ms: {}", limit.as_millis(), inv.display());
                guard.terminate();
                return Err(CommandError::Timeout(limit));
            }
        }
        match exited_at {
            None => {
                if let Some(st) = guard.child_mut().try_wait()? {
                    guard.reaped();
                    guard.signal_group("TERM");
                    exit = Some(st);
                    exited_at = Some(Instant::now());
                }
            }
            Some(at) if !escalated && at.elapsed() >= GRACE => {
                log::debug!("group still holds stdout, killing: {}", inv.display());
                guard.signal_group("KILL");
                escalated = true;
            }
            Some(_) => {}
        }
        match rx.recv_timeout(POLL) {
            Ok(chunk) => take_chunk(chunk, &mut stdout_buf),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => match exit {
                Some(st) => break st,
                None => thread::sleep(POLL),
            },
        }
    };

    if let Some(e) = pipe_error {
        return Err(CommandError::Io(e));
    }
    let stderr = err_rx
        .recv_timeout(GRACE)
        .map(|b| String::from_utf8_lossy(&b).into_owned())
        .unwrap_or_default();
    let code = status.code().unwrap_or(-1);
    log::debug!("exit {code}: {}", inv.display());
    Ok(CommandOutput {
        code,
        stdout: String::from_utf8_lossy(&stdout_buf).into_owned(),
        stderr,
    })
}

/// Completion of a foreground `run` command.
#[derive(Debug)]
pub struct RunMsg {
    pub ticket: u64,
    pub outcome: Result<CommandOutput, CommandError>,
}

/// Run on a worker thread and report the outcome over `tx`.
pub fn spawn_execute(ticket: u64, inv: Invocation, opts: ExecOptions, tx: Sender<RunMsg>) {
    thread::spawn(move || {
        let outcome = execute(&inv, &opts);
        let _ = tx.send(RunMsg { ticket, outcome });
    });
}

fn resolve_dir(dir: Option<&Path>, base: Option<&Path>) -> Option<PathBuf> {
    match (dir, base) {
        (Some(d), _) if d.is_absolute() => Some(d.to_path_buf()),
        (Some(d), Some(b)) => Some(b.join(d)),
        (Some(d), None) => Some(d.to_path_buf()),
        (None, Some(b)) => Some(b.to_path_buf()),
        (None, None) => None,
    }
}

/// Owns a spawned child. Dropping it before the child was reaped kills the child
/// and its process group.
struct ChildGuard {
    child: Child,
    pgid: u32,
    done: bool,
}

impl ChildGuard {
    fn new(child: Child) -> Self {
        let pgid = child.id();
        Self {
            child,
            pgid,
            done: false,
        }
    }

    fn child_mut(&mut self) -> &mut Child {
        &mut self.child
    }

    fn reaped(&mut self) {
        self.done = true;
    }

    /// Send `signal` to every process in the child's group.
    #[cfg(unix)]
    fn signal_group(&self, signal: &str) {
        let target = format!("-{}", self.pgid);
        match Command::new("kill")
            .args([&format!("-{signal}"), "--", &target])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(st) if st.success() => {}
            // An empty group is the common case once the leader exited alone.
            Ok(st) => log::debug!("kill -{signal} {target}: {st}"),
            Err(e) => log::debug!("kill -{signal} {target}: {e}"),
        }
    }

    #[cfg(not(unix))]
    fn signal_group(&self, _signal: &str) {}

    fn terminate(&mut self) {
        self.signal_group("KILL");
        if self.done {
            return;
        }
        if let Err(e) = self.child.kill() {
            log::debug!("kill {}: {e}", self.pgid);
        }
        let _ = self.child.wait();
        self.done = true;
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if !self.done {
            self.terminate();
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Invocation {
        Invocation::new("sh").with_args(["-c", script])
    }

    #[test]
    fn captures_stdout_stderr_and_exit_code() {
        let out = execute(
            &sh("printf 'out\\n'; printf 'err' >&2; exit 3"),
            &ExecOptions::default(),
        )
        .unwrap();
        assert_eq!(out.code, 3);
        assert!(!out.success());
        assert_eq!(out.stdout, "out\n");
        assert_eq!(out.stderr, "err");
    }

    #[test]
    fn stdin_payload_and_override() {
        let mut inv = Invocation::new("cat");
        inv.stdin = Some("from invocation".into());
        let out = execute(&inv, &ExecOptions::default()).unwrap();
        assert_eq!(out.stdout, "from invocation");

        let opts = ExecOptions {
            stdin: Some("override".into()),
            ..Default::default()
        };
        let out = execute(&inv, &opts).unwrap();
        assert_eq!(out.stdout, "override");
    }

    #[test]
    fn stdin_is_closed_without_payload() {
        // `cat` would block forever on an inherited terminal.
        let out = execute(&Invocation::new("cat"), &ExecOptions::default()).unwrap();
        assert!(out.success());
        assert_eq!(out.stdout, "");
    }

    #[test]
    fn streams_lines_incrementally() {
        let mut seen = Vec::new();
        let out = execute_streaming(
            &sh("printf 'a\\n'; printf 'b\\n'"),
            &ExecOptions::default(),
            |chunk| seen.push(chunk.to_string()),
        )
        .unwrap();
        assert_eq!(seen, vec!["a\n".to_string(), "b\n".to_string()]);
        assert_eq!(out.stdout, "a\nb\n");
    }

    #[test]
    fn missing_program_is_spawn_error() {
        let err = execute(
            &Invocation::new("pagebeam-definitely-not-a-program"),
            &ExecOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CommandError::Spawn { .. }));
    }

    #[test]
    fn timeout_kills_process() {
        let started = Instant::now();
        let opts = ExecOptions {
            timeout: Some(Duration::from_millis(200)),
            ..Default::default()
        };
        let err = execute(&sh("sleep 5"), &opts).unwrap_err();
        assert!(matches!(err, CommandError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn cancelling_parent_token_cancels_child_command() {
        let page = CancelToken::new();
        let opts = ExecOptions {
            cancel: Some(page.child()),
            ..Default::default()
        };
        let canceller = page.clone();
        let h = thread::spawn(move || {
            thread::sleep(Duration::from_millis(150));
            canceller.cancel();
        });
        let started = Instant::now();
        let err = execute(&sh("sleep 5"), &opts).unwrap_err();
        h.join().unwrap();
        assert!(matches!(err, CommandError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn relative_dir_resolves_against_cwd() {
        let base = tempfile::tempdir().unwrap();
        std::fs::create_dir(base.path().join("sub")).unwrap();
        let mut inv = Invocation::new("pwd");
        inv.dir = Some(PathBuf::from("sub"));
        let opts = ExecOptions {
            cwd: Some(base.path().to_path_buf()),
            ..Default::default()
        };
        let out = execute(&inv, &opts).unwrap();
        assert!(out.stdout.trim_end().ends_with("sub"));
    }

    #[test]
    fn spawned_command_reports_ticket() {
        let (tx, rx) = mpsc::channel();
        spawn_execute(9, sh("echo ok"), ExecOptions::default(), tx);
        let msg = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(msg.ticket, 9);
        assert_eq!(msg.outcome.unwrap().stdout, "ok\n");
    }

    #[test]
    fn extra_env_is_visible() {
        let opts = ExecOptions {
            env: vec![("GREETING".into(), "hi".into())],
            ..Default::default()
        };
        let out = execute(&sh("printf '%s %s' \"$GREETING\" \"$PAGEBEAM\""), &opts).unwrap();
        assert_eq!(out.stdout, "hi 1");
    }

    /// True once `pid` has exited (gone, or a zombie awaiting its new parent).
    fn is_dead(pid: &str) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => stat
                .rsplit(')')
                .next()
                .map(|rest| rest.trim_start().starts_with('Z'))
                .unwrap_or(false),
            Err(_) => true,
        }
    }

    #[test]
    fn backgrounded_helper_does_not_outlive_the_call() {
        let started = Instant::now();
        let opts = ExecOptions {
            timeout: Some(Duration::from_millis(300)),
            ..Default::default()
        };
        let out = execute(&sh("sleep 5 & echo $!"), &opts).unwrap();
        assert!(started.elapsed() < Duration::from_secs(3));
        let pid = out.stdout.trim();
        assert!(!pid.is_empty());
        if std::path::Path::new("/proc").exists() {
            assert!(is_dead(pid), "helper {pid} still running");
        }
    }

    #[test]
    fn helper_ignoring_term_is_killed_after_grace() {
        let started = Instant::now();
        let out = execute(
            &sh("(trap '' TERM; sleep 5) & echo hi"),
            &ExecOptions::default(),
        )
        .unwrap();
        assert_eq!(out.stdout, "hi\n");
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn timeout_applies_while_helper_holds_stdout() {
        let started = Instant::now();
        let opts = ExecOptions {
            timeout: Some(Duration::from_millis(200)),
            ..Default::default()
        };
        let err = execute(&sh("(trap '' TERM; sleep 5) & echo hi"), &opts).unwrap_err();
        assert!(matches!(err, CommandError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn cancel_applies_while_helper_holds_stdout() {
        let token = CancelToken::new();
        let opts = ExecOptions {
            cancel: Some(token.clone()),
            ..Default::default()
        };
        let h = thread::spawn(move || {
            thread::sleep(Duration::from_millis(150));
            token.cancel();
        });
        let started = Instant::now();
        let err = execute(&sh("(trap '' TERM; sleep 5) & echo hi"), &opts).unwrap_err();
        h.join().unwrap();
        assert!(matches!(err, CommandError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}
