use crate::error::SchemaError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Wire form of a process invocation: a shell-style line, an argv array, or an
/// explicit `{args, input, dir}` object. Kept as sent so re-encoding is lossless;
/// everything downstream consumes the normalized [`Invocation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Command {
    Line(String),
    Argv(Vec<String>),
    Spec(CommandSpec),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CommandSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

/// Canonical `(program, args, dir, stdin)` shape handed to the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub dir: Option<PathBuf>,
    pub stdin: Option<String>,
}

impl Command {
    pub fn to_invocation(&self) -> Result<Invocation, SchemaError> {
        self.normalize_at("command")
    }

    pub(crate) fn normalize_at(&self, path: &str) -> Result<Invocation, SchemaError> {
        let (parts, stdin, dir) = match self {
            Command::Line(line) => {
                let parts = shlex::split(line)
                    .ok_or_else(|| SchemaError::new(path, "unbalanced quotes in command line"))?;
                (parts, None, None)
            }
            Command::Argv(argv) => (argv.clone(), None, None),
            Command::Spec(spec) => (
                spec.args.clone().unwrap_or_default(),
                spec.input.clone(),
                spec.dir.clone(),
            ),
        };
        let mut it = parts.into_iter();
        let program = it
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| SchemaError::new(path, "empty command"))?;
        Ok(Invocation {
            program,
            args: it.collect(),
            dir: dir.map(PathBuf::from),
            stdin,
        })
    }
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            dir: None,
            stdin: None,
        }
    }

    #[cfg(test)]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn from_argv(argv: Vec<String>) -> Option<Self> {
        let mut it = argv.into_iter();
        let program = it.next()?;
        Some(Self {
            program,
            args: it.collect(),
            dir: None,
            stdin: None,
        })
    }

    /// Apply `f` to every textual part. Program, each argument, the working dir and
    /// the stdin payload are rewritten independently, so a substituted value with
    /// spaces stays a single argument.
    pub fn try_map<E>(&self, mut f: impl FnMut(&str) -> Result<String, E>) -> Result<Self, E> {
        let program = f(&self.program)?;
        let args = self
            .args
            .iter()
            .map(|a| f(a))
            .collect::<Result<Vec<_>, E>>()?;
        let dir = match &self.dir {
            Some(d) => Some(PathBuf::from(f(&d.to_string_lossy())?)),
            None => None,
        };
        let stdin = match &self.stdin {
            Some(s) => Some(f(s)?),
            None => None,
        };
        Ok(Self {
            program,
            args,
            dir,
            stdin,
        })
    }

    /// Shell-quoted rendering for logs and status lines.
    pub fn display(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|s| {
                shlex::try_quote(s)
                    .map(|q| q.into_owned())
                    .unwrap_or_else(|_| s.clone())
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}
