//! 外部命令描述
//!
//! A [`CommandSpec`] says what to launch and where its output goes; the
//! supervisor decides when and how it is stopped.

use anyhow::{Context, Result};
use std::fs::File;
use std::path::PathBuf;
use std::process::Stdio;

/// Destination of a child's stdout or stderr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    Inherit,
    Null,
    /// Collected by a reader thread and returned in the stage report.
    Capture,
    /// Truncated and written to a log file.
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    pub stdout: Redirect,
    pub stderr: Redirect,
    /// Forward captured lines to the log as they arrive.
    pub echo: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            stdout: Redirect::Capture,
            stderr: Redirect::Capture,
            echo: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn stdout(mut self, redirect: Redirect) -> Self {
        self.stdout = redirect;
        self
    }

    pub fn stderr(mut self, redirect: Redirect) -> Self {
        self.stderr = redirect;
        self
    }

    pub fn echo(mut self) -> Self {
        self.echo = true;
        self
    }

    /// Shell-like rendering for logs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub(crate) fn open_redirect(redirect: &Redirect) -> Result<Stdio> {
    Ok(match redirect {
        Redirect::Inherit => Stdio::inherit(),
        Redirect::Null => Stdio::null(),
        Redirect::Capture => Stdio::piped(),
        Redirect::File(path) => {
            let file = File::create(path)
                .with_context(|| format!("无法创建日志文件: {}", path.display()))?;
            Stdio::from(file)
        }
    })
}
