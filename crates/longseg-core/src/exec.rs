//! Typed external-operation interface.
//!
//! Every registration, resampling, segmentation, and atrophy step is an
//! opaque child process that communicates through the file system. This
//! module gives those invocations a uniform shape: a [`ToolInvocation`]
//! describes the command and the outputs it must produce, a [`ToolRunner`]
//! executes it, and [`run_checked`] turns a non-zero exit or a missing
//! expected output into a structured error instead of silent downstream
//! file absence.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, warn};

use crate::error::{LongsegError, Result};

/// One external tool invocation, fully described up front.
#[derive(Clone, Debug)]
pub struct ToolInvocation {
    /// Short tool label used in logs and errors.
    pub tool: String,
    /// Program to execute (bare name or absolute path).
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Working directory; relative output names are resolved against it.
    pub cwd: Option<PathBuf>,
    /// Environment prepared for the child (e.g. `FREESURFER_HOME`).
    pub envs: Vec<(String, String)>,
    /// Files or directories that must exist after a successful run.
    pub expected_outputs: Vec<PathBuf>,
}

impl ToolInvocation {
    pub fn new(tool: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self {
            tool: tool.into(),
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            envs: Vec::new(),
            expected_outputs: Vec::new(),
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

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn expect_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.expected_outputs.push(path.into());
        self
    }

    /// Expected outputs resolved against the working directory.
    pub fn resolved_outputs(&self) -> Vec<PathBuf> {
        self.expected_outputs
            .iter()
            .map(|p| {
                if p.is_absolute() {
                    p.clone()
                } else {
                    match &self.cwd {
                        Some(cwd) => cwd.join(p),
                        None => p.clone(),
                    }
                }
            })
            .collect()
    }
}

/// Result of one tool invocation; the exit status is the only in-process
/// progress signal external operations provide.
#[derive(Clone, Debug)]
pub struct ToolOutcome {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutcome {
    pub fn status_label(&self) -> String {
        match self.code {
            Some(code) => format!("exit code {code}"),
            None => "termination by signal".to_string(),
        }
    }
}

/// Executes tool invocations. The trait seam exists so stage drivers can be
/// exercised in tests without FreeSurfer or FSL installed.
pub trait ToolRunner: Send + Sync {
    fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutcome>;
}

/// Runs invocations as blocking child processes with captured stdio.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutcome> {
        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args);
        if let Some(ref cwd) = invocation.cwd {
            command.current_dir(cwd);
        }
        for (key, value) in &invocation.envs {
            command.env(key, value);
        }
        debug!(tool = %invocation.tool, args = ?invocation.args, "invoking");
        let output = command.output()?;
        Ok(ToolOutcome {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Run an invocation and verify both its exit status and its expected
/// outputs, translating failure into a structured error.
pub fn run_checked(runner: &dyn ToolRunner, invocation: &ToolInvocation) -> Result<ToolOutcome> {
    let outcome = runner.run(invocation)?;
    if !outcome.success {
        warn!(
            tool = %invocation.tool,
            status = %outcome.status_label(),
            stderr = %outcome.stderr.trim(),
            "external tool failed"
        );
        return Err(LongsegError::ToolFailed {
            tool: invocation.tool.clone(),
            status: outcome.status_label(),
        });
    }
    let missing: Vec<PathBuf> = invocation
        .resolved_outputs()
        .into_iter()
        .filter(|p| !exists(p))
        .collect();
    if !missing.is_empty() {
        return Err(LongsegError::MissingOutputs {
            tool: invocation.tool.clone(),
            missing,
        });
    }
    Ok(outcome)
}

fn exists(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}
