//! Command and result types for subprocess execution.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A structured command for programmatic execution.
///
/// # Example
///
/// ```rust
/// use vendor_deploy::StructuredCommand;
///
/// let cmd = StructuredCommand::new("dnf").args(["install", "-y", "net-snmp"]);
/// assert_eq!(cmd.program, "dnf");
/// assert_eq!(cmd.to_string(), "dnf install -y net-snmp");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredCommand {
    /// The program to execute (e.g., "dnf", "systemctl", "/opt/x/install.sh").
    pub program: String,

    /// Arguments to pass to the program.
    pub args: Vec<String>,

    /// Environment variables to set before execution (key, value pairs).
    pub env_vars: Vec<(String, String)>,

    /// Working directory for the child process. Inherited when `None`.
    pub working_dir: Option<PathBuf>,
}

impl StructuredCommand {
    /// Start building a command for `program` with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env_vars: Vec::new(),
            working_dir: None,
        }
    }

    /// Append a single argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Run the child from `dir`.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

impl fmt::Display for StructuredCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a finished subprocess.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was killed by a signal.
    pub exit_code: Option<i32>,

    /// Everything the process wrote to stdout.
    pub stdout: String,

    /// Everything the process wrote to stderr.
    pub stderr: String,
}

impl CommandOutput {
    /// A successful result with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed result with the given exit code and stderr.
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Whether the process exited with status 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stdout when present, stderr otherwise. Some tools report on stderr.
    pub fn combined_text(&self) -> &str {
        if self.stdout.trim().is_empty() {
            &self.stderr
        } else {
            &self.stdout
        }
    }
}
