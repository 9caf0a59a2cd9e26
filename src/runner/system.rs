//! [`ProcessRunner`] backed by real child processes.

use super::path_finder::find_program;
use super::{CommandOutput, ProcessRunner, RunnerError, StructuredCommand};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

const CHUNK_SIZE: usize = 8192;

/// Runs commands as real subprocesses.
///
/// Stdout and stderr are read while the child runs and each line, or
/// unterminated prompt, is emitted as a `tracing` event under the `subprocess` target, so
/// tool output lands in the log stream in real time. The full text is also
/// captured into the returned [`CommandOutput`]. Stdin is inherited so an
/// interactive vendor installer can still prompt the operator.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    timeout: Option<Duration>,
}

impl SystemRunner {
    /// A runner with no time limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill any command that runs longer than `limit`.
    pub fn with_timeout(limit: Duration) -> Self {
        Self {
            timeout: Some(limit),
        }
    }
}

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, command: &StructuredCommand) -> Result<CommandOutput, RunnerError> {
        let program = command.program.as_str();
        let path = find_program(program).ok_or_else(|| RunnerError::ProgramNotFound {
            program: program.to_string(),
        })?;

        let mut child_cmd = Command::new(&path);
        child_cmd
            .args(&command.args)
            .envs(command.env_vars.iter().cloned())
            .kill_on_drop(true)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &command.working_dir {
            child_cmd.current_dir(dir);
        }

        debug!(command = %command, path = %path.display(), "spawning");
        let io_err = |source| RunnerError::Io {
            program: program.to_string(),
            source,
        };
        let mut child = child_cmd.spawn().map_err(io_err)?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let finished = async {
            let (out, err) = futures::future::try_join(
                pump(stdout, program, "stdout"),
                pump(stderr, program, "stderr"),
            )
            .await?;
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, out, err))
        };

        let (status, stdout, stderr) = match self.timeout {
            Some(limit) => timeout(limit, finished)
                .await
                .map_err(|_| RunnerError::Timeout {
                    program: program.to_string(),
                    duration: limit,
                })?
                .map_err(io_err)?,
            None => finished.await.map_err(io_err)?,
        };

        debug!(command = %command, exit_code = ?status.code(), "finished");
        Ok(CommandOutput {
            exit_code: status.code(),
            stdout,
            stderr,
        })
    }
}

/// Forward the output of `reader` to the log and return the full text.
///
/// Complete lines are logged as they arrive. A trailing partial line is
/// logged as soon as the pipe drains, so a prompt waiting on stdin still
/// shows up.
async fn pump<R>(reader: Option<R>, program: &str, stream: &'static str) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return Ok(String::new());
    };

    let mut captured = String::new();
    let mut pending = Vec::new();
    let mut chunk = vec![0u8; CHUNK_SIZE];
    loop {
        let read = reader.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        pending.extend_from_slice(&chunk[..read]);

        while let Some(end) = pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = pending.drain(..=end).collect();
            // Installers are not guaranteed to emit UTF-8.
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\r', '\n']);
            info!(target: "subprocess", program, stream, "{line}");
            captured.push_str(line);
            captured.push('\n');
        }

        if !pending.is_empty() && read < CHUNK_SIZE {
            let partial = String::from_utf8_lossy(&pending).into_owned();
            pending.clear();
            info!(target: "subprocess", program, stream, "{partial}");
            captured.push_str(&partial);
        }
    }
    if !pending.is_empty() {
        let rest = String::from_utf8_lossy(&pending);
        info!(target: "subprocess", program, stream, "{rest}");
        captured.push_str(&rest);
    }
    Ok(captured)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_captures_stdout_and_exit_code() {
        let runner = SystemRunner::new();
        let cmd = StructuredCommand::new("sh").args(["-c", "echo one; echo two; exit 3"]);
        let output = runner.run(&cmd).await.unwrap();

        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout, "one\ntwo\n");
        assert!(!output.success());
    }

    #[tokio::test]
    async fn test_captures_stderr_separately() {
        let runner = SystemRunner::new();
        let cmd = StructuredCommand::new("sh").args(["-c", "echo oops >&2"]);
        let output = runner.run(&cmd).await.unwrap();

        assert!(output.success());
        assert!(output.stdout.is_empty());
        assert_eq!(output.stderr, "oops\n");
    }

    #[tokio::test]
    async fn test_runs_in_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let runner = SystemRunner::new();
        let cmd = StructuredCommand::new("pwd").current_dir(dir.path());
        let output = runner.run(&cmd).await.unwrap();

        let reported = std::path::PathBuf::from(output.stdout.trim());
        assert_eq!(
            reported.canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }

    #[tokio::test]
    async fn test_missing_program() {
        let runner = SystemRunner::new();
        let cmd = StructuredCommand::new("definitely_not_a_real_program_12345");
        let result = runner.run(&cmd).await;
        assert!(matches!(result, Err(RunnerError::ProgramNotFound { .. })));
    }

    #[derive(Clone, Default)]
    struct SharedLog(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for SharedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_logs_prompt_without_newline() {
        let log = SharedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let runner = SystemRunner::with_timeout(Duration::from_millis(1500));
        let cmd = StructuredCommand::new("sh").args(["-c", "printf 'Accept the EULA? [y/N] '; sleep 5"]);
        let result = runner.run(&cmd).await;
        assert!(matches!(result, Err(RunnerError::Timeout { .. })));

        let text = String::from_utf8(log.0.lock().unwrap().clone()).unwrap();
        assert!(text.contains("Accept the EULA? [y/N]"), "{text}");
    }

    #[tokio::test]
    async fn test_partial_output_is_captured_verbatim() {
        let runner = SystemRunner::new();
        let cmd = StructuredCommand::new("sh").args(["-c", "printf 'ready? '; sleep 0.2; echo yes"]);
        let output = runner.run(&cmd).await.unwrap();
        assert_eq!(output.stdout, "ready? yes\n");
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let runner = SystemRunner::with_timeout(Duration::from_millis(50));
        let cmd = StructuredCommand::new("sleep").arg("5");
        let result = runner.run(&cmd).await;
        assert!(matches!(result, Err(RunnerError::Timeout { .. })));
    }
}
