use crate::error::Error;

/// Captured result of an external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs OS commands. Everything this tool does to the system goes through
/// here, so tests can swap in a recording fake.
pub trait CommandRunner {
    async fn output(&self, program: &str, args: &[&str]) -> Result<CommandOutput, Error>;

    /// Like [`CommandRunner::output`], but a non-zero exit is an error.
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, Error> {
        let output = self.output(program, args).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(Error::CommandFailed {
                command: command_line(program, args),
                code: output.code,
                stderr: output.stderr,
            })
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    async fn output(&self, program: &str, args: &[&str]) -> Result<CommandOutput, Error> {
        let command = command_line(program, args);
        tracing::debug!("running `{command}`");

        let output = tokio::process::Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|source| Error::Spawn {
                command: command.clone(),
                source,
            })?;

        let output = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        tracing::trace!("`{command}` exited with {:?}", output.code);

        Ok(output)
    }
}

pub fn command_line(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}


#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::{fake::*, *};

    #[tokio::test]
    async fn test_system_runner_captures_output() {
        let output = SystemRunner
            .output("sh", &["-c", "echo hello; echo oops >&2; exit 3"])
            .await
            .unwrap();
        assert_eq!(output.code, Some(3));
        assert_eq!(output.stdout, "hello\n");
        assert_eq!(output.stderr, "oops\n");
        assert!(!output.success());
    }

    #[tokio::test]
    async fn test_system_runner_missing_program() {
        let e = SystemRunner
            .output("definitely-not-a-real-program", &[])
            .await
            .expect_err("spawn should fail");
        assert!(matches!(e, Error::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_run_reports_failure() {
        let runner = FakeRunner::default().respond("launchctl load x", failed(5, "nope"));
        let e = runner
            .run("launchctl", &["load", "x"])
            .await
            .expect_err("non-zero exit");
        match e {
            Error::CommandFailed { command, code, stderr } => {
                assert_eq!(command, "launchctl load x");
                assert_eq!(code, Some(5));
                assert_eq!(stderr, "nope");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(runner.calls(), ["launchctl load x"]);
    }
}
