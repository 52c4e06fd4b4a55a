use crate::errors::{BranchesError, Result};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Captured result of an external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Seam for every external process the tool starts (git, fzf, gh, delta...).
pub trait Runner {
    /// Run `argv` to completion. With `check`, a non-zero exit becomes
    /// [`BranchesError::CommandFailed`].
    fn run(&self, argv: &[&str], cwd: Option<&Path>, check: bool) -> Result<CommandOutput>;

    /// Like `run` without `check`, but the child is killed once `timeout`
    /// elapses.
    fn run_with_timeout(&self, argv: &[&str], timeout: Duration) -> Result<CommandOutput>;

    /// Feed `input` on stdin and capture stdout. Stderr stays attached to the
    /// terminal so interactive programs can draw on it.
    fn pipe(&self, argv: &[&str], input: &str) -> Result<CommandOutput>;

    /// Whether `program` resolves on `PATH`.
    fn which(&self, program: &str) -> bool;
}

pub struct SystemRunner;

impl SystemRunner {
    fn command(argv: &[&str], cwd: Option<&Path>) -> Result<Command> {
        let (program, args) = argv.split_first().ok_or_else(|| {
            BranchesError::Spawn(
                String::new(),
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
            )
        })?;
        let mut command = Command::new(program);
        command.args(args);
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }
        Ok(command)
    }

    fn capture(output: std::process::Output) -> CommandOutput {
        CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            code: output.status.code().unwrap_or(-1),
        }
    }
}

impl Runner for SystemRunner {
    fn run(&self, argv: &[&str], cwd: Option<&Path>, check: bool) -> Result<CommandOutput> {
        log::debug!("running `{}`", argv.join(" "));
        let output = Self::command(argv, cwd)?
            .stdin(Stdio::null())
            .output()
            .map_err(|e| BranchesError::Spawn(argv.join(" "), e))?;
        let result = Self::capture(output);

        if check && !result.success() {
            return Err(BranchesError::CommandFailed {
                argv: argv.join(" "),
                code: result.code,
                stderr: result.stderr.trim().to_string(),
            });
        }
        Ok(result)
    }

    fn run_with_timeout(&self, argv: &[&str], timeout: Duration) -> Result<CommandOutput> {
        log::debug!("running `{}` (timeout {:?})", argv.join(" "), timeout);
        let mut child = Self::command(argv, None)?
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| BranchesError::Spawn(argv.join(" "), e))?;

        let deadline = Instant::now() + timeout;
        loop {
            if child.try_wait()?.is_some() {
                let output = child.wait_with_output()?;
                return Ok(Self::capture(output));
            }
            if Instant::now() >= deadline {
                log::debug!("`{}` timed out", argv.join(" "));
                let _ = child.kill();
                let _ = child.wait();
                return Ok(CommandOutput {
                    stdout: String::new(),
                    stderr: "timed out".to_string(),
                    code: -1,
                });
            }
            std::thread::sleep(Duration::from_millis(20));
        }
    }

    fn pipe(&self, argv: &[&str], input: &str) -> Result<CommandOutput> {
        log::debug!("piping {} bytes into `{}`", input.len(), argv.join(" "));
        let mut child = Self::command(argv, None)?
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| BranchesError::Spawn(argv.join(" "), e))?;

        if let Some(mut stdin) = child.stdin.take() {
            // The reader may exit before consuming everything (fzf -1 does).
            if let Err(e) = stdin.write_all(input.as_bytes()) {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(e.into());
                }
            }
        }

        let output = child.wait_with_output()?;
        Ok(Self::capture(output))
    }

    fn which(&self, program: &str) -> bool {
        let path_var = std::env::var("PATH").unwrap_or_default();
        std::env::split_paths(&path_var).any(|dir| dir.join(program).is_file())
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::rc::Rc;
    use std::sync::Mutex;

    /// Scripted runner: replies are matched on the longest registered prefix
    /// of the space-joined argv. Unmatched commands succeed with no output.
    pub struct MockRunner {
        responses: Vec<(String, CommandOutput)>,
        installed: Vec<String>,
        calls: Mutex<Vec<String>>,
        inputs: Mutex<Vec<String>>,
    }

    impl MockRunner {
        pub fn new() -> Self {
            Self {
                responses: Vec::new(),
                installed: Vec::new(),
                calls: Mutex::new(Vec::new()),
                inputs: Mutex::new(Vec::new()),
            }
        }

        pub fn respond(mut self, prefix: &str, stdout: &str) -> Self {
            self.responses.push((
                prefix.to_string(),
                CommandOutput {
                    stdout: stdout.to_string(),
                    ..CommandOutput::default()
                },
            ));
            self
        }

        pub fn fail(mut self, prefix: &str, code: i32) -> Self {
            self.responses.push((
                prefix.to_string(),
                CommandOutput {
                    code,
                    stderr: "mock failure".to_string(),
                    ..CommandOutput::default()
                },
            ));
            self
        }

        pub fn with_program(mut self, program: &str) -> Self {
            self.installed.push(program.to_string());
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn inputs(&self) -> Vec<String> {
            self.inputs.lock().unwrap().clone()
        }

        pub fn called(&self, prefix: &str) -> bool {
            self.calls().iter().any(|c| c.starts_with(prefix))
        }

        fn reply(&self, argv: &[&str]) -> CommandOutput {
            let joined = argv.join(" ");
            self.calls.lock().unwrap().push(joined.clone());
            self.responses
                .iter()
                .filter(|(prefix, _)| joined.starts_with(prefix.as_str()))
                .max_by_key(|(prefix, _)| prefix.len())
                .map(|(_, out)| out.clone())
                .unwrap_or_default()
        }
    }

    impl Runner for Rc<MockRunner> {
        fn run(&self, argv: &[&str], _cwd: Option<&Path>, check: bool) -> Result<CommandOutput> {
            let out = self.reply(argv);
            if check && !out.success() {
                return Err(BranchesError::CommandFailed {
                    argv: argv.join(" "),
                    code: out.code,
                    stderr: out.stderr,
                });
            }
            Ok(out)
        }

        fn run_with_timeout(&self, argv: &[&str], _timeout: Duration) -> Result<CommandOutput> {
            Ok(self.reply(argv))
        }

        fn pipe(&self, argv: &[&str], input: &str) -> Result<CommandOutput> {
            self.inputs.lock().unwrap().push(input.to_string());
            Ok(self.reply(argv))
        }

        fn which(&self, program: &str) -> bool {
            self.installed.iter().any(|p| p == program)
        }
    }
}
