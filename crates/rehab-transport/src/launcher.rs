//! Coaching agent process launch.

use std::{process::Stdio, sync::Arc, time::Duration};

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::Command,
};

/// Everything an agent process needs to join a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentLaunch {
    pub call_id: String,
    pub call_type: String,
    pub exercise: String,
    pub agent_token: String,
    pub agent_user_id: String,
}

impl AgentLaunch {
    /// Environment handed to the agent process.
    #[must_use]
    pub fn env(&self) -> [(&'static str, &str); 5] {
        [
            ("CALL_ID", self.call_id.as_str()),
            ("CALL_TYPE", self.call_type.as_str()),
            ("EXERCISE", self.exercise.as_str()),
            ("STREAM_AGENT_TOKEN", self.agent_token.as_str()),
            ("STREAM_AGENT_ID", self.agent_user_id.as_str()),
        ]
    }
}

/// Schedules a coaching agent for a call. Must not block the caller.
pub trait AgentLauncher: Send + Sync {
    fn launch(&self, launch: AgentLaunch);
}

/// Launcher used when no agent command is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledLauncher;

impl AgentLauncher for DisabledLauncher {
    fn launch(&self, launch: AgentLaunch) {
        tracing::warn!(call_id = %launch.call_id, "no agent command configured, agent not launched");
    }
}

/// Runs an external agent command after a grace period.
///
/// The delay gives the patient time to join the call first. Output lines of
/// the process are forwarded to the log.
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    program: String,
    args: Arc<[String]>,
    delay: Duration,
}

impl CommandLauncher {
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>, delay: Duration) -> Self {
        Self {
            program: program.into(),
            args: args.into(),
            delay,
        }
    }

    /// Parse a shell-style command line.
    ///
    /// Returns `None` for an empty or unbalanced command line.
    #[must_use]
    pub fn from_command_line(line: &str, delay: Duration) -> Option<Self> {
        let mut words = shlex::split(line)?.into_iter();
        let program = words.next()?;
        Some(Self::new(program, words.collect(), delay))
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Wait for the grace period, run the agent and forward its output.
    ///
    /// Returns the exit code, or `None` if it could not be started or was
    /// terminated by a signal.
    pub async fn run(&self, launch: AgentLaunch) -> Option<i32> {
        tracing::info!(call_id = %launch.call_id, delay = ?self.delay, "waiting for patient to join");
        tokio::time::sleep(self.delay).await;

        let mut child = match Command::new(&self.program)
            .args(self.args.iter())
            .envs(launch.env())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(program = %self.program, "agent launch failed: {e}");
                return None;
            }
        };
        tracing::info!(call_id = %launch.call_id, pid = child.id(), "agent process started");

        let stdout = child.stdout.take().map(|out| tokio::spawn(forward_lines(out)));
        let stderr = child.stderr.take().map(|err| tokio::spawn(forward_lines(err)));

        let status = child.wait().await;
        for task in [stdout, stderr].into_iter().flatten() {
            let _ = task.await;
        }

        match status {
            Ok(status) if status.success() => {
                tracing::info!(call_id = %launch.call_id, "agent finished cleanly");
                Some(0)
            }
            Ok(status) => {
                tracing::warn!(call_id = %launch.call_id, code = ?status.code(), "agent exited with failure");
                status.code()
            }
            Err(e) => {
                tracing::error!(call_id = %launch.call_id, "waiting on agent failed: {e}");
                None
            }
        }
    }
}

impl AgentLauncher for CommandLauncher {
    fn launch(&self, launch: AgentLaunch) {
        let launcher = self.clone();
        tokio::spawn(async move {
            launcher.run(launch).await;
        });
    }
}

async fn forward_lines<R: AsyncRead + Unpin>(reader: R) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => tracing::info!("[AGENT] {line}"),
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("agent output unreadable: {e}");
                break;
            }
        }
    }
}
