//! Worker process manager: spawns detached worker processes, tracks them in
//! the roster, and signals them to stop.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::persistence::{PersistenceError, RosterStore, WorkerRecord};
use crate::process;

/// The program and arguments that start one worker process.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

/// Result of signalling one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct StopOutcome {
    pub pid: u32,
    pub stopped: bool,
}

/// Errors from the worker process manager.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("roster: {0}")]
    Roster(#[from] PersistenceError),

    #[error("failed to spawn worker {program:?}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Tracks the worker processes running on this host.
#[derive(Debug, Clone)]
pub struct WorkerSupervisor {
    roster: RosterStore,
    command: WorkerCommand,
}

impl WorkerSupervisor {
    pub fn new(roster: RosterStore, command: WorkerCommand) -> Self {
        Self { roster, command }
    }

    /// Launch `count` workers that outlive the calling process.
    ///
    /// Each worker is added to the roster as soon as it starts; if a later
    /// spawn fails, the ones already running are still recorded.
    pub async fn spawn(&self, count: usize) -> Result<Vec<WorkerRecord>, SupervisorError> {
        let mut roster = self.roster.load().await?;
        let mut spawned = Vec::with_capacity(count);

        for _ in 0..count {
            match self.spawn_detached() {
                Ok(pid) => {
                    let record = WorkerRecord::new(pid);
                    tracing::info!(pid, "spawned worker");
                    roster.push(record.clone());
                    spawned.push(record);
                }
                Err(e) => {
                    self.roster.save(&roster).await?;
                    return Err(e);
                }
            }
        }

        self.roster.save(&roster).await?;
        Ok(spawned)
    }

    /// Workers that are still running. Dead entries are pruned from the roster.
    pub async fn list_active(&self) -> Result<Vec<WorkerRecord>, SupervisorError> {
        let roster = self.roster.load().await?;
        let before = roster.len();

        let active: Vec<WorkerRecord> = roster
            .into_iter()
            .filter(|record| process::is_alive(record.pid))
            .collect();

        if active.len() != before {
            tracing::debug!(pruned = before - active.len(), "pruned dead workers");
        }
        self.roster.save(&active).await?;
        Ok(active)
    }

    /// Send a graceful stop to every active worker.
    ///
    /// Signalled workers leave the roster; a worker that could not be signalled
    /// stays and is reported with `stopped: false`.
    pub async fn stop_all(&self) -> Result<Vec<StopOutcome>, SupervisorError> {
        let active = self.list_active().await?;
        let mut remaining = Vec::new();
        let mut outcomes = Vec::with_capacity(active.len());

        for record in active {
            match process::terminate(record.pid) {
                Ok(()) => {
                    tracing::info!(pid = record.pid, "sent stop signal");
                    outcomes.push(StopOutcome {
                        pid: record.pid,
                        stopped: true,
                    });
                }
                Err(e) => {
                    tracing::warn!(pid = record.pid, "failed to signal worker: {}", e);
                    outcomes.push(StopOutcome {
                        pid: record.pid,
                        stopped: false,
                    });
                    remaining.push(record);
                }
            }
        }

        self.roster.save(&remaining).await?;
        Ok(outcomes)
    }

    // The child is never waited on; it is reparented once this process exits.
    #[allow(clippy::zombie_processes)]
    fn spawn_detached(&self) -> Result<u32, SupervisorError> {
        let mut cmd = Command::new(&self.command.program);
        cmd.args(&self.command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // Own process group, so a Ctrl-C in the launching terminal skips it.
            cmd.process_group(0);
        }

        let child = cmd.spawn().map_err(|source| SupervisorError::Spawn {
            program: self.command.program.clone(),
            source,
        })?;
        Ok(child.id())
    }
}
