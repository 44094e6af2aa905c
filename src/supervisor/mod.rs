//! Process supervision
//!
//! Spawns, waits on, and tears down backend engine child processes. The
//! teacher crate never launches a child process of its own (it only speaks
//! HTTP to already-running backends), so this module is grounded in the
//! wider example pack's use of `sysinfo` for cross-platform process
//! enumeration/kill-tree, composed with `tokio::process::Command` the way
//! the teacher already uses `tokio::spawn` for its other background tasks.

pub mod error;

pub use error::SupervisorError;

use std::net::TcpListener;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use sysinfo::{Pid, System};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

use crate::telemetry::{TelemetryExtractor, TelemetryRecord};

/// A running backend process, plus the port it was told to listen on.
pub struct ProcessHandle {
    pub pid: u32,
    pub port: u16,
    child: Child,
    stdout_telemetry: Arc<Mutex<Option<TelemetryRecord>>>,
}

impl ProcessHandle {
    /// Block until the process exits, returning its exit status.
    pub async fn wait(&mut self) -> Result<std::process::ExitStatus, SupervisorError> {
        Ok(self.child.wait().await?)
    }

    /// Non-blocking check of whether the process has already exited.
    pub fn try_wait(&mut self) -> Result<Option<std::process::ExitStatus>, SupervisorError> {
        Ok(self.child.try_wait()?)
    }

    /// The most recent telemetry parsed off this process's stdout debug
    /// lines (the NPU engine prints `ChatCompletionChunk: <json>` alongside
    /// its HTTP responses). `None` for engines that never print one.
    pub fn stdout_telemetry(&self) -> Option<TelemetryRecord> {
        self.stdout_telemetry.lock().ok().and_then(|g| g.clone())
    }
}

/// Spawns and reaps backend engine processes.
pub struct ProcessSupervisor;

impl ProcessSupervisor {
    /// Bind to port 0 to let the OS hand back an unused port, then release
    /// it immediately. There is a window where another process could grab
    /// the port before the caller binds it; the caller is expected to retry
    /// spawn on a bind failure.
    pub fn find_free_port() -> Result<u16, SupervisorError> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();
        drop(listener);
        Ok(port)
    }

    /// Spawn `program` with `args`, piping stdout/stderr so callers can
    /// stream engine logs, and return a handle once the OS has assigned a
    /// pid.
    pub fn spawn(program: &str, args: &[String]) -> Result<ProcessHandle, SupervisorError> {
        let mut child = Command::new(program)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let pid = child.id().unwrap_or_default();
        let stdout_telemetry = Arc::new(Mutex::new(None));

        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            let stdout_telemetry = stdout_telemetry.clone();
            tokio::spawn(async move {
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(pid, "engine stdout: {}", line);
                    if let Some(record) = TelemetryExtractor::from_stdout_debug_line(&line) {
                        if let Ok(mut slot) = stdout_telemetry.lock() {
                            *slot = Some(record);
                        }
                    }
                }
            });
        }
        if let Some(stderr) = child.stderr.take() {
            let mut lines = BufReader::new(stderr).lines();
            tokio::spawn(async move {
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::warn!(pid, "engine stderr: {}", line);
                }
            });
        }

        Ok(ProcessHandle {
            pid,
            port: 0,
            child,
            stdout_telemetry,
        })
    }

    /// Best-effort lookup of the pid listening on `port`, for diagnosing a
    /// stale lock file left by a crashed instance. Linux only; other
    /// platforms always return `None` rather than guess from a port-probe
    /// heuristic.
    pub fn pid_of_listener(port: u16) -> Option<u32> {
        #[cfg(target_os = "linux")]
        {
            let contents = std::fs::read_to_string("/proc/net/tcp").ok()?;
            let needle = format!(":{:04X}", port);
            for line in contents.lines().skip(1) {
                let fields: Vec<&str> = line.split_whitespace().collect();
                let local = fields.first()?;
                if !local.ends_with(&needle) {
                    continue;
                }
                let inode = fields.get(9)?;
                let mut system = System::new();
                system.refresh_processes(sysinfo::ProcessesToUpdate::All, true);
                for (pid, _process) in system.processes() {
                    let fd_dir = format!("/proc/{}/fd", pid);
                    if let Ok(entries) = std::fs::read_dir(&fd_dir) {
                        for entry in entries.flatten() {
                            if let Ok(link) = std::fs::read_link(entry.path()) {
                                if link.to_string_lossy().contains(&format!("socket:[{}]", inode))
                                {
                                    return Some(pid.as_u32());
                                }
                            }
                        }
                    }
                }
            }
            None
        }
        #[cfg(not(target_os = "linux"))]
        {
            None
        }
    }

    /// Send a graceful termination signal to `handle`'s whole process tree,
    /// then escalate to a hard kill of any survivors after `grace`.
    ///
    /// Children are enumerated and signaled *before* the parent: once the
    /// parent exits, its children are reparented (to init or a subreaper)
    /// and this function would otherwise lose track of them.
    pub async fn kill_tree(handle: &mut ProcessHandle, grace: std::time::Duration) {
        let children = child_pids(handle.pid);
        for pid in &children {
            signal_terminate(*pid);
        }

        #[cfg(unix)]
        {
            unsafe {
                libc_kill(handle.pid, 15);
            }
        }
        #[cfg(not(unix))]
        {
            let _ = handle.child.start_kill();
        }

        let parent_exited = tokio::time::timeout(grace, handle.wait()).await.is_ok();

        let mut system = System::new();
        system.refresh_processes(sysinfo::ProcessesToUpdate::All, true);
        for pid in &children {
            if let Some(process) = system.process(Pid::from_u32(*pid)) {
                process.kill();
            }
        }

        if !parent_exited {
            if let Some(process) = system.process(Pid::from_u32(handle.pid)) {
                process.kill();
            }
            let _ = handle.child.start_kill();
        }
    }
}

/// Pids of every process whose parent is `parent_pid`, per `sysinfo`'s
/// current process snapshot.
fn child_pids(parent_pid: u32) -> Vec<u32> {
    let mut system = System::new();
    system.refresh_processes(sysinfo::ProcessesToUpdate::All, true);
    let parent = Pid::from_u32(parent_pid);
    system
        .processes()
        .iter()
        .filter(|(_, process)| process.parent() == Some(parent))
        .map(|(pid, _)| pid.as_u32())
        .collect()
}

#[cfg(unix)]
fn signal_terminate(pid: u32) {
    unsafe {
        libc_kill(pid, 15);
    }
}

#[cfg(not(unix))]
fn signal_terminate(pid: u32) {
    let mut system = System::new();
    system.refresh_processes(sysinfo::ProcessesToUpdate::All, true);
    if let Some(process) = system.process(Pid::from_u32(pid)) {
        process.kill();
    }
}

#[cfg(unix)]
unsafe fn libc_kill(pid: u32, sig: i32) {
    extern "C" {
        fn kill(pid: i32, sig: i32) -> i32;
    }
    kill(pid as i32, sig);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_free_port_returns_nonzero() {
        let port = ProcessSupervisor::find_free_port().unwrap();
        assert!(port > 0);
    }

    #[tokio::test]
    async fn spawn_and_wait_true_command() {
        let mut handle = ProcessSupervisor::spawn("true", &[]).unwrap();
        let status = handle.wait().await.unwrap();
        assert!(status.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn kill_tree_reaps_a_spawned_child_process() {
        let mut handle = ProcessSupervisor::spawn(
            "sh",
            &["-c".to_string(), "sleep 300 & wait".to_string()],
        )
        .unwrap();
        // give the shell a moment to fork its sleep child
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        let children = child_pids(handle.pid);
        assert!(!children.is_empty(), "expected the shell to have spawned a child");

        ProcessSupervisor::kill_tree(&mut handle, std::time::Duration::from_secs(2)).await;

        let mut system = System::new();
        system.refresh_processes(sysinfo::ProcessesToUpdate::All, true);
        for pid in children {
            assert!(
                system.process(Pid::from_u32(pid)).is_none(),
                "child process {pid} should have been reaped"
            );
        }
    }
}
