use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::Context;
use serde::Serialize;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tape_tunnel_core::prelude::{DelegatedShutdownListener, ShutdownHandle};

const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// One row of the monitor log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessSample {
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    pub cpu_percent: f32,
    pub open_fds: usize,
    pub connections: usize,
}

/// Samples the resource use of the service under test on its own thread, once per second, until
/// it is stopped.
///
/// CPU, open file descriptors and sockets are summed over every process whose name contains the
/// monitored name, and written to a CSV file with the columns
/// `timestamp,cpu_percent,open_fds,connections`.
pub struct ProcessMonitor {
    shutdown_handle: ShutdownHandle,
    handle: JoinHandle<anyhow::Result<usize>>,
}

impl ProcessMonitor {
    pub fn start(process_name: &str, log_path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let shutdown_handle = ShutdownHandle::new();
        let listener = shutdown_handle.new_listener();
        let process_name = process_name.to_string();
        let log_path = log_path.into();

        let handle = std::thread::Builder::new()
            .name("process-monitor".to_string())
            .spawn(move || sample_until_shutdown(&process_name, &log_path, listener))
            .context("Failed to start the process monitor")?;

        Ok(Self {
            shutdown_handle,
            handle,
        })
    }

    /// Signal the monitor to stop and wait for it. Returns the number of samples written.
    pub fn stop(self) -> anyhow::Result<usize> {
        self.shutdown_handle.shutdown();
        self.handle
            .join()
            .map_err(|_| anyhow::anyhow!("Process monitor thread panicked"))?
    }
}

fn sample_until_shutdown(
    process_name: &str,
    log_path: &Path,
    mut listener: DelegatedShutdownListener,
) -> anyhow::Result<usize> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(log_path)
        .with_context(|| format!("Failed to create {}", log_path.display()))?;
    writer.write_record(["timestamp", "cpu_percent", "open_fds", "connections"])?;
    writer.flush()?;

    let mut sys = System::new();
    let mut samples = 0;

    log::debug!(
        "Monitoring processes named like {process_name} into {}",
        log_path.display()
    );

    while !listener.should_shutdown() {
        sys.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_cpu(),
        );

        writer.serialize(sample(&sys, process_name))?;
        writer.flush()?;
        samples += 1;

        wait_for_next_sample(&mut listener);
    }

    log::debug!("Process monitor stopped after {samples} samples");
    Ok(samples)
}

fn sample(sys: &System, process_name: &str) -> ProcessSample {
    let mut sample = ProcessSample {
        timestamp: chrono::Utc::now().timestamp_millis() as f64 / 1000.0,
        cpu_percent: 0.0,
        open_fds: 0,
        connections: 0,
    };

    for process in sys
        .processes()
        .values()
        .filter(|p| p.name().to_string_lossy().contains(process_name))
    {
        let (fds, sockets) = descriptor_counts(process.pid());
        sample.cpu_percent += process.cpu_usage();
        sample.open_fds += fds;
        sample.connections += sockets;
    }

    sample
}

fn wait_for_next_sample(listener: &mut DelegatedShutdownListener) {
    let started = Instant::now();
    while started.elapsed() < SAMPLE_INTERVAL {
        if listener.should_shutdown() {
            return;
        }
        std::thread::sleep(SHUTDOWN_POLL);
    }
}

/// Open file descriptors and sockets of a process. Processes that can't be inspected count zero.
#[cfg(target_os = "linux")]
pub fn descriptor_counts(pid: Pid) -> (usize, usize) {
    let Ok(entries) = std::fs::read_dir(format!("/proc/{pid}/fd")) else {
        return (0, 0);
    };

    let mut fds = 0;
    let mut sockets = 0;
    for entry in entries.flatten() {
        fds += 1;
        if std::fs::read_link(entry.path())
            .map(|target| target.to_string_lossy().starts_with("socket:"))
            .unwrap_or(false)
        {
            sockets += 1;
        }
    }

    (fds, sockets)
}

#[cfg(not(target_os = "linux"))]
pub fn descriptor_counts(_pid: Pid) -> (usize, usize) {
    (0, 0)
}
