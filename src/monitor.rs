use std::{
    fmt::Write as _,
    io::Write,
    path::{Path, PathBuf},
    time::SystemTime,
};

use chrono::{Local, TimeZone};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::{
    io::{AsyncBufRead, Lines},
    sync::mpsc,
    time::MissedTickBehavior,
};

use crate::{config::MonitorConfig, dhcp_parsers::leases, error::Error, model::Lease};

pub async fn read_leases<P>(path: P) -> Result<Vec<Lease>, Error>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let buf = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::io(path, e))?;
    Ok(leases::parse(&buf)?)
}

pub fn format_leases<Tz>(leases: &[Lease], tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let rule = "-".repeat(80);
    let mut out = String::from("Current DHCP Leases:\n");
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(
        out,
        "{:<15} {:<18} {:<20} Lease Expires",
        "IP Address", "MAC Address", "Hostname"
    );
    let _ = writeln!(out, "{rule}");

    for lease in leases {
        let ip = lease
            .ip_address
            .map_or_else(|| "N/A".to_string(), |ip| ip.to_string());
        let mac = lease
            .hw_address
            .map_or_else(|| "N/A".to_string(), |mac| mac.to_string());
        let name = lease.name.as_deref().unwrap_or("N/A");
        let expires = lease.ends.map_or_else(
            || "N/A".to_string(),
            |t| {
                t.with_timezone(tz)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string()
            },
        );
        let _ = writeln!(out, "{ip:<15} {mac:<18} {name:<20} {expires}");
    }

    out
}

/// Tracks the lease database between polls.
#[derive(Debug)]
pub struct LeaseWatcher {
    path: PathBuf,
    last_modified: Option<SystemTime>,
    snapshot: Option<Vec<Lease>>,
}

impl LeaseWatcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_modified: None,
            snapshot: None,
        }
    }

    /// Returns the leases when they differ from the last snapshot returned.
    /// The file is only re-parsed when its modification time moved.
    pub async fn poll(&mut self) -> Result<Option<&[Lease]>, Error> {
        let modified = tokio::fs::metadata(&self.path)
            .await
            .and_then(|m| m.modified())
            .map_err(|e| Error::io(&self.path, e))?;
        if self.last_modified == Some(modified) {
            return Ok(None);
        }

        let leases = read_leases(&self.path).await?;
        self.last_modified = Some(modified);
        if self.snapshot.as_ref() == Some(&leases) {
            tracing::debug!("{} touched but leases unchanged", self.path.display());
            return Ok(None);
        }

        self.snapshot = Some(leases);
        Ok(self.snapshot.as_deref())
    }
}

/// The live lease display: prints the table whenever the lease database
/// changes, until the operator enters `q` or input ends.
#[derive(Debug)]
pub struct Monitor {
    config: MonitorConfig,
}

impl Monitor {
    pub fn new(config: MonitorConfig) -> Self {
        Self { config }
    }

    pub async fn run<R, W>(&self, input: &mut Lines<R>, out: &mut W) -> Result<(), Error>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let mut watcher = LeaseWatcher::new(&self.config.leases);
        let (_fs_watcher, mut events) = self.fs_events();
        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        writeln!(out, "Monitoring DHCP leases. Enter Q to return to the menu.")
            .map_err(|e| Error::io("<stdout>", e))?;

        loop {
            tokio::select! {
                biased;

                _ = interval.tick() => {}
                Some(()) = next_event(&mut events) => {}
                line = input.next_line() => {
                    match line {
                        Ok(Some(line)) if !line.trim().eq_ignore_ascii_case("q") => continue,
                        Ok(_) => {}
                        // the menu's next read reports the failure
                        Err(e) => tracing::warn!("stopped reading input: {e}"),
                    }
                    writeln!(out, "\nExiting IP lease display.")
                        .map_err(|e| Error::io("<stdout>", e))?;
                    return Ok(());
                }
            }

            match watcher.poll().await {
                Ok(Some(leases)) => {
                    let now = Local::now().format("%Y-%m-%d %H:%M:%S");
                    writeln!(out, "\nChange detected at {now}:")
                        .and_then(|()| writeln!(out, "{}", format_leases(leases, &Local)))
                        .and_then(|()| out.flush())
                        .map_err(|e| Error::io("<stdout>", e))?;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!("Failed to read leases: {e}");
                    writeln!(out, "Error reading lease file: {e}")
                        .map_err(|e| Error::io("<stdout>", e))?;
                    return Ok(());
                }
            }
        }
    }

    /// Optional file system notifications for the lease file's directory.
    /// Polling carries on regardless, so a watcher that fails to start is
    /// only logged.
    fn fs_events(&self) -> (Option<RecommendedWatcher>, Option<mpsc::Receiver<()>>) {
        if !self.config.watch_events {
            return (None, None);
        }

        let (tx, rx) = mpsc::channel(1);
        let dir = self
            .config
            .leases
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                // a full channel already has a wakeup queued
                Ok(_) => {
                    let _ = tx.try_send(());
                }
                Err(e) => tracing::warn!("file watch error: {e}"),
            }
        })
        .and_then(|mut w| w.watch(dir, RecursiveMode::NonRecursive).map(|()| w));

        match watcher {
            Ok(w) => (Some(w), Some(rx)),
            Err(e) => {
                tracing::warn!("not watching {}: {e}", dir.display());
                (None, None)
            }
        }
    }
}

async fn next_event(events: &mut Option<mpsc::Receiver<()>>) -> Option<()> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
