use std::{path::PathBuf, time::Duration};

use crate::args::Args;

/// Everything the components need to know about the host, resolved once from
/// the command line.
#[derive(Debug, Clone)]
pub struct Config {
    pub paths: Paths,
    pub service: ServiceConfig,
    pub monitor: MonitorConfig,
    pub prefer_interface: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Paths {
    pub bootpd_config: PathBuf,
    pub bootptab: PathBuf,
    pub dhcpd_leases: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub launchd_plist: PathBuf,
    pub label: String,
    pub process_name: String,
    pub use_sudo: bool,
    pub restart_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub leases: PathBuf,
    pub poll_interval: Duration,
    pub watch_events: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            launchd_plist: PathBuf::from("/System/Library/LaunchDaemons/bootps.plist"),
            label: "com.apple.bootpd".to_string(),
            process_name: "bootpd".to_string(),
            use_sudo: true,
            restart_delay: Duration::from_secs(1),
        }
    }
}

impl From<&Args> for Config {
    fn from(args: &Args) -> Self {
        Self {
            paths: Paths {
                bootpd_config: args.bootpd_config.clone(),
                bootptab: args.bootptab.clone(),
                dhcpd_leases: args.dhcpd_leases.clone(),
            },
            service: ServiceConfig {
                launchd_plist: args.launchd_plist.clone(),
                label: args.service_label.clone(),
                use_sudo: !args.no_sudo,
                ..ServiceConfig::default()
            },
            monitor: MonitorConfig {
                leases: args.dhcpd_leases.clone(),
                poll_interval: Duration::from_secs(args.poll_interval.max(1)),
                watch_events: args.watch_events,
            },
            prefer_interface: args.prefer_interface.clone(),
        }
    }
}
