use std::path::PathBuf;

use clap::{ArgAction, Parser};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Args {
    /// bootpd configuration written by this tool
    #[arg(long, default_value = "/etc/bootpd.plist")]
    pub bootpd_config: PathBuf,

    /// static reservation table
    #[arg(long, default_value = "/etc/bootptab")]
    pub bootptab: PathBuf,

    /// lease database maintained by bootpd
    #[arg(long, default_value = "/var/db/dhcpd_leases")]
    pub dhcpd_leases: PathBuf,

    #[arg(long, default_value = "/System/Library/LaunchDaemons/bootps.plist")]
    pub launchd_plist: PathBuf,

    #[arg(long, default_value = "com.apple.bootpd")]
    pub service_label: String,

    /// seconds between lease file checks
    #[arg(long, default_value_t = 1)]
    pub poll_interval: u64,

    /// also wake the lease monitor on file system events
    #[arg(long)]
    pub watch_events: bool,

    /// select the first active interface whose name contains this text
    #[arg(long)]
    pub prefer_interface: Option<String>,

    /// run launchctl directly instead of through sudo
    #[arg(long)]
    pub no_sudo: bool,

    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    pub fn new() -> Self {
        Self::parse()
    }

    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["bootpd-ctl"]).unwrap();
        assert_eq!(args.bootpd_config, PathBuf::from("/etc/bootpd.plist"));
        assert_eq!(args.bootptab, PathBuf::from("/etc/bootptab"));
        assert_eq!(args.dhcpd_leases, PathBuf::from("/var/db/dhcpd_leases"));
        assert_eq!(args.poll_interval, 1);
        assert!(!args.no_sudo);
        assert_eq!(args.log_filter(), "warn");
    }

    #[test]
    fn test_verbosity() {
        let args = Args::try_parse_from(["bootpd-ctl", "-vv"]).unwrap();
        assert_eq!(args.log_filter(), "debug");
    }
}
