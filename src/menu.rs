use std::{
    fmt,
    io::{self, Write},
    net::Ipv4Addr,
};

use tokio::io::{AsyncBufRead, Lines};

use crate::{
    bootptab::{Bootptab, Upsert},
    command::CommandRunner,
    config::Config,
    error::Error,
    interfaces,
    model::Reservation,
    monitor::{self, Monitor},
    plist::{self, BootpdConfig, ConfigOrigin, SubnetRange},
    service::{Service, Startup},
};

/// The interactive session. Failures of individual actions are printed and
/// the session carries on; only broken stdin/stdout ends it early.
pub struct Menu<C, R, W> {
    config: Config,
    service: Service<C>,
    monitor: Monitor,
    input: Lines<R>,
    out: W,
}

impl<C, R, W> Menu<C, R, W>
where
    C: CommandRunner,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    pub fn new(config: Config, runner: C, input: Lines<R>, out: W) -> Self {
        Self {
            service: Service::new(runner, config.service.clone()),
            monitor: Monitor::new(config.monitor.clone()),
            config,
            input,
            out,
        }
    }

    pub async fn run(&mut self) -> Result<(), Error> {
        self.check_startup().await?;

        let path = self.config.paths.bootpd_config.clone();
        let origin = match plist::inspect(&path).await {
            Ok(origin) => origin,
            Err(e) => return self.report(&e),
        };
        tracing::debug!("{} is {origin:?}", path.display());

        match origin {
            ConfigOrigin::Managed { .. } | ConfigOrigin::Legacy => {
                self.say("Existing bootpd-ctl configuration found.")?;
                self.ensure_running().await?;
            }
            ConfigOrigin::Foreign => {
                self.say("bootpd configuration exists but wasn't created by this utility.")?;
                loop {
                    let question =
                        "Do you want to (c)reate new config, (s)tart with existing config, or (q)uit? ";
                    let Some(answer) = self.ask(question).await? else {
                        return Ok(());
                    };
                    match answer.to_lowercase().as_str() {
                        "c" => {
                            if !self.create_config().await? {
                                return Ok(());
                            }
                            self.apply_config().await?;
                            break;
                        }
                        "s" => {
                            self.say("Starting bootpd with existing configuration.")?;
                            self.ensure_running().await?;
                            self.show_leases().await?;
                            break;
                        }
                        "q" => return self.say("Exiting."),
                        _ => self.say("Invalid choice. Please try again.")?,
                    }
                }
            }
            ConfigOrigin::Missing => {
                self.say(format_args!("No configuration file found at {}", path.display()))?;
                loop {
                    let Some(answer) = self.ask("Do you want to (c)reate new config or (q)uit? ").await? else {
                        return Ok(());
                    };
                    match answer.to_lowercase().as_str() {
                        "c" => {
                            if !self.create_config().await? {
                                return Ok(());
                            }
                            self.apply_config().await?;
                            self.show_leases().await?;
                            break;
                        }
                        "q" => return self.say("Exiting."),
                        _ => self.say("Invalid choice. Please try again.")?,
                    }
                }
            }
        }

        self.main_menu().await
    }

    async fn main_menu(&mut self) -> Result<(), Error> {
        loop {
            self.say("\n1. Show IP leases")?;
            self.say("2. Make a lease static")?;
            self.say("3. Delete a static lease")?;
            self.say("4. Restart bootpd")?;
            self.say("5. Exit")?;
            let Some(choice) = self.ask("Enter your choice (1-5): ").await? else {
                return Ok(());
            };

            match choice.as_str() {
                "1" => self.show_leases().await?,
                "2" => self.make_lease_static().await?,
                "3" => self.delete_static_lease().await?,
                "4" => self.restart().await?,
                "5" => return self.say("Exiting."),
                _ => self.say("Invalid choice. Please try again.")?,
            }
        }
    }

    async fn check_startup(&mut self) -> Result<(), Error> {
        match self.service.ensure_startup().await {
            Ok(Startup::AlreadyEnabled) => self.say("bootpd will run at system startup."),
            Ok(Startup::Enabled) => {
                self.say("bootpd was not set to run at startup and has been enabled.")
            }
            Err(e) => self.report(&e),
        }
    }

    async fn ensure_running(&mut self) -> Result<(), Error> {
        match self.service.is_running().await {
            Ok(true) => Ok(()),
            Ok(false) => match self.service.start().await {
                Ok(()) => self.say("bootpd service started successfully."),
                Err(e) => {
                    self.report(&e)?;
                    self.say("Failed to start bootpd. Please start it manually.")
                }
            },
            Err(e) => self.report(&e),
        }
    }

    /// Starts bootpd, or restarts it when it is already running so the new
    /// configuration is read.
    async fn apply_config(&mut self) -> Result<(), Error> {
        match self.service.is_running().await {
            Ok(true) => self.restart().await,
            Ok(false) => self.ensure_running().await,
            Err(e) => self.report(&e),
        }
    }

    async fn restart(&mut self) -> Result<(), Error> {
        self.say("Restarting bootpd service...")?;
        match self.service.restart().await {
            Ok(()) => self.say("bootpd service restarted successfully."),
            Err(e) => self.report(&e),
        }
    }

    async fn show_leases(&mut self) -> Result<(), Error> {
        self.say("Press Q at any time to return to the main menu")?;
        self.monitor.run(&mut self.input, &mut self.out).await
    }

    /// Walks the operator through interface and range selection and writes
    /// the bootpd configuration. Returns `false` when nothing was written.
    async fn create_config(&mut self) -> Result<bool, Error> {
        let found = match interfaces::discover(self.service.runner()).await {
            Ok(found) => found,
            Err(e) => {
                self.report(&e)?;
                return Ok(false);
            }
        };
        if found.is_empty() {
            self.say("No active network interfaces found.")?;
            return Ok(false);
        }

        self.say("Available active network interfaces:")?;
        for (i, interface) in found.iter().enumerate() {
            self.say(format_args!("{}. {interface}", i + 1))?;
        }

        let auto = self
            .config
            .prefer_interface
            .as_deref()
            .and_then(|needle| interfaces::preferred(&found, needle));
        let interface = if let Some(interface) = auto {
            self.say(format_args!("\nAutomatically selected interface: {interface}"))?;
            interface
        } else {
            let question = "\nSelect an interface (enter the number, or 'q' to cancel): ";
            match self.choose(question, found.len()).await? {
                Some(i) => &found[i],
                None => return Ok(false),
            }
        };

        let range = loop {
            let Some(start) = self.ask_ipv4("Enter the starting IP address of the range: ").await? else {
                return Ok(false);
            };
            let Some(end) = self.ask_ipv4("Enter the ending IP address of the range: ").await? else {
                return Ok(false);
            };
            match SubnetRange::new(start, end) {
                Ok(range) => break range,
                Err(e) => self.say(format_args!("{e}. Please try again."))?,
            }
        };

        let path = self.config.paths.bootpd_config.clone();
        let bootpd = BootpdConfig::new(interface.device_id.clone(), range);
        match plist::write(&path, &bootpd).await {
            Ok(()) => {
                self.say(format_args!("New configuration written to {}", path.display()))?;
                Ok(true)
            }
            Err(e) => {
                self.report(&e)?;
                Ok(false)
            }
        }
    }

    async fn make_lease_static(&mut self) -> Result<(), Error> {
        let leases = match monitor::read_leases(&self.config.paths.dhcpd_leases).await {
            Ok(leases) => leases,
            Err(Error::NotFound { .. }) => Vec::new(),
            Err(e) => return self.report(&e),
        };
        if leases.is_empty() {
            return self.say("No active leases found.");
        }

        self.say("\nCurrent leases:")?;
        for (i, lease) in leases.iter().enumerate() {
            self.say(format_args!(
                "{}. IP: {}, MAC: {}, Hostname: {}{}",
                i + 1,
                or_na(lease.ip_address),
                or_na(lease.hw_address),
                or_na(lease.name.as_deref()),
                if lease.is_expired() { " (expired)" } else { "" },
            ))?;
        }

        let question = "\nEnter the number of the lease you want to make static (or 'q' to quit): ";
        let Some(index) = self.choose(question, leases.len()).await? else {
            return Ok(());
        };
        let reservation = match Reservation::from_lease(&leases[index], index + 1) {
            Ok(reservation) => reservation,
            Err(e) => return self.report(&e),
        };

        let path = self.config.paths.bootptab.clone();
        let mut table = match Bootptab::load_or_default(&path).await {
            Ok(table) => table,
            Err(e) => return self.report(&e),
        };
        let summary = format!(
            "Static lease for {} ({}) with IP {} has been added/updated in {}",
            reservation.hostname,
            reservation.hw_address,
            reservation.ip_address,
            path.display()
        );
        let outcome = table.upsert(reservation);
        if let Err(e) = table.save(&path).await {
            return self.report(&e);
        }
        tracing::info!("{outcome:?} in {}", path.display());

        self.say(summary)?;
        if let Upsert::Updated { removed } = outcome {
            if removed > 0 {
                self.say(format_args!("Removed {removed} other rows for the same host."))?;
            }
        }
        self.restart().await
    }

    async fn delete_static_lease(&mut self) -> Result<(), Error> {
        let path = self.config.paths.bootptab.clone();
        let mut table = match Bootptab::load(&path).await {
            Ok(table) => table,
            Err(e) => return self.report(&e),
        };
        let rows: Vec<_> = table.reservations().cloned().collect();
        if rows.is_empty() {
            return self.say("No static leases found.");
        }

        self.say("\nCurrent static leases:")?;
        for (i, row) in rows.iter().enumerate() {
            self.say(format_args!("{}. {row}", i + 1))?;
        }

        let question = "\nEnter the number of the lease you want to delete (or 'q' to quit): ";
        let Some(index) = self.choose(question, rows.len()).await? else {
            return Ok(());
        };
        table.remove(index);
        if let Err(e) = table.save(&path).await {
            return self.report(&e);
        }

        self.say(format_args!("Static lease has been deleted from {}", path.display()))?;
        self.restart().await
    }

    /// Asks for a 1-based item number; `None` when the operator cancels
    /// with `q` or input ends.
    async fn choose(&mut self, question: &str, count: usize) -> Result<Option<usize>, Error> {
        loop {
            let Some(answer) = self.ask(question).await? else {
                return Ok(None);
            };
            if answer.eq_ignore_ascii_case("q") {
                return Ok(None);
            }
            match answer.parse::<usize>() {
                Ok(n) if (1..=count).contains(&n) => return Ok(Some(n - 1)),
                Ok(_) => self.say("Invalid selection. Please try again.")?,
                Err(_) => self.say("Invalid input. Please enter a number or 'q'.")?,
            }
        }
    }

    async fn ask_ipv4(&mut self, question: &str) -> Result<Option<Ipv4Addr>, Error> {
        loop {
            let Some(answer) = self.ask(question).await? else {
                return Ok(None);
            };
            match plist::parse_ipv4(&answer) {
                Ok(ip) => return Ok(Some(ip)),
                Err(e) => self.say(format_args!("{e}. Please try again."))?,
            }
        }
    }

    async fn ask(&mut self, question: &str) -> Result<Option<String>, Error> {
        write!(self.out, "{question}")
            .and_then(|()| self.out.flush())
            .map_err(stdout_error)?;
        let line = self
            .input
            .next_line()
            .await
            .map_err(|e| Error::io("<stdin>", e))?;
        Ok(line.map(|line| line.trim().to_string()))
    }

    fn say(&mut self, message: impl fmt::Display) -> Result<(), Error> {
        writeln!(self.out, "{message}").map_err(stdout_error)
    }

    fn report(&mut self, e: &Error) -> Result<(), Error> {
        tracing::debug!("reporting {e:?}");
        self.say(format_args!("Error: {e}"))
    }
}

fn or_na<T: fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| v.to_string())
}

fn stdout_error(e: io::Error) -> Error {
    Error::io("<stdout>", e)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use std::{path::Path, time::Duration};

    use tempfile::TempDir;
    use tokio::io::{AsyncBufReadExt, BufReader};

    use super::*;
    use crate::{
        command::fake::{ok, FakeRunner},
        config::{MonitorConfig, Paths, ServiceConfig},
    };

    static ONE_LEASE: &str =
        r#"{ip_address="10.0.0.5"; hw_address="aa:bb:cc:dd:ee:ff"; name="my laptop"; end=1700000000}"#;

    static BOOTPTAB: &str = "%%
# hostname      hwtype  hwaddr              ipaddr
alpha          1       aa:aa:aa:aa:aa:01   10.0.0.2
beta           1       aa:aa:aa:aa:aa:02   10.0.0.3
";

    fn fixture() -> (TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let launchd_plist = dir.path().join("bootps.plist");
        std::fs::write(&launchd_plist, "").unwrap();
        let leases = dir.path().join("dhcpd_leases");

        let config = Config {
            paths: Paths {
                bootpd_config: dir.path().join("bootpd.plist"),
                bootptab: dir.path().join("bootptab"),
                dhcpd_leases: leases.clone(),
            },
            service: ServiceConfig {
                launchd_plist,
                use_sudo: false,
                restart_delay: Duration::ZERO,
                ..ServiceConfig::default()
            },
            monitor: MonitorConfig {
                leases,
                poll_interval: Duration::from_secs(1),
                watch_events: false,
            },
            prefer_interface: None,
        };
        (dir, config)
    }

    async fn write_managed(config: &Config) {
        let range = SubnetRange::new(Ipv4Addr::new(10, 0, 0, 10), Ipv4Addr::new(10, 0, 0, 50)).unwrap();
        plist::write(&config.paths.bootpd_config, &BootpdConfig::new("en7", range))
            .await
            .unwrap();
    }

    async fn session(config: Config, runner: FakeRunner, input: &'static str) -> (String, Vec<String>) {
        let lines = BufReader::new(input.as_bytes()).lines();
        let mut menu = Menu::new(config, runner, lines, Vec::new());
        menu.run().await.unwrap();
        (String::from_utf8(menu.out).unwrap(), menu.service.runner().calls())
    }

    fn launchd_calls(calls: &[String], plist: &Path) -> Vec<String> {
        let plist = plist.display().to_string();
        calls
            .iter()
            .filter(|c| c.starts_with("launchctl") && c.ends_with(&plist))
            .cloned()
            .collect()
    }

    #[tokio::test]
    async fn test_missing_config_quit() {
        let (_dir, config) = fixture();
        let path = config.paths.bootpd_config.clone();

        let (out, _) = session(config, FakeRunner::default(), "q\n").await;
        assert!(out.contains("No configuration file found"));
        assert!(out.ends_with("Exiting.\n"));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_missing_config_create() {
        let (_dir, config) = fixture();
        std::fs::write(&config.paths.dhcpd_leases, ONE_LEASE).unwrap();
        let path = config.paths.bootpd_config.clone();
        let runner = FakeRunner::default()
            .respond(
                "networksetup -listallhardwareports",
                ok("Hardware Port: Ethernet\nDevice: en0\n\nHardware Port: USB LAN\nDevice: en7\n"),
            )
            .respond("ifconfig", ok("en0: flags=8863<UP>\nen7: flags=8863<UP>\n"));

        let input = "c\n2\n10.0.0.10\n10.0.1.5\n10.0.0.10\n10.0.0.50\nq\n5\n";
        let (out, _) = session(config, runner, input).await;

        assert!(out.contains("2. USB LAN (en7)"));
        assert!(out.contains("invalid address range"));
        assert!(out.contains("Change detected at"));
        assert!(out.ends_with("Exiting.\n"));

        let xml = std::fs::read_to_string(&path).unwrap();
        assert!(xml.contains("<string>en7</string>"));
        assert_eq!(
            plist::inspect(&path).await.unwrap(),
            ConfigOrigin::Managed { schema_version: 1 }
        );
    }

    #[tokio::test]
    async fn test_preferred_interface_is_auto_selected() {
        let (_dir, mut config) = fixture();
        config.prefer_interface = Some("usb".to_string());
        let path = config.paths.bootpd_config.clone();
        let runner = FakeRunner::default()
            .respond(
                "networksetup -listallhardwareports",
                ok("Hardware Port: Ethernet\nDevice: en0\n\nHardware Port: USB LAN\nDevice: en7\n"),
            )
            .respond("ifconfig", ok("en0: flags=8863<UP>\nen7: flags=8863<UP>\n"));

        // no interface number in the input
        let (out, _) = session(config, runner, "c\n10.0.0.10\n10.0.0.50\nq\n5\n").await;

        assert!(out.contains("Automatically selected interface: USB LAN (en7)"));
        assert!(std::fs::read_to_string(path).unwrap().contains("<string>en7</string>"));
    }

    #[tokio::test]
    async fn test_foreign_config_left_alone_on_quit() {
        let (_dir, config) = fixture();
        let path = config.paths.bootpd_config.clone();
        std::fs::write(&path, "<plist><dict/></plist>").unwrap();

        let (out, _) = session(config, FakeRunner::default(), "x\nq\n").await;
        assert!(out.contains("wasn't created by this utility"));
        assert!(out.contains("Invalid choice"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<plist><dict/></plist>");
    }

    #[tokio::test]
    async fn test_main_menu_eof_and_invalid_choice() {
        let (_dir, config) = fixture();
        write_managed(&config).await;

        let (out, _) = session(config, FakeRunner::default(), "9\n").await;
        assert!(out.contains("Existing bootpd-ctl configuration found."));
        assert!(out.contains("Invalid choice. Please try again."));
        assert_eq!(out.matches("5. Exit").count(), 2);
    }

    #[tokio::test]
    async fn test_piped_show_leases_ends_at_eof() {
        let (_dir, config) = fixture();
        write_managed(&config).await;
        std::fs::write(&config.paths.dhcpd_leases, ONE_LEASE).unwrap();

        let (out, _) = tokio::time::timeout(
            Duration::from_secs(5),
            session(config, FakeRunner::default(), "1\n"),
        )
        .await
        .expect("session ends with its input");
        assert!(out.contains("Change detected at"));
        assert!(out.contains("Exiting IP lease display."));
    }

    #[tokio::test]
    async fn test_make_lease_static() {
        let (_dir, config) = fixture();
        write_managed(&config).await;
        std::fs::write(&config.paths.dhcpd_leases, ONE_LEASE).unwrap();
        let bootptab = config.paths.bootptab.clone();
        let launchd = config.service.launchd_plist.clone();

        let (out, calls) = session(config, FakeRunner::default(), "2\n7\nx\n1\n5\n").await;

        assert!(out.contains("1. IP: 10.0.0.5, MAC: aa:bb:cc:dd:ee:ff, Hostname: my laptop (expired)"));
        assert!(out.contains("Invalid selection"));
        assert!(out.contains("Invalid input"));
        assert!(out.contains("Static lease for my-laptop (aa:bb:cc:dd:ee:ff) with IP 10.0.0.5"));

        let table = Bootptab::load(&bootptab).await.unwrap();
        let rows: Vec<_> = table.reservations().collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].hostname, "my-laptop");

        let launchd_calls = launchd_calls(&calls, &launchd);
        assert_eq!(
            launchd_calls[launchd_calls.len() - 2..],
            [
                format!("launchctl unload {}", launchd.display()),
                format!("launchctl load -w {}", launchd.display()),
            ]
        );
    }

    #[tokio::test]
    async fn test_make_lease_static_without_leases() {
        let (_dir, config) = fixture();
        write_managed(&config).await;

        let (out, calls) = session(config, FakeRunner::default(), "2\n5\n").await;
        assert!(out.contains("No active leases found."));
        assert!(!calls.iter().any(|c| c.contains("unload")));
    }

    #[tokio::test]
    async fn test_delete_static_lease() {
        let (_dir, config) = fixture();
        write_managed(&config).await;
        std::fs::write(&config.paths.bootptab, BOOTPTAB).unwrap();
        let bootptab = config.paths.bootptab.clone();

        let (out, calls) = session(config, FakeRunner::default(), "3\n1\n5\n").await;

        assert!(out.contains("1. Hostname: alpha, MAC: aa:aa:aa:aa:aa:01, IP: 10.0.0.2"));
        assert!(out.contains("Static lease has been deleted"));
        let table = Bootptab::load(&bootptab).await.unwrap();
        let names: Vec<_> = table.reservations().map(|r| r.hostname.as_str()).collect();
        assert_eq!(names, ["beta"]);
        assert!(calls.iter().any(|c| c.starts_with("launchctl unload")));
    }

    #[tokio::test]
    async fn test_delete_cancelled() {
        let (_dir, config) = fixture();
        write_managed(&config).await;
        std::fs::write(&config.paths.bootptab, BOOTPTAB).unwrap();
        let bootptab = config.paths.bootptab.clone();

        let (_, calls) = session(config, FakeRunner::default(), "3\nq\n5\n").await;

        assert_eq!(std::fs::read_to_string(bootptab).unwrap(), BOOTPTAB);
        assert!(!calls.iter().any(|c| c.contains("unload")));
    }

    #[tokio::test]
    async fn test_delete_without_bootptab() {
        let (_dir, config) = fixture();
        write_managed(&config).await;

        let (out, _) = session(config, FakeRunner::default(), "3\n5\n").await;
        assert!(out.contains("Error: "));
        assert!(out.contains("not found"));
        assert!(out.ends_with("Exiting.\n"));
    }
}
