use std::collections::BTreeSet;

use crate::{command::CommandRunner, error::Error, model::Interface};

/// Hardware ports known to `networksetup` whose device `ifconfig` currently
/// lists, in `networksetup` order.
pub async fn discover<R: CommandRunner>(runner: &R) -> Result<Vec<Interface>, Error> {
    let ports = runner
        .run("networksetup", &["-listallhardwareports"])
        .await?;
    let ifconfig = runner.run("ifconfig", &[]).await?;

    let active = parse_active_devices(&ifconfig.stdout);
    let interfaces: Vec<_> = parse_hardware_ports(&ports.stdout)
        .into_iter()
        .filter(|i| active.contains(&i.device_id))
        .collect();
    tracing::debug!("found {} active interfaces", interfaces.len());

    Ok(interfaces)
}

/// Pairs each `Hardware Port:` line with the `Device:` line after it.
pub fn parse_hardware_ports(output: &str) -> Vec<Interface> {
    let mut interfaces = Vec::new();
    let mut display_name: Option<&str> = None;

    for line in output.lines() {
        if let Some(name) = line.strip_prefix("Hardware Port: ") {
            display_name = Some(name.trim());
        } else if let Some(device) = line.strip_prefix("Device: ") {
            if let Some(name) = display_name.take() {
                interfaces.push(Interface {
                    display_name: name.to_string(),
                    device_id: device.trim().to_string(),
                });
            }
        }
    }

    interfaces
}

/// Interface names from `ifconfig`, i.e. every unindented `name: flags=...`
/// header line.
pub fn parse_active_devices(output: &str) -> BTreeSet<String> {
    output
        .lines()
        .filter_map(|line| line.split_once(':').map(|(name, _)| name))
        .filter(|name| {
            !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
        .map(str::to_string)
        .collect()
}

/// The first interface whose name or device contains `needle`, ignoring case.
pub fn preferred<'a>(interfaces: &'a [Interface], needle: &str) -> Option<&'a Interface> {
    let needle = needle.to_lowercase();
    interfaces.iter().find(|i| {
        i.display_name.to_lowercase().contains(&needle)
            || i.device_id.to_lowercase().contains(&needle)
    })
}
