use std::{
    net::{IpAddr, Ipv4Addr},
    path::{Path, PathBuf},
};

use quick_xml::{
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
    reader::Reader,
    Writer,
};

use crate::error::Error;

pub static SENTINEL: &str = "Configured by bootpd-ctl";
/// Comments left by the BitBox setup script this tool replaces.
static LEGACY_SENTINELS: [&str; 1] = ["Configured by BitBox utility"];
/// Top-level key marking a configuration written by this tool.
pub static SCHEMA_KEY: &str = "bootpd_ctl_schema_version";
pub const SCHEMA_VERSION: u32 = 1;

static DOCTYPE: &str =
    r#"plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd""#;
const LEASE_SECS: u32 = 86400;

pub fn parse_ipv4(input: &str) -> Result<Ipv4Addr, Error> {
    match input.trim().parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => Ok(ip),
        Ok(IpAddr::V6(_)) => Err(Error::InvalidAddress(format!(
            "{} is IPv6, bootpd subnets are IPv4",
            input.trim()
        ))),
        Err(_) => Err(Error::InvalidAddress(input.trim().to_string())),
    }
}

/// An address pool inside a single /24.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubnetRange {
    start: Ipv4Addr,
    end: Ipv4Addr,
}

impl SubnetRange {
    pub fn new(start: Ipv4Addr, end: Ipv4Addr) -> Result<Self, Error> {
        if start > end {
            return Err(Error::InvalidRange(format!("{start} is after {end}")));
        }
        if start.octets()[..3] != end.octets()[..3] {
            return Err(Error::InvalidRange(format!(
                "{start} and {end} are not in the same /24"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> Ipv4Addr {
        self.start
    }

    pub fn end(&self) -> Ipv4Addr {
        self.end
    }

    pub fn network(&self) -> Ipv4Addr {
        let [a, b, c, _] = self.start.octets();
        Ipv4Addr::new(a, b, c, 0)
    }

    pub fn netmask(&self) -> Ipv4Addr {
        Ipv4Addr::new(255, 255, 255, 0)
    }

    /// `a.b.c`, the subnet name bootpd shows in its logs.
    pub fn name(&self) -> String {
        let [a, b, c, _] = self.start.octets();
        format!("{a}.{b}.{c}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootpdConfig {
    pub interface: String,
    pub range: SubnetRange,
}

impl BootpdConfig {
    pub fn new(interface: impl Into<String>, range: SubnetRange) -> Self {
        Self {
            interface: interface.into(),
            range,
        }
    }

    /// DHCP on `interface` only, one subnet covering `range`.
    pub fn render(&self) -> Result<String, Error> {
        let mut w = Writer::new_with_indent(Vec::new(), b' ', 4);

        w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        w.write_event(Event::DocType(BytesText::from_escaped(DOCTYPE)))?;
        w.write_event(Event::Start(
            BytesStart::new("plist").with_attributes([("version", "1.0")]),
        ))?;
        w.write_event(Event::Comment(BytesText::new(SENTINEL)))?;
        w.write_event(Event::Start(BytesStart::new("dict")))?;

        key(&mut w, SCHEMA_KEY)?;
        integer(&mut w, SCHEMA_VERSION)?;
        key(&mut w, "bootp_enabled")?;
        boolean(&mut w, false)?;
        key(&mut w, "detect_other_dhcp_server")?;
        integer(&mut w, 1)?;
        key(&mut w, "dhcp_enabled")?;
        w.write_event(Event::Start(BytesStart::new("array")))?;
        string(&mut w, &self.interface)?;
        w.write_event(Event::End(BytesEnd::new("array")))?;
        key(&mut w, "reply_threshold_seconds")?;
        integer(&mut w, 0)?;

        key(&mut w, "Subnets")?;
        w.write_event(Event::Start(BytesStart::new("array")))?;
        w.write_event(Event::Start(BytesStart::new("dict")))?;
        key(&mut w, "allocate")?;
        boolean(&mut w, true)?;
        key(&mut w, "lease_max")?;
        integer(&mut w, LEASE_SECS)?;
        key(&mut w, "lease_min")?;
        integer(&mut w, LEASE_SECS)?;
        key(&mut w, "name")?;
        string(&mut w, &self.range.name())?;
        key(&mut w, "net_address")?;
        string(&mut w, &self.range.network().to_string())?;
        key(&mut w, "net_mask")?;
        string(&mut w, &self.range.netmask().to_string())?;
        key(&mut w, "net_range")?;
        w.write_event(Event::Start(BytesStart::new("array")))?;
        string(&mut w, &self.range.start().to_string())?;
        string(&mut w, &self.range.end().to_string())?;
        w.write_event(Event::End(BytesEnd::new("array")))?;
        w.write_event(Event::End(BytesEnd::new("dict")))?;
        w.write_event(Event::End(BytesEnd::new("array")))?;

        key(&mut w, "use_server_config_for_dhcp_options")?;
        boolean(&mut w, true)?;
        w.write_event(Event::End(BytesEnd::new("dict")))?;
        w.write_event(Event::End(BytesEnd::new("plist")))?;

        let mut buf = w.into_inner();
        buf.push(b'\n');
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

fn key(w: &mut Writer<Vec<u8>>, name: &str) -> Result<(), Error> {
    w.create_element("key")
        .write_text_content(BytesText::new(name))?;
    Ok(())
}

fn string(w: &mut Writer<Vec<u8>>, value: &str) -> Result<(), Error> {
    w.create_element("string")
        .write_text_content(BytesText::new(value))?;
    Ok(())
}

fn integer(w: &mut Writer<Vec<u8>>, value: u32) -> Result<(), Error> {
    w.create_element("integer")
        .write_text_content(BytesText::new(&value.to_string()))?;
    Ok(())
}

fn boolean(w: &mut Writer<Vec<u8>>, value: bool) -> Result<(), Error> {
    w.create_element(if value { "true" } else { "false" })
        .write_empty()?;
    Ok(())
}

/// Who wrote the file at the configured path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOrigin {
    Missing,
    Managed { schema_version: u32 },
    /// Has a sentinel comment, ours or the BitBox script's, but no schema key.
    Legacy,
    Foreign,
}

impl ConfigOrigin {
    pub fn is_ours(self) -> bool {
        matches!(self, Self::Managed { .. } | Self::Legacy)
    }
}

pub async fn inspect<P>(path: P) -> Result<ConfigOrigin, Error>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    match tokio::fs::read_to_string(path).await {
        Ok(xml) => Ok(classify(&xml)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigOrigin::Missing),
        Err(e) => Err(Error::io(path, e)),
    }
}

/// Looks for [`SCHEMA_KEY`] among the keys of the top-level dict, falling
/// back to the sentinel comment.
pub fn classify(xml: &str) -> ConfigOrigin {
    match schema_version(xml) {
        Ok((Some(schema_version), _)) => ConfigOrigin::Managed { schema_version },
        Ok((None, true)) => ConfigOrigin::Legacy,
        Ok((None, false)) => ConfigOrigin::Foreign,
        Err(e) => {
            tracing::debug!("existing config is not readable XML: {e}");
            ConfigOrigin::Foreign
        }
    }
}

fn schema_version(xml: &str) -> Result<(Option<u32>, bool), Error> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    // <plist> = 1, top-level <dict> = 2, its <key>/<integer> children = 3
    let mut depth = 0usize;
    let mut in_key = false;
    let mut in_value = false;
    let mut last_key: Option<String> = None;
    let mut version = None;
    let mut sentinel = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                if depth == 3 {
                    match e.name().as_ref() {
                        b"key" => in_key = true,
                        b"integer" => in_value = last_key.as_deref() == Some(SCHEMA_KEY),
                        _ => {}
                    }
                }
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                in_key = false;
                in_value = false;
            }
            Event::Text(t) => {
                let text = t.unescape()?;
                if in_key {
                    last_key = Some(text.into_owned());
                } else if in_value {
                    version = text.trim().parse().ok();
                }
            }
            Event::Comment(c) => {
                let comment = String::from_utf8_lossy(&c);
                if std::iter::once(SENTINEL)
                    .chain(LEGACY_SENTINELS)
                    .any(|s| comment.contains(s))
                {
                    sentinel = true;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok((version, sentinel))
}

/// Writes `config` to `path`, first copying a file this tool did not create
/// to `<path>.bak`.
pub async fn write<P>(path: P, config: &BootpdConfig) -> Result<(), Error>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let xml = config.render()?;

    match inspect(path).await? {
        ConfigOrigin::Missing => {}
        origin if origin.is_ours() => tracing::debug!("replacing {origin:?} configuration"),
        _ => {
            let backup = backup_path(path);
            tokio::fs::copy(path, &backup)
                .await
                .map_err(|e| Error::io(&backup, e))?;
            tracing::info!("saved previous configuration to {}", backup.display());
        }
    }

    tokio::fs::write(path, xml)
        .await
        .map_err(|e| Error::io(path, e))?;
    tracing::info!("wrote {}", path.display());
    Ok(())
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}
