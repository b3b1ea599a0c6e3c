use std::{collections::BTreeMap, fmt, net::Ipv4Addr};

use chrono::{DateTime, Utc};

pub use crate::macaddr::MacAddr;
use crate::error::Error;

pub type LeaseTime = Option<DateTime<Utc>>;

/// One block of the bootpd lease database.
///
/// Fields that are missing from the block are `None`. Keys this type does not
/// model, and known keys whose value could not be parsed, are kept verbatim
/// in `other` so that two snapshots only compare equal when the file content
/// agrees.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lease {
    pub ip_address: Option<Ipv4Addr>,
    pub hw_address: Option<MacAddr>,
    pub name: Option<String>,
    pub starts: LeaseTime,
    pub ends: LeaseTime,
    pub other: BTreeMap<String, String>,
}

impl Lease {
    pub fn is_expired(&self) -> bool {
        if let Some(ends) = self.ends {
            ends < Utc::now()
        } else {
            false
        }
    }
}

/// A row of `/etc/bootptab`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub hostname: String,
    pub hw_type: u8,
    pub hw_address: MacAddr,
    pub ip_address: Ipv4Addr,
}

pub const HW_TYPE_ETHERNET: u8 = 1;

impl Reservation {
    /// Builds a reservation from the lease at 1-based `position` in the
    /// lease listing. Leases without a hostname become `client<position>`.
    pub fn from_lease(lease: &Lease, position: usize) -> Result<Self, Error> {
        let hw_address = lease.hw_address.ok_or(Error::IncompleteLease("hardware address"))?;
        let ip_address = lease.ip_address.ok_or(Error::IncompleteLease("ip address"))?;
        let hostname = match lease.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.split_whitespace().collect::<Vec<_>>().join("-"),
            _ => format!("client{position}"),
        };

        Ok(Self {
            hostname,
            hw_type: HW_TYPE_ETHERNET,
            hw_address,
            ip_address,
        })
    }

    pub fn conflicts_with(&self, other: &Self) -> bool {
        self.hw_address == other.hw_address || self.ip_address == other.ip_address
    }

    /// The fixed-width bootptab row, without a line terminator.
    pub fn to_row(&self) -> String {
        format!(
            "{:<14} {:<8}{:<20}{}",
            self.hostname,
            self.hw_type,
            self.hw_address.to_string(),
            self.ip_address
        )
    }
}

impl fmt::Display for Reservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Hostname: {}, MAC: {}, IP: {}",
            self.hostname, self.hw_address, self.ip_address
        )
    }
}

/// A network adapter reported by `networksetup`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    pub display_name: String,
    pub device_id: String,
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name, self.device_id)
    }
}
