use std::{fmt, num::ParseIntError, str::FromStr};

#[derive(Debug, Clone, Copy, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct MacAddr([u8; 6]);

#[derive(Debug, thiserror::Error)]
pub enum InvalidMacAddr {
    #[error("mac address too short")]
    Short,

    #[error("mac address too long")]
    Long,

    #[error("mac address segment not one or two hex digits")]
    BadSegment,

    #[error("mac address parse error: {0}")]
    Parse(#[from] ParseIntError),
}

/// Accepts both the padded form (`0a:1b:...`) and the unpadded form bootpd
/// writes to its lease database (`a:1b:...`).
impl FromStr for MacAddr {
    type Err = InvalidMacAddr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 6];
        let mut len = 0usize;
        for (i, byte) in s.split(':').enumerate() {
            if i >= bytes.len() {
                return Err(InvalidMacAddr::Long);
            } else if byte.is_empty()
                || byte.len() > 2
                || !byte.chars().all(|c| c.is_ascii_hexdigit())
            {
                return Err(InvalidMacAddr::BadSegment);
            }
            bytes[i] = u8::from_str_radix(byte, 16)?;
            len += 1;
        }
        if len != bytes.len() {
            return Err(InvalidMacAddr::Short);
        }

        Ok(Self(bytes))
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mac = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
        )
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn test_short_macaddr() {
        let mac = "10:20:30";
        let e = MacAddr::from_str(mac).expect_err("Invalid MAC address");
        assert!(matches!(e, InvalidMacAddr::Short));
    }

    #[test]
    fn test_long_macaddr() {
        let mac = "10:20:30:40:50:60:70";
        let e = MacAddr::from_str(mac).expect_err("Invalid MAC address");
        assert!(matches!(e, InvalidMacAddr::Long));
    }

    #[test]
    fn test_unpadded_segment_macaddr() {
        let mac = MacAddr::from_str("0:1c:42:a:5:60").unwrap();
        assert_eq!(mac, MacAddr([0x00, 0x1c, 0x42, 0x0a, 0x05, 0x60]));
        assert_eq!(mac.to_string(), "00:1c:42:0a:05:60");
    }

    #[test]
    fn test_uppercase_macaddr() {
        let mac = MacAddr::from_str("AA:BB:CC:DD:EE:FF").unwrap();
        assert_eq!(mac.to_string(), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn test_long_segment_macaddr() {
        let mac = "10:20:30:40:50:600";
        let e = MacAddr::from_str(mac).expect_err("Invalid MAC address");
        assert!(matches!(e, InvalidMacAddr::BadSegment));
    }

    #[test]
    fn test_empty_segment_macaddr() {
        let mac = "10:20::40:50:60";
        let _ = MacAddr::from_str(mac).expect_err("Invalid MAC address");
    }

    #[test]
    fn test_invalid_hex() {
        let mac = "10:20:30:40:50:6g";
        let _ = MacAddr::from_str(mac).expect_err("Invalid MAC address");
    }
}
