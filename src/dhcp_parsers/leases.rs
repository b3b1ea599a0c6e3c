use chrono::{DateTime, TimeZone, Utc};
use nom::{
    branch::alt,
    bytes,
    character::complete,
    combinator::{all_consuming, eof, map, peek, recognize},
    multi,
    sequence::{preceded, terminated},
    Finish, IResult,
};

use crate::model::{Lease, MacAddr};

use super::{val_string, LeasesParseError};

type Fields = Vec<(String, String)>;

/// Parses the bootpd lease database (`/var/db/dhcpd_leases`).
///
/// The file is a run of `{ ... }` blocks holding `key=value` entries, one per
/// line or separated by `;`. Lines without `=` are ignored, blocks without
/// any entry are dropped, and anything after the last `}` is discarded since
/// bootpd may be halfway through writing it.
pub fn parse(input: &str) -> Result<Vec<Lease>, LeasesParseError> {
    let (_, blocks) = lease_blocks(input)
        .finish()
        .map_err(|e| LeasesParseError(e.to_string()))?;

    Ok(blocks
        .into_iter()
        .filter(|fields| !fields.is_empty())
        .map(lease_from_fields)
        .collect())
}

fn lease_from_fields(fields: Fields) -> Lease {
    let mut lease = Lease::default();

    for (key, value) in fields {
        match key.as_str() {
            "ip_address" => {
                if let Ok(ip) = value.parse() {
                    lease.ip_address = Some(ip);
                    continue;
                }
            }
            "hw_address" => {
                if let Some(mac) = hw_address(&value) {
                    lease.hw_address = Some(mac);
                    continue;
                }
            }
            "name" => {
                lease.name = Some(value);
                continue;
            }
            "start" => {
                if let Some(t) = unix_time(&value) {
                    lease.starts = Some(t);
                    continue;
                }
            }
            "end" => {
                if let Some(t) = unix_time(&value) {
                    lease.ends = Some(t);
                    continue;
                }
            }
            _ => {}
        }
        lease.other.insert(key, value);
    }

    // bootpd itself records the expiry as `lease=0x<hex seconds>`
    if lease.ends.is_none() {
        lease.ends = lease.other.get("lease").map(String::as_str).and_then(hex_time);
    }

    lease
}

// `1,a4:83:e7:1:2:3` -> hardware type 1, then the address
fn hw_address(value: &str) -> Option<MacAddr> {
    let mac = value.split_once(',').map_or(value, |(_, mac)| mac);
    mac.trim().parse().ok()
}

fn unix_time(value: &str) -> Option<DateTime<Utc>> {
    let secs = value.trim().parse::<i64>().ok()?;
    Utc.timestamp_opt(secs, 0).single()
}

fn hex_time(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))?;
    let secs = i64::from_str_radix(digits, 16).ok()?;
    Utc.timestamp_opt(secs, 0).single()
}

fn lease_blocks(input: &str) -> IResult<&str, Vec<Fields>> {
    multi::many0(terminated(block, complete::char('}')))(input)
}

fn block(input: &str) -> IResult<&str, Fields> {
    let (rest, body) = bytes::complete::take_till(|c| c == '}')(input)?;
    let (_, fields) = all_consuming(block_fields)(body)?;
    Ok((rest, fields))
}

fn block_fields(input: &str) -> IResult<&str, Fields> {
    let (input, items) = multi::many0(preceded(
        separators,
        alt((map(field, Some), map(junk, |_| None))),
    ))(input)?;
    let (input, _) = separators(input)?;
    Ok((input, items.into_iter().flatten().collect()))
}

fn separators(input: &str) -> IResult<&str, &str> {
    bytes::complete::take_while(|c| matches!(c, ' ' | '\t' | '\r' | '\n' | ';' | '{'))(input)
}

//  key = "quoted"   or   key=bare value
fn field(input: &str) -> IResult<&str, (String, String)> {
    let (input, key) = bytes::complete::take_while1(|c| !matches!(c, '=' | '\n' | ';'))(input)?;
    let (input, _) = complete::char('=')(input)?;
    let (input, _) = complete::space0(input)?;
    let (input, value) = alt((terminated(val_string, peek(field_end)), val_bare))(input)?;
    Ok((input, (key.trim().to_string(), value)))
}

fn field_end(input: &str) -> IResult<&str, &str> {
    let (input, _) = complete::space0(input)?;
    alt((recognize(complete::one_of("\r\n;")), eof))(input)
}

fn val_bare(input: &str) -> IResult<&str, String> {
    let (input, s) = bytes::complete::take_till(|c| c == '\n' || c == ';')(input)?;
    Ok((input, s.trim().trim_matches('"').to_string()))
}

// a line with no `=`
fn junk(input: &str) -> IResult<&str, &str> {
    bytes::complete::take_till1(|c| c == '\n' || c == ';')(input)
}
