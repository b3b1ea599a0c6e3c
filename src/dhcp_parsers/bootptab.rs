use std::net::Ipv4Addr;

use nom::{
    bytes,
    character::complete::{digit1, space0, space1},
    combinator::{map_res, rest, verify},
    Finish, IResult,
};

use crate::model::{MacAddr, Reservation};

/// Parses one line of `/etc/bootptab`, returning `None` for comments, the
/// `%%` separator and anything else that is not a reservation row.
pub fn parse_line(line: &str) -> Option<Reservation> {
    reservation(line).finish().ok().map(|(_, r)| r)
}

//  hostname   hwtype  hwaddr             ipaddr   [bootfile ...]
fn reservation(input: &str) -> IResult<&str, Reservation> {
    let (input, _) = space0(input)?;
    let (input, hostname) = verify(token, |s: &str| !s.starts_with('#') && s != "%%")(input)?;
    let (input, _) = space1(input)?;
    let (input, hw_type) = map_res(digit1, str::parse::<u8>)(input)?;
    let (input, _) = space1(input)?;
    let (input, hw_address) = map_res(token, str::parse::<MacAddr>)(input)?;
    let (input, _) = space1(input)?;
    let (input, ip_address) = map_res(token, str::parse::<Ipv4Addr>)(input)?;
    let (input, _) = rest(input)?;

    Ok((
        input,
        Reservation {
            hostname: hostname.to_string(),
            hw_type,
            hw_address,
            ip_address,
        },
    ))
}

fn token(input: &str) -> IResult<&str, &str> {
    bytes::complete::take_till1(char::is_whitespace)(input)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn test_row() {
        let r = parse_line("laptop         1       aa:bb:cc:dd:ee:ff   10.0.0.5").unwrap();
        assert_eq!(r.hostname, "laptop");
        assert_eq!(r.hw_type, 1);
        assert_eq!(r.hw_address.to_string(), "aa:bb:cc:dd:ee:ff");
        assert_eq!(r.ip_address, Ipv4Addr::new(10, 0, 0, 5));
    }

    #[test]
    fn test_row_with_tabs_and_extra_columns() {
        let r = parse_line("nas\t1\t0:1c:42:a:b:c\t10.0.0.6\tboot/nas # pinned").unwrap();
        assert_eq!(r.hostname, "nas");
        assert_eq!(r.hw_address.to_string(), "00:1c:42:0a:0b:0c");
        assert_eq!(r.ip_address, Ipv4Addr::new(10, 0, 0, 6));
    }

    #[test]
    fn test_not_rows() {
        assert_eq!(parse_line("%%"), None);
        assert_eq!(parse_line("# hostname      hwtype  hwaddr              ipaddr"), None);
        assert_eq!(parse_line("#laptop 1 aa:bb:cc:dd:ee:ff 10.0.0.5"), None);
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("   "), None);
        assert_eq!(parse_line("laptop 1 aa:bb:cc:dd:ee 10.0.0.5"), None);
        assert_eq!(parse_line("laptop 1 aa:bb:cc:dd:ee:ff 10.0.0.500"), None);
        assert_eq!(parse_line("laptop ethernet aa:bb:cc:dd:ee:ff 10.0.0.5"), None);
    }
}
