use nom::{branch::alt, bytes, character::complete, multi, IResult};

pub mod bootptab;
pub mod leases;

#[derive(Debug, thiserror::Error)]
#[error("failed to parse lease database: {0}")]
pub struct LeasesParseError(String);

/// A double-quoted string with C-style escapes. Unlike a bare value, the
/// quotes may enclose `;` or be empty.
fn val_string(input: &str) -> IResult<&str, String> {
    let (input, _) = complete::char('"')(input)?;
    let (input, s) = multi::many0(alt((str_octal_escape, str_char_escape, str_literal)))(input)?;
    let (input, _) = complete::char('"')(input)?;
    Ok((input, s.concat()))
}

fn str_octal_escape(input: &str) -> IResult<&str, String> {
    let (input, _) = complete::char('\\')(input)?;
    let (input, s) = multi::count(complete::one_of("01234567"), 3)(input)?;
    let s = s.iter().collect::<String>();
    let s = u8::from_str_radix(&s, 8).unwrap_or_default();
    let s = char::from(s);

    Ok((input, s.to_string()))
}

fn str_char_escape(input: &str) -> IResult<&str, String> {
    let (input, _) = complete::char('\\')(input)?;
    let (input, c) = complete::one_of("abtnvfre\\\"")(input)?;

    let c = match c {
        'a' => '\x07',
        'b' => '\x08',
        't' => '\t',
        'n' => '\n',
        'v' => '\x0b',
        'f' => '\x0c',
        'r' => '\r',
        'e' => '\x1b',
        other => other,
    };

    Ok((input, c.to_string()))
}

fn str_literal(input: &str) -> IResult<&str, String> {
    // not a \ or "
    let (input, s) = bytes::complete::take_while1(|c| c != '\\' && c != '"')(input)?;

    Ok((input, s.to_string()))
}
