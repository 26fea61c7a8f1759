
use std::convert::TryFrom;

use nom::branch::alt;
use nom::bytes::complete::{tag, tag_no_case};
use nom::character::complete::{
    char, digit0, hex_digit1, oct_digit1, one_of, satisfy
};
use nom::combinator::{all_consuming, map, map_res, opt, recognize};
use nom::multi::many0_count;
use nom::sequence::{pair, preceded};
use nom::IResult;

/// What an atom token is, decided from its text alone.
#[derive(Debug, PartialEq, Eq)]
pub enum TokenClass {
    Number(i64),
    Boolean(bool),
    /// A bare `#`, which must be followed by `\` and a character name.
    CharacterPrefix,
    /// A `"` opening a string literal.
    StringStart,
    Symbol,
    Unknown,
}

pub fn classify(token: &str) -> TokenClass {
    if let Ok((_, n)) = all_consuming(integer)(token) {
        return TokenClass::Number(n);
    }
    match token {
        "#" => TokenClass::CharacterPrefix,
        "#t" => TokenClass::Boolean(true),
        "#f" => TokenClass::Boolean(false),
        "\"" => TokenClass::StringStart,
        _ if all_consuming(symbol)(token).is_ok() => TokenClass::Symbol,
        _ => TokenClass::Unknown,
    }
}

// No unicode support
fn is_initial(c: char) -> bool {
    c.is_ascii_alphabetic() || "_!&*/:<=>+?^".contains(c)
}

fn is_subsequent(c: char) -> bool {
    is_initial(c) || c.is_ascii_digit() || ".+-".contains(c)
}

fn symbol(input: &str) -> IResult<&str, &str> {
    alt((
        recognize(pair(satisfy(is_initial), many0_count(satisfy(is_subsequent)))),
        // Peculiar identifier
        tag("-"),
    ))(input)
}

// Integer literals read the way C's strtol does with base 0: optional sign,
// then hex after 0x, octal after a leading 0, decimal otherwise.
fn integer(input: &str) -> IResult<&str, i64> {
    let (rest, negative) = map(opt(one_of("+-")), |s| s == Some('-'))(input)?;
    map_res(magnitude, move |n| {
        i64::try_from(if negative { -n } else { n })
    })(rest)
}

fn magnitude(input: &str) -> IResult<&str, i128> {
    alt((
        map_res(preceded(tag_no_case("0x"), hex_digit1),
            |digits| i128::from_str_radix(digits, 16)),
        map_res(preceded(char('0'), oct_digit1),
            |digits| i128::from_str_radix(digits, 8)),
        map_res(recognize(pair(one_of("123456789"), digit0)),
            |digits: &str| digits.parse::<i128>()),
        map(char('0'), |_| 0),
    ))(input)
}
