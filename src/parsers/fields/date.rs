/*
 * Copyright Stalwart Labs Ltd. See the COPYING
 * file at the top-level directory of this distribution.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

//! RFC 822/5322 `Date:` (and `Received:` trailing date-time clause)
//! parser. Tolerates an optional day-name prefix, one or two digit
//! day-of-month, a three-letter month name, a two/three/four-digit
//! year, an optional `HH:MM[:SS]` time (noon is assumed when absent),
//! and a zone in any of `±HHMM`, a single military letter, `UT`/`GMT`,
//! or a US three-letter zone name.
//!
//! Five-digit years and malformed tokens fail the whole parse — the
//! caller (header lexer, `Received` field parser) decides what
//! fallback, if any, to substitute; this function never reaches for a
//! wall clock itself.

use crate::core::cursor::ByteCursor;
use crate::core::datetime::DateTime;

const MONTHS: [&[u8]; 12] = [
    b"jan", b"feb", b"mar", b"apr", b"may", b"jun", b"jul", b"aug", b"sep", b"oct", b"nov", b"dec",
];

fn skip_ws<'x, C: ByteCursor<'x>>(cur: &mut C) {
    while matches!(cur.peek(), Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n')) {
        cur.advance(1);
    }
}

fn take_digits<'x, C: ByteCursor<'x>>(cur: &mut C, max: usize) -> Option<u32> {
    let start = cur.offset();
    while cur.offset() - start < max && matches!(cur.peek(), Some(b'0'..=b'9')) {
        cur.advance(1);
    }
    if cur.offset() == start {
        return None;
    }
    std::str::from_utf8(cur.bytes(start..cur.offset()))
        .ok()?
        .parse()
        .ok()
}

fn take_alpha<'x, C: ByteCursor<'x>>(cur: &mut C) -> Vec<u8> {
    let start = cur.offset();
    while matches!(cur.peek(), Some(c) if c.is_ascii_alphabetic()) {
        cur.advance(1);
    }
    cur.bytes(start..cur.offset()).to_vec()
}

fn resolve_year(raw: &str) -> Option<u16> {
    let digits = raw.len();
    let value: u32 = raw.parse().ok()?;
    match digits {
        1 | 2 => {
            if value < 70 {
                Some((2000 + value) as u16)
            } else {
                Some((1900 + value) as u16)
            }
        }
        3 => {
            if value < 19 {
                None
            } else {
                Some((1900 + value) as u16)
            }
        }
        4 => Some(value as u16),
        _ => None,
    }
}

/// Military zone letters per the component design: `A..I` -> `+1..+9`
/// (no `J`), `K..M` -> `+10..+12`, `N..Y` -> `-1..-12`, `Z` -> `0`.
fn military_zone(letter: u8) -> Option<(u8, bool)> {
    let upper = letter.to_ascii_uppercase();
    match upper {
        b'A'..=b'I' => Some((upper - b'A' + 1, false)),
        b'J' => None,
        b'K'..=b'M' => Some((upper - b'K' + 10, false)),
        b'N'..=b'Y' => Some((upper - b'N' + 1, true)),
        b'Z' => Some((0, false)),
        _ => None,
    }
}

fn us_zone(token: &[u8]) -> Option<(u8, bool)> {
    let upper = token.to_ascii_uppercase();
    match upper.as_slice() {
        b"EST" => Some((5, true)),
        b"EDT" => Some((4, true)),
        b"CST" => Some((6, true)),
        b"CDT" => Some((5, true)),
        b"MST" => Some((7, true)),
        b"MDT" => Some((6, true)),
        b"PST" => Some((8, true)),
        b"PDT" => Some((7, true)),
        _ => None,
    }
}

/// Parses a date-time starting at the cursor's current position. Does
/// not require or consume a trailing `\n` — callers that invoke this
/// as a header field parser are expected to skip any remaining text on
/// the logical line themselves.
pub fn parse_date<'x, C: ByteCursor<'x>>(cur: &mut C) -> Option<DateTime> {
    skip_ws(cur);

    // Optional day-name prefix, e.g. "Sat,". Any alphabetic token
    // immediately followed by a comma is treated as the day name and
    // discarded without validating it against the computed weekday.
    cur.checkpoint();
    let maybe_day_name = take_alpha(cur);
    if !maybe_day_name.is_empty() && cur.peek() == Some(b',') {
        cur.advance(1);
        skip_ws(cur);
    } else {
        cur.restore();
    }

    let day: u8 = take_digits(cur, 2)?.try_into().ok()?;
    skip_ws(cur);

    let month_name = take_alpha(cur);
    if month_name.len() < 3 {
        return None;
    }
    let mut lower = month_name.clone();
    lower.make_ascii_lowercase();
    let month = MONTHS.iter().position(|m| lower.starts_with(m))? as u8 + 1;
    skip_ws(cur);

    let year_start = cur.offset();
    let _ = take_digits(cur, 5)?;
    let year_str = std::str::from_utf8(cur.bytes(year_start..cur.offset())).ok()?;
    if year_str.len() > 4 {
        return None;
    }
    let year = resolve_year(year_str)?;
    skip_ws(cur);

    // Optional HH:MM[:SS]; noon is assumed when no time is present.
    let (hour, minute, second) = {
        cur.checkpoint();
        match take_digits(cur, 2) {
            Some(h) if cur.peek() == Some(b':') => {
                cur.advance(1);
                let m = take_digits(cur, 2)?;
                let s = if cur.peek() == Some(b':') {
                    cur.advance(1);
                    take_digits(cur, 2)?
                } else {
                    0
                };
                (h as u8, m as u8, s as u8)
            }
            _ => {
                cur.restore();
                (12, 0, 0)
            }
        }
    };
    skip_ws(cur);

    // Optional zone.
    let (tz_hour, tz_minute, tz_before_gmt) = match cur.peek() {
        Some(b'+') | Some(b'-') => {
            let before_gmt = cur.next() == Some(b'-');
            let h = take_digits(cur, 2)?;
            let m = take_digits(cur, 2).unwrap_or(0);
            (h as u8, m as u8, before_gmt)
        }
        Some(c) if c.is_ascii_alphabetic() => {
            let token = take_alpha(cur);
            let upper_token = token.to_ascii_uppercase();
            if upper_token == b"UT" || upper_token == b"GMT" {
                (0, 0, false)
            } else if token.len() == 3 {
                let (h, before) = us_zone(&token)?;
                (h, 0, before)
            } else if token.len() == 1 {
                let (h, before) = military_zone(token[0])?;
                (h, 0, before)
            } else {
                return None;
            }
        }
        _ => (0, 0, false),
    };

    let dt = DateTime {
        year,
        month,
        day,
        hour,
        minute,
        second,
        tz_hour,
        tz_minute,
        tz_before_gmt,
    };

    dt.is_valid().then_some(dt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cursor::Cursor;

    fn parse(s: &str) -> Option<DateTime> {
        let mut cur = Cursor::new(s.as_bytes());
        parse_date(&mut cur)
    }

    #[test]
    fn two_digit_year_before_70_is_2000s() {
        let dt = parse("Sat, 1 Jan 00 12:00:00 +0000").unwrap();
        assert_eq!(dt.year, 2000);
    }

    #[test]
    fn two_digit_year_70_to_99_is_1900s() {
        let dt = parse("Sat, 1 Jan 85 12:00:00 -0500").unwrap();
        assert_eq!(dt.year, 1985);
        assert_eq!(dt.tz_hour, 5);
        assert!(dt.tz_before_gmt);
    }

    #[test]
    fn three_digit_year_below_19_is_invalid() {
        assert!(parse("Sat, 1 Jan 018 12:00:00 GMT").is_none());
    }

    #[test]
    fn three_digit_year_at_or_above_19_adds_1900() {
        let dt = parse("Sat, 1 Jan 020 12:00:00 GMT").unwrap();
        assert_eq!(dt.year, 1920);
    }

    #[test]
    fn five_digit_year_is_invalid() {
        assert!(parse("Sat, 1 Jan 12345 12:00:00 GMT").is_none());
    }

    #[test]
    fn missing_time_defaults_to_noon() {
        let dt = parse("1 Jan 2020 GMT").unwrap();
        assert_eq!((dt.hour, dt.minute, dt.second), (12, 0, 0));
    }

    #[test]
    fn military_zone_letters() {
        assert_eq!(parse("1 Jan 2020 12:00:00 A").unwrap().tz_hour, 1);
        assert_eq!(parse("1 Jan 2020 12:00:00 Z").unwrap().tz_hour, 0);
        assert!(parse("1 Jan 2020 12:00:00 J").is_none());
        let y = parse("1 Jan 2020 12:00:00 Y").unwrap();
        assert_eq!(y.tz_hour, 12);
        assert!(y.tz_before_gmt);
    }

    #[test]
    fn us_zone_name() {
        let dt = parse("1 Jan 2020 12:00:00 PST").unwrap();
        assert_eq!(dt.tz_hour, 8);
        assert!(dt.tz_before_gmt);
    }
}
