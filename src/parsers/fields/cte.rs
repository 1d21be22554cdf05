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

//! `Content-Transfer-Encoding` field parser. Captures the single leading
//! token (uppercased) and its exact byte range in the cursor's buffer, so
//! the binary recoder can patch it in place without a second, fixed-offset
//! pass over the header — see `SPEC_FULL.md` §9's note on locating the
//! token by re-parse rather than a hardcoded offset.

use std::borrow::Cow;
use std::ops::Range;

use crate::core::cursor::ByteCursor;

pub struct ParsedCte<'x> {
    pub token: Cow<'x, str>,
    pub range: Range<usize>,
}

pub fn parse_cte<'x, C: ByteCursor<'x>>(cur: &mut C) -> Option<ParsedCte<'x>> {
    let mut token_start = 0usize;
    let mut token_end = 0usize;
    let mut token_closed = false;

    while let Some(ch) = cur.next() {
        match ch {
            b'\n' => {
                if !cur.try_next_is_space() {
                    return if token_start > 0 {
                        let range = token_start - 1..token_end;
                        let mut token = String::from_utf8_lossy(cur.bytes(range.clone())).into_owned();
                        token.make_ascii_uppercase();
                        Some(ParsedCte { token: token.into(), range })
                    } else {
                        None
                    };
                }
                continue;
            }
            b' ' | b'\t' | b'\r' => {
                if token_start > 0 {
                    token_closed = true;
                }
                continue;
            }
            _ => {
                if token_closed {
                    continue;
                }
                if token_start == 0 {
                    token_start = cur.offset();
                }
                token_end = cur.offset();
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cursor::Cursor;

    #[test]
    fn captures_token_and_range() {
        let mut cur = Cursor::new(b"binary\nNext:");
        let r = parse_cte(&mut cur).unwrap();
        assert_eq!(r.token, "BINARY");
        assert_eq!(&cur.bytes(r.range.clone()), b"binary");
    }

    #[test]
    fn stops_token_at_first_whitespace() {
        let mut cur = Cursor::new(b"  7bit (old client)\nNext:");
        let r = parse_cte(&mut cur).unwrap();
        assert_eq!(r.token, "7BIT");
    }
}
