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

//! `Message-ID` / `In-Reply-To` / `References` field parser: a
//! whitespace-separated list of `<angle-bracketed>` tokens. Content
//! outside angle brackets is kept verbatim as a fallback for broken
//! clients that omit them entirely.

use std::borrow::Cow;

use crate::core::cursor::ByteCursor;

pub fn parse_id<'x, C: ByteCursor<'x>>(cur: &mut C) -> Vec<Cow<'x, str>> {
    let mut token_start = 0usize;
    let mut token_end = 0usize;
    let mut invalid_start = 0usize;
    let mut invalid_end = 0usize;
    let mut in_id = false;
    let mut ids = Vec::new();

    while let Some(ch) = cur.next() {
        match ch {
            b'\n' => {
                if !cur.try_next_is_space() {
                    if ids.is_empty() && invalid_start > 0 {
                        ids.push(
                            String::from_utf8_lossy(cur.bytes(invalid_start - 1..invalid_end))
                                .into_owned()
                                .into(),
                        );
                    }
                    return ids;
                }
                continue;
            }
            b'<' => {
                in_id = true;
                continue;
            }
            b'>' => {
                in_id = false;
                if token_start > 0 {
                    ids.push(
                        String::from_utf8_lossy(cur.bytes(token_start - 1..token_end))
                            .into_owned()
                            .into(),
                    );
                    token_start = 0;
                }
                continue;
            }
            b' ' | b'\t' | b'\r' => continue,
            _ => (),
        }

        if in_id {
            if token_start == 0 {
                token_start = cur.offset();
            }
            token_end = cur.offset();
        } else {
            if invalid_start == 0 {
                invalid_start = cur.offset();
            }
            invalid_end = cur.offset();
        }
    }

    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cursor::Cursor;

    #[test]
    fn parses_angle_bracketed_list() {
        let mut cur = Cursor::new(b"<a@b>  <c@d>\nNext:");
        assert_eq!(parse_id(&mut cur), vec!["a@b", "c@d"]);
    }

    #[test]
    fn falls_back_to_raw_text_without_brackets() {
        let mut cur = Cursor::new(b"broken-id-no-brackets\nNext:");
        assert_eq!(parse_id(&mut cur), vec!["broken-id-no-brackets"]);
    }
}
