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

//! Unstructured-text field capture: reads a logical header line up to
//! the first `\n` not followed by linear whitespace, copy-shifting out
//! the CR/LF of any interior folds so the returned value has no
//! embedded line breaks. Used for `Subject`, the message/reference ID
//! fields, and to capture the raw text of address-bearing fields before
//! handing it to an [`crate::collab::AddressParserService`] — decoding
//! `=?charset?` encoded words is that collaborator's job, not this
//! lexer's.

use std::borrow::Cow;

use crate::core::cursor::ByteCursor;

/// Returns the trimmed logical-line text, or `None` if the field was
/// empty. Leaves the cursor positioned after the terminating `\n`.
pub fn parse_raw<'x, C: ByteCursor<'x>>(cur: &mut C) -> Option<Cow<'x, str>> {
    let mut token_start = 0usize;
    let mut token_end = 0usize;

    while let Some(ch) = cur.next() {
        match ch {
            b'\n' => {
                if !cur.try_next_is_space() {
                    return if token_start > 0 {
                        Some(
                            String::from_utf8_lossy(
                                &cur.bytes(token_start - 1..token_end)
                                    .iter()
                                    .copied()
                                    .filter(|&c| c != b'\r' && c != b'\n')
                                    .collect::<Vec<_>>(),
                            )
                            .into_owned()
                            .into(),
                        )
                    } else {
                        None
                    };
                }
                continue;
            }
            b' ' | b'\t' | b'\r' => continue,
            _ => (),
        }

        if token_start == 0 {
            token_start = cur.offset();
        }
        token_end = cur.offset();
    }

    None
}

/// Skips a field's value without retaining it (unrecognised headers).
pub fn parse_and_ignore<'x, C: ByteCursor<'x>>(cur: &mut C) {
    while let Some(ch) = cur.next() {
        if ch == b'\n' && !cur.try_next_is_space() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cursor::Cursor;

    #[test]
    fn captures_folded_line() {
        let mut cur = Cursor::new(b"Re: Saying Hello\r\n \r\nFrom:");
        assert_eq!(parse_raw(&mut cur).as_deref(), Some("Re: Saying Hello"));
    }

    #[test]
    fn interior_fold_loses_crlf_not_the_space() {
        let mut cur = Cursor::new(b"Hello\r\n World\r\nFrom:");
        assert_eq!(parse_raw(&mut cur).as_deref(), Some("Hello World"));
    }

    #[test]
    fn interior_fold_on_tab_keeps_the_tab() {
        let mut cur = Cursor::new(b"Hello\r\n\tWorld\r\nFrom:");
        assert_eq!(parse_raw(&mut cur).as_deref(), Some("Hello\tWorld"));
    }

    #[test]
    fn empty_field_is_none() {
        let mut cur = Cursor::new(b"\nNext:");
        assert_eq!(parse_raw(&mut cur), None);
    }

    #[test]
    fn ignore_stops_at_unfolded_newline() {
        let mut cur = Cursor::new(b"blah blah\nNext:");
        parse_and_ignore(&mut cur);
        assert_eq!(cur.remaining(), b"Next:");
    }
}
