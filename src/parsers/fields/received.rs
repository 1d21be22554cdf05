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

//! `Received` field parser. `Received` trace lines are free-form per RFC
//! 5322 §3.6.7; rather than modelling the full `from`/`by`/`via`/`with`
//! grammar, only the date-time clause after the final `;` is pulled out
//! (trace analysis tools want the timestamp, not the routing detail).
//! A line with no `;` is kept as a raw field with no timestamp, not
//! treated as a parse failure.

use crate::core::cursor::ByteCursor;
use crate::parsers::fields::date::parse_date;

pub struct ReceivedField<'x> {
    pub raw: std::borrow::Cow<'x, str>,
    pub date: Option<crate::core::datetime::DateTime>,
}

pub fn parse_received<'x, C: ByteCursor<'x>>(cur: &mut C) -> Option<ReceivedField<'x>> {
    let raw = crate::parsers::fields::raw::parse_raw(cur)?;
    let date = raw
        .rfind(';')
        .and_then(|pos| {
            let mut date_cur = crate::core::cursor::Cursor::new(raw[pos + 1..].trim().as_bytes());
            parse_date(&mut date_cur)
        });
    Some(ReceivedField { raw, date })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cursor::Cursor;

    #[test]
    fn extracts_date_after_last_semicolon() {
        let input = b"from x.y.test by example.net with ESMTP id ABC12345; 21 Nov 1997 10:05:43 -0600\nNext:";
        let mut cur = Cursor::new(input);
        let r = parse_received(&mut cur).unwrap();
        assert!(r.date.is_some());
    }

    #[test]
    fn no_semicolon_yields_no_date() {
        let mut cur = Cursor::new(b"from x.y.test by example.net\nNext:");
        let r = parse_received(&mut cur).unwrap();
        assert!(r.date.is_none());
    }
}
