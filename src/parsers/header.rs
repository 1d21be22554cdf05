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

//! Header Lexer (`SPEC_FULL.md` §4.3): name/colon extraction, logical-line
//! (fold) assembly, and dispatch to the per-field parsers in
//! [`crate::parsers::fields`]. Operates directly on the live
//! [`ByteCursor`] rather than copying headers into a scratch buffer first
//! — the single-pass slurp-and-dispatch loop below plays the role the
//! source's two-pass "slurp, then scan the copy" approach did, without
//! needing the artificial sentinel byte that approach relied on.

use std::borrow::Cow;

use crate::core::boundary::{BoundaryMatch, BoundaryStack};
use crate::core::cursor::ByteCursor;
use crate::core::datetime::DateTime;
use crate::config::Config;
use crate::error::ParseWarning;
use crate::parsers::fields::content_type::{parse_content_type, ParsedContentType};
use crate::parsers::fields::cte::{parse_cte, ParsedCte};
use crate::parsers::fields::date::parse_date;
use crate::parsers::fields::id::parse_id;
use crate::parsers::fields::raw::{parse_and_ignore, parse_raw};
use crate::parsers::fields::received::parse_received;
use crate::parsers::mime::strip_newline;

/// The recognised field set of `SPEC_FULL.md` §4.3. Anything else is
/// `Other`, captured only for the cache-header predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldName {
    ContentType,
    ContentDisposition,
    ContentTransferEncoding,
    ContentLanguage,
    ContentId,
    ContentDescription,
    ContentLocation,
    ContentMd5,
    Date,
    From,
    To,
    Cc,
    Bcc,
    Sender,
    ReplyTo,
    MessageId,
    InReplyTo,
    References,
    Subject,
    Received,
    Other,
}

impl FieldName {
    fn lookup(name: &[u8]) -> FieldName {
        match_header_name(name)
    }
}

fn match_header_name(name: &[u8]) -> FieldName {
    // A plain case-insensitive match over the recognised set; the source's
    // perfect-hash table bought constant-time dispatch over a fixed
    // `HeaderName` enum, but that table named types this crate no longer
    // has. A straight match is just as correct and doesn't risk silently
    // misclassifying a header from a guessed hash layout.
    if name.eq_ignore_ascii_case(b"content-type") {
        FieldName::ContentType
    } else if name.eq_ignore_ascii_case(b"content-disposition") {
        FieldName::ContentDisposition
    } else if name.eq_ignore_ascii_case(b"content-transfer-encoding") {
        FieldName::ContentTransferEncoding
    } else if name.eq_ignore_ascii_case(b"content-language") {
        FieldName::ContentLanguage
    } else if name.eq_ignore_ascii_case(b"content-id") {
        FieldName::ContentId
    } else if name.eq_ignore_ascii_case(b"content-description") {
        FieldName::ContentDescription
    } else if name.eq_ignore_ascii_case(b"content-location") {
        FieldName::ContentLocation
    } else if name.eq_ignore_ascii_case(b"content-md5") {
        FieldName::ContentMd5
    } else if name.eq_ignore_ascii_case(b"date") {
        FieldName::Date
    } else if name.eq_ignore_ascii_case(b"from") {
        FieldName::From
    } else if name.eq_ignore_ascii_case(b"to") {
        FieldName::To
    } else if name.eq_ignore_ascii_case(b"cc") {
        FieldName::Cc
    } else if name.eq_ignore_ascii_case(b"bcc") {
        FieldName::Bcc
    } else if name.eq_ignore_ascii_case(b"sender") {
        FieldName::Sender
    } else if name.eq_ignore_ascii_case(b"reply-to") {
        FieldName::ReplyTo
    } else if name.eq_ignore_ascii_case(b"message-id") {
        FieldName::MessageId
    } else if name.eq_ignore_ascii_case(b"in-reply-to") {
        FieldName::InReplyTo
    } else if name.eq_ignore_ascii_case(b"references") {
        FieldName::References
    } else if name.eq_ignore_ascii_case(b"subject") {
        FieldName::Subject
    } else if name.eq_ignore_ascii_case(b"received") {
        FieldName::Received
    } else {
        FieldName::Other
    }
}

/// Everything the header lexer extracted from one entity's header block,
/// ready for the Body-Part Recursor to fold into a `Body` (or, for the
/// address/id fields, to hand to the external collaborators).
pub struct HeaderBlock<'x> {
    pub header_offset: usize,
    pub header_end: usize,
    pub header_lines: usize,
    /// Set when the header block ended because a boundary line appeared in
    /// place of the blank separator line (malformed input with no body).
    /// The boundary line itself has already been consumed; its span is
    /// recorded here as `(size, match)`.
    pub saw_boundary: Option<(usize, BoundaryMatch)>,

    pub content_type: Option<ParsedContentType<'x>>,
    pub disposition: Option<ParsedContentType<'x>>,
    pub cte: Option<ParsedCte<'x>>,
    pub language: Vec<Cow<'x, str>>,
    pub location: Option<Cow<'x, str>>,
    pub id: Option<Cow<'x, str>>,
    pub description: Option<Cow<'x, str>>,
    pub md5: Option<Cow<'x, str>>,

    pub date: Option<DateTime>,
    pub subject: Option<Cow<'x, str>>,
    pub from: Option<Cow<'x, str>>,
    pub to: Option<Cow<'x, str>>,
    pub cc: Option<Cow<'x, str>>,
    pub bcc: Option<Cow<'x, str>>,
    pub sender: Option<Cow<'x, str>>,
    pub reply_to: Option<Cow<'x, str>>,
    pub message_id: Option<Cow<'x, str>>,
    pub in_reply_to: Vec<Cow<'x, str>>,
    pub references: Vec<Cow<'x, str>>,
    pub received_date: Option<DateTime>,

    pub cache_headers: Vec<u8>,
    pub warnings: Vec<ParseWarning>,
}

impl<'x> Default for HeaderBlock<'x> {
    fn default() -> Self {
        HeaderBlock {
            header_offset: 0,
            header_end: 0,
            header_lines: 0,
            saw_boundary: None,
            content_type: None,
            disposition: None,
            cte: None,
            language: Vec::new(),
            location: None,
            id: None,
            description: None,
            md5: None,
            date: None,
            subject: None,
            from: None,
            to: None,
            cc: None,
            bcc: None,
            sender: None,
            reply_to: None,
            message_id: None,
            in_reply_to: Vec::new(),
            references: Vec::new(),
            received_date: None,
            cache_headers: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

fn split_language_list(raw: &str) -> Vec<Cow<'static, str>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            let mut t = s.to_string();
            t.make_ascii_uppercase();
            Cow::Owned(t)
        })
        .collect()
}

/// Reads and dispatches one entity's header block starting at the
/// cursor's current position. Leaves the cursor positioned after the
/// blank line terminating the headers, or — if a boundary line appeared
/// in its place — after that boundary line, with `saw_boundary` set.
pub fn parse_headers<'x, C: ByteCursor<'x>>(
    cur: &mut C,
    boundaries: &BoundaryStack,
    config: &Config,
) -> HeaderBlock<'x> {
    let mut block = HeaderBlock::default();
    block.header_offset = cur.offset();
    let mut seen_received = false;
    let mut warned_line_limit = false;

    loop {
        if cur.is_eof() {
            block.header_end = cur.offset();
            break;
        }

        // Lookahead: blank line or boundary line both terminate the
        // header block without being a field.
        cur.checkpoint();
        let line = cur.get_line();
        let trimmed = strip_newline(line);
        if trimmed.is_empty() {
            block.header_end = cur.offset();
            break;
        }
        if trimmed.starts_with(b"--") {
            match boundaries.matches(trimmed) {
                BoundaryMatch::None => {
                    cur.restore();
                }
                m => {
                    block.header_end = cur.offset();
                    block.saw_boundary = Some((line.len(), m));
                    break;
                }
            }
        } else {
            cur.restore();
        }

        let field_start = cur.offset();
        let name_range = match scan_field_name(cur) {
            Some(r) => r,
            None => {
                // Not a well-formed "name:" line and not blank/boundary
                // either; skip to the next unfolded newline so a single
                // malformed line cannot wedge the lexer.
                parse_and_ignore(cur);
                continue;
            }
        };
        let name_bytes = cur.bytes(name_range.clone()).to_vec();
        let field = FieldName::lookup(&name_bytes);

        match field {
            FieldName::ContentType => {
                if let Some(parsed) = parse_content_type(cur) {
                    if let Some(w) = &parsed.warning {
                        tracing::debug!(?w, "malformed Content-Type, default applied");
                        block.warnings.push(w.clone());
                    }
                    block.content_type = Some(parsed);
                }
            }
            FieldName::ContentDisposition => {
                if let Some(parsed) = parse_content_type(cur) {
                    block.disposition = Some(parsed);
                }
            }
            FieldName::ContentTransferEncoding => {
                block.cte = parse_cte(cur);
            }
            FieldName::ContentLanguage => {
                if let Some(raw) = parse_raw(cur) {
                    block.language = split_language_list(&raw);
                }
            }
            FieldName::ContentId => {
                block.id = parse_id(cur).into_iter().next();
            }
            FieldName::ContentDescription => {
                block.description = parse_raw(cur);
            }
            FieldName::ContentLocation => {
                block.location = parse_raw(cur);
            }
            FieldName::ContentMd5 => {
                block.md5 = parse_raw(cur);
            }
            FieldName::Date => {
                block.date = parse_date(cur);
                skip_to_end_of_field(cur);
            }
            FieldName::Subject => {
                block.subject = parse_raw(cur);
            }
            FieldName::From => {
                block.from = parse_raw(cur);
            }
            FieldName::To => {
                block.to = parse_raw(cur);
            }
            FieldName::Cc => {
                block.cc = parse_raw(cur);
            }
            FieldName::Bcc => {
                block.bcc = parse_raw(cur);
            }
            FieldName::Sender => {
                block.sender = parse_raw(cur);
            }
            FieldName::ReplyTo => {
                block.reply_to = parse_raw(cur);
            }
            FieldName::MessageId => {
                block.message_id = parse_id(cur).into_iter().next();
            }
            FieldName::InReplyTo => {
                block.in_reply_to = parse_id(cur);
            }
            FieldName::References => {
                block.references = parse_id(cur);
            }
            FieldName::Received => {
                if !seen_received {
                    if let Some(r) = parse_received(cur) {
                        block.received_date = r.date;
                    }
                    seen_received = true;
                } else {
                    parse_and_ignore(cur);
                }
            }
            FieldName::Other => {
                parse_and_ignore(cur);
            }
        }

        let field_end = cur.offset();
        let name_str = String::from_utf8_lossy(&name_bytes);
        if (config.cached_header_predicate)(&name_str) {
            if block.header_lines < config.max_header_lines as usize {
                let mut raw = cur.bytes(field_start..field_end).to_vec();
                if !raw.ends_with(b"\r\n") {
                    if raw.ends_with(b"\n") {
                        raw.pop();
                    }
                    raw.extend_from_slice(b"\r\n");
                }
                block.cache_headers.extend_from_slice(&raw);
            } else if !warned_line_limit {
                tracing::warn!(limit = config.max_header_lines, "header line limit exceeded");
                block.warnings.push(ParseWarning::HeaderLineLimitExceeded {
                    limit: config.max_header_lines,
                });
                warned_line_limit = true;
            }
        }

        block.header_lines += cur.bytes(field_start..field_end).iter().filter(|&&b| b == b'\n').count();
    }

    block
}

/// Scans a header name up to (and consuming) its terminating `:`. Names
/// must be non-empty, every byte strictly greater than SPACE, and at
/// most 255 octets — a malformed name (control byte, empty, oversize, or
/// no colon on the line) yields `None` and leaves the cursor untouched.
fn scan_field_name<'x, C: ByteCursor<'x>>(cur: &mut C) -> Option<std::ops::Range<usize>> {
    cur.checkpoint();
    let start = cur.offset();
    let mut end = start;
    loop {
        match cur.peek() {
            Some(b':') => {
                cur.advance(1);
                break;
            }
            Some(c) if c > b' ' => {
                cur.advance(1);
                end = cur.offset();
            }
            _ => {
                cur.restore();
                return None;
            }
        }
    }
    if end == start || end - start > 255 {
        cur.restore();
        return None;
    }
    Some(start..end)
}

fn skip_to_end_of_field<'x, C: ByteCursor<'x>>(cur: &mut C) {
    loop {
        match cur.peek() {
            None => break,
            Some(b'\n') => {
                cur.advance(1);
                if !cur.try_next_is_space() {
                    break;
                }
            }
            _ => cur.advance(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cursor::Cursor;

    #[test]
    fn parses_simple_header_block() {
        let data = b"From: a@b\r\nSubject: hi\r\n\r\nbody";
        let mut cur = Cursor::new(data);
        let boundaries = BoundaryStack::new(true);
        let cfg = Config::new();
        let block = parse_headers(&mut cur, &boundaries, &cfg);
        assert_eq!(block.from.as_deref(), Some("a@b"));
        assert_eq!(block.subject.as_deref(), Some("hi"));
        assert!(block.saw_boundary.is_none());
        assert_eq!(cur.remaining(), b"body");
    }

    #[test]
    fn stops_at_boundary_when_blank_line_absent() {
        let data = b"Content-Type: text/plain\r\n--X\r\nnext";
        let mut cur = Cursor::new(data);
        let mut boundaries = BoundaryStack::new(true);
        boundaries.push(b"X");
        let cfg = Config::new();
        let block = parse_headers(&mut cur, &boundaries, &cfg);
        assert!(block.saw_boundary.is_some());
        assert_eq!(cur.remaining(), b"next");
    }

    #[test]
    fn only_first_received_is_captured() {
        let data = b"Received: from a by b; 21 Nov 1997 10:05:43 -0600\r\nReceived: from c by d; 1 Jan 2000 00:00:00 GMT\r\n\r\n";
        let mut cur = Cursor::new(data);
        let boundaries = BoundaryStack::new(true);
        let cfg = Config::new();
        let block = parse_headers(&mut cur, &boundaries, &cfg);
        assert_eq!(block.received_date.unwrap().year, 1997);
    }

    #[test]
    fn cache_predicate_captures_matching_headers() {
        let data = b"Priority: urgent\r\nSubject: hi\r\n\r\n";
        let mut cur = Cursor::new(data);
        let boundaries = BoundaryStack::new(true);
        let cfg = Config::new();
        let block = parse_headers(&mut cur, &boundaries, &cfg);
        assert_eq!(block.cache_headers, b"Priority: urgent\r\n");
    }
}
