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

//! Bodypart Finder (`SPEC_FULL.md` §4.9): walks a parsed [`Body`] tree
//! collecting the leaves whose `(type, subtype)` match a caller-supplied
//! predicate list, dotted-section-numbering them the way IMAP's
//! `FETCH BODY[1.2]` addressing expects, and lazily filling in
//! `decoded_body` for each match through the charset collaborator.

use crate::collab::{CharsetService, Encoding};
use crate::core::body::{Body, BodyKind};
use crate::error::ParseError;

/// One matched leaf: its dotted IMAP section number and the decoded text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundPart {
    pub section: String,
    pub ctype: String,
    pub subtype: String,
    pub decoded_body: String,
}

/// `(type, subtype)` predicate; an empty string at either position is a
/// wildcard, matching any type or any subtype respectively.
#[derive(Debug, Clone, Copy)]
pub struct PartPredicate<'a> {
    pub ctype: &'a str,
    pub subtype: &'a str,
}

impl<'a> PartPredicate<'a> {
    pub fn new(ctype: &'a str, subtype: &'a str) -> Self {
        PartPredicate { ctype, subtype }
    }

    fn matches(&self, body: &Body) -> bool {
        (self.ctype.is_empty() || body.ctype.eq_ignore_ascii_case(self.ctype))
            && (self.subtype.is_empty() || body.subtype.eq_ignore_ascii_case(self.subtype))
    }
}

/// Finds every leaf in `root` matching any of `predicates`, returning one
/// [`FoundPart`] per match in document order. `msg_len` bounds the
/// `content_offset + content_size` sanity check (§4.9); a part that fails
/// it is a fatal [`ParseError::OffsetOutOfRange`], since it would mean the
/// recursor produced an offset past the end of the buffer it parsed.
pub fn find_body_parts(
    root: &Body,
    predicates: &[PartPredicate],
    raw: &[u8],
    msg_len: usize,
    charset: &dyn CharsetService,
) -> Result<Vec<FoundPart>, ParseError> {
    let mut out = Vec::new();
    walk(root, "1", predicates, raw, msg_len, charset, &mut out)?;
    Ok(out)
}

fn walk(
    body: &Body,
    section: &str,
    predicates: &[PartPredicate],
    raw: &[u8],
    msg_len: usize,
    charset: &dyn CharsetService,
    out: &mut Vec<FoundPart>,
) -> Result<(), ParseError> {
    match &body.kind {
        BodyKind::Multipart(children) => {
            for (i, child) in children.iter().enumerate() {
                let child_section = format!("{section}.{}", i + 1);
                walk(child, &child_section, predicates, raw, msg_len, charset, out)?;
            }
            Ok(())
        }
        BodyKind::Message(inner) => walk(inner, &format!("{section}.1"), predicates, raw, msg_len, charset, out),
        BodyKind::Leaf => {
            if !predicates.iter().any(|p| p.matches(body)) {
                return Ok(());
            }
            let end = body
                .content_offset
                .checked_add(body.content_size)
                .filter(|&e| e <= msg_len)
                .ok_or(ParseError::OffsetOutOfRange {
                    offset: body.content_offset,
                    size: body.content_size,
                    len: msg_len,
                })?;
            let bytes = &raw[body.content_offset..end];
            let charset_id = body
                .charset()
                .and_then(|name| charset.lookup(name))
                .unwrap_or(crate::collab::CharsetId::UNKNOWN);
            let encoding = Encoding::from_token(body.encoding.as_deref().unwrap_or("7BIT"));
            let decoded = charset.to_utf8(bytes, charset_id, encoding);
            out.push(FoundPart {
                section: section.to_string(),
                ctype: body.ctype.to_string(),
                subtype: body.subtype.to_string(),
                decoded_body: decoded,
            });
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::support::{DefaultAddressParser, DefaultCharsetService, DefaultDigestService};
    use crate::config::Config;
    use crate::core::boundary::BoundaryStack;
    use crate::core::cursor::Cursor;
    use crate::parsers::recursor::{parse_body_part, Collaborators};

    fn parse<'x>(data: &'x [u8]) -> Body<'x> {
        let mut cur = Cursor::new(data);
        let mut boundaries = BoundaryStack::new(true);
        let cfg = Config::new();
        let charset = DefaultCharsetService::default();
        let address = DefaultAddressParser;
        let digest = DefaultDigestService;
        let collab = Collaborators {
            charset: &charset,
            address: &address,
            digest: &digest,
        };
        let mut warnings = Vec::new();
        let mut warned = false;
        parse_body_part(&mut cur, &mut boundaries, 0, &cfg, &collab, &mut warnings, &mut warned).0
    }

    #[test]
    fn finds_matching_leaf_in_single_part_message() {
        let data = b"Content-Type: text/plain\r\n\r\nhello world\r\n";
        let body = parse(data);
        let charset = DefaultCharsetService::default();
        let found = find_body_parts(
            &body,
            &[PartPredicate::new("text", "plain")],
            data,
            data.len(),
            &charset,
        )
        .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].section, "1");
        assert!(found[0].decoded_body.contains("hello world"));
    }

    #[test]
    fn dotted_sections_number_multipart_children() {
        let data = concat!(
            "Content-Type: multipart/mixed; boundary=X\r\n\r\n",
            "--X\r\nContent-Type: text/plain\r\n\r\npart one\r\n",
            "--X\r\nContent-Type: text/html\r\n\r\n<p>two</p>\r\n",
            "--X--\r\n"
        )
        .as_bytes();
        let body = parse(data);
        let charset = DefaultCharsetService::default();
        let found = find_body_parts(
            &body,
            &[PartPredicate::new("", "")],
            data,
            data.len(),
            &charset,
        )
        .unwrap();
        let sections: Vec<_> = found.iter().map(|f| f.section.as_str()).collect();
        assert_eq!(sections, vec!["1.1", "1.2"]);
    }

    #[test]
    fn wildcard_type_matches_any_subtype() {
        let data = b"Content-Type: image/png\r\n\r\n\x89PNG";
        let body = parse(data);
        let charset = DefaultCharsetService::default();
        let found = find_body_parts(
            &body,
            &[PartPredicate::new("image", "")],
            data,
            data.len(),
            &charset,
        )
        .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].subtype, "PNG");
    }

    #[test]
    fn out_of_range_offset_is_fatal() {
        let mut body = Body::new_default("TEXT", "PLAIN");
        body.content_offset = 0;
        body.content_size = 100;
        let charset = DefaultCharsetService::default();
        let err = find_body_parts(&body, &[PartPredicate::new("", "")], b"short", 5, &charset);
        assert!(matches!(err, Err(ParseError::OffsetOutOfRange { .. })));
    }
}
