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

//! The external collaborator seams this crate consumes instead of
//! implementing directly: charset decoding, MIME-header decoding,
//! binary/base64 re-encoding, address-list tokenisation, and content
//! digesting. Production callers supply their own implementations; the
//! `test-support` feature ships reference ones for tests and examples.

use crate::core::Address;
use crate::core::Guid;

/// Opaque charset identifier resolved by [`CharsetService::lookup`]. Not
/// assumed to be any particular registry; the service that produced it is
/// the only thing that needs to interpret it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CharsetId(pub u16);

impl CharsetId {
    /// Sentinel returned by [`CharsetService::lookup`] when the name is
    /// unrecognised; `to_utf8` callers map this to US-ASCII, per §4.9.
    pub const UNKNOWN: CharsetId = CharsetId(u16::MAX);
}

/// The fixed `Content-Transfer-Encoding` vocabulary (data model invariant
/// 4); anything else is retained verbatim on `Body::encoding` but
/// classified `Unknown` here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    SevenBit,
    EightBit,
    Binary,
    Base64,
    QuotedPrintable,
    Unknown,
}

impl Encoding {
    pub fn from_token(token: &str) -> Self {
        if token.eq_ignore_ascii_case("7BIT") {
            Encoding::SevenBit
        } else if token.eq_ignore_ascii_case("8BIT") {
            Encoding::EightBit
        } else if token.eq_ignore_ascii_case("BINARY") {
            Encoding::Binary
        } else if token.eq_ignore_ascii_case("BASE64") {
            Encoding::Base64
        } else if token.eq_ignore_ascii_case("QUOTED-PRINTABLE") {
            Encoding::QuotedPrintable
        } else {
            Encoding::Unknown
        }
    }
}

/// Charset lookup, transport decode/encode, and header-word decode. Out of
/// scope for this crate per `SPEC_FULL.md` §1; implementations typically
/// wrap a charset table and the transport codecs (base64/quoted-printable)
/// they already maintain elsewhere in the server.
pub trait CharsetService {
    fn lookup(&self, name: &str) -> Option<CharsetId>;
    fn decode_mimebody(&self, bytes: &[u8], encoding: Encoding) -> Vec<u8>;
    /// Re-encodes `bytes` as base64, returning the encoded bytes and the
    /// number of output lines (used for `Body::content_lines` after a
    /// binary-to-base64 recode, §4.7).
    fn encode_mimebody(&self, bytes: &[u8]) -> (Vec<u8>, usize);
    fn to_utf8(&self, bytes: &[u8], charset: CharsetId, encoding: Encoding) -> String;
    /// Decodes RFC 2047 encoded words in a header value (used for the
    /// cache writer's MIME-decoded SUBJECT field).
    fn decode_mime_header(&self, s: &str) -> String;
}

/// RFC 5322 address-list tokenisation, out of scope per `SPEC_FULL.md` §1;
/// the parser only ever calls this across an already-unfolded logical
/// line for `From`/`To`/`Cc`/`Bcc`/`Sender`/`Reply-To`.
pub trait AddressParserService {
    fn parse_addr_list(&self, s: &str) -> Address<'static>;
}

/// Content digest over a part's raw bytes (§6 "Digest service"). The
/// algorithm and width are the collaborator's choice; `Config::guid_mode`
/// only toggles whether the recursor calls it at all.
pub trait DigestService {
    fn digest(&self, bytes: &[u8]) -> Guid;
}

#[cfg(feature = "test-support")]
pub mod support {
    //! Reference collaborator implementations used by this crate's own
    //! tests. These are convenience adapters over `encoding_rs` and the
    //! crate's internal transport-decoder helpers, not a production
    //! charset/address stack — a real IMAP server supplies its own.

    use super::{AddressParserService, CharsetId, CharsetService, DigestService, Encoding};
    use crate::core::{Addr, Address, Guid};
    use crate::decoders::base64::decode_base64;
    use crate::decoders::quoted_printable::quoted_printable_decode;
    use std::sync::Mutex;

    /// Wraps the small set of charsets `encoding_rs` exposes by label,
    /// assigning each a stable [`CharsetId`] the first time it is looked
    /// up.
    pub struct DefaultCharsetService {
        labels: Mutex<Vec<&'static encoding_rs::Encoding>>,
    }

    impl Default for DefaultCharsetService {
        fn default() -> Self {
            DefaultCharsetService {
                labels: Mutex::new(Vec::new()),
            }
        }
    }

    impl CharsetService for DefaultCharsetService {
        fn lookup(&self, name: &str) -> Option<CharsetId> {
            let enc = encoding_rs::Encoding::for_label(name.as_bytes())?;
            let mut labels = self.labels.lock().unwrap();
            if let Some(pos) = labels.iter().position(|e| std::ptr::eq(*e, enc)) {
                return Some(CharsetId(pos as u16));
            }
            labels.push(enc);
            Some(CharsetId((labels.len() - 1) as u16))
        }

        fn decode_mimebody(&self, bytes: &[u8], encoding: Encoding) -> Vec<u8> {
            match encoding {
                Encoding::Base64 => decode_base64(bytes).unwrap_or_default(),
                Encoding::QuotedPrintable => quoted_printable_decode(bytes).unwrap_or_default(),
                _ => bytes.to_vec(),
            }
        }

        fn encode_mimebody(&self, bytes: &[u8]) -> (Vec<u8>, usize) {
            encode_base64_lines(bytes)
        }

        fn to_utf8(&self, bytes: &[u8], charset: CharsetId, _encoding: Encoding) -> String {
            let labels = self.labels.lock().unwrap();
            let enc = labels
                .get(charset.0 as usize)
                .copied()
                .unwrap_or(encoding_rs::UTF_8);
            enc.decode(bytes).0.into_owned()
        }

        fn decode_mime_header(&self, s: &str) -> String {
            s.to_string()
        }
    }

    const BASE64_ALPHABET: &[u8; 64] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

    /// Minimal standard base64 encoder with CRLF every 76 output
    /// characters, matching the line width IMAP clients expect for a
    /// `BASE64` part.
    pub fn encode_base64_lines(bytes: &[u8]) -> (Vec<u8>, usize) {
        let mut out = Vec::with_capacity(bytes.len() * 4 / 3 + 8);
        let mut col = 0usize;
        let mut lines = 0usize;
        for chunk in bytes.chunks(3) {
            let b0 = chunk[0];
            let b1 = *chunk.get(1).unwrap_or(&0);
            let b2 = *chunk.get(2).unwrap_or(&0);
            let c0 = BASE64_ALPHABET[(b0 >> 2) as usize];
            let c1 = BASE64_ALPHABET[(((b0 & 0x03) << 4) | (b1 >> 4)) as usize];
            let c2 = if chunk.len() > 1 {
                BASE64_ALPHABET[(((b1 & 0x0f) << 2) | (b2 >> 6)) as usize]
            } else {
                b'='
            };
            let c3 = if chunk.len() > 2 {
                BASE64_ALPHABET[(b2 & 0x3f) as usize]
            } else {
                b'='
            };
            for c in [c0, c1, c2, c3] {
                out.push(c);
                col += 1;
                if col == 76 {
                    out.extend_from_slice(b"\r\n");
                    lines += 1;
                    col = 0;
                }
            }
        }
        if col > 0 {
            out.extend_from_slice(b"\r\n");
            lines += 1;
        }
        (out, lines)
    }

    /// A compact RFC 5322 address-list tokenizer covering the common
    /// forms (`name <a@b>`, bare `a@b`, comma lists, one level of `( )`
    /// comments, and `group: a@b, c@d;`). Not a full RFC 5322 grammar —
    /// production callers supply a richer parser.
    #[derive(Default)]
    pub struct DefaultAddressParser;

    impl AddressParserService for DefaultAddressParser {
        fn parse_addr_list(&self, s: &str) -> Address<'static> {
            let mut list = Vec::new();
            let mut groups: Vec<crate::core::Group<'static>> = Vec::new();
            let mut in_group: Option<(Option<String>, Vec<Addr<'static>>)> = None;

            for raw_entry in split_top_level(s, ',') {
                let entry = raw_entry.trim();
                if entry.is_empty() {
                    continue;
                }
                if let Some(stripped) = entry.strip_suffix(';') {
                    if let Some((name, addrs)) = in_group.take() {
                        let mut addrs = addrs;
                        if let Some(addr) = parse_one(stripped) {
                            addrs.push(addr);
                        }
                        groups.push(crate::core::Group::new(name.map(Into::into), addrs));
                        continue;
                    }
                }
                if let Some((name, rest)) = entry.split_once(':') {
                    in_group = Some((Some(name.trim().to_string()), Vec::new()));
                    if !rest.trim().is_empty() {
                        if let Some(addr) = parse_one(rest.trim()) {
                            in_group.as_mut().unwrap().1.push(addr);
                        }
                    }
                    continue;
                }
                if let Some(addr) = parse_one(entry) {
                    if let Some((_, addrs)) = in_group.as_mut() {
                        addrs.push(addr);
                    } else {
                        list.push(addr);
                    }
                }
            }
            if let Some((name, addrs)) = in_group.take() {
                groups.push(crate::core::Group::new(name.map(Into::into), addrs));
            }

            if groups.is_empty() {
                Address::List(list)
            } else {
                if !list.is_empty() {
                    groups.push(crate::core::Group::new(None, list));
                }
                Address::Group(groups)
            }
        }
    }

    fn split_top_level(s: &str, sep: char) -> Vec<&str> {
        let mut out = Vec::new();
        let mut depth_angle = 0i32;
        let mut depth_paren = 0i32;
        let mut start = 0usize;
        for (i, c) in s.char_indices() {
            match c {
                '<' => depth_angle += 1,
                '>' => depth_angle -= 1,
                '(' => depth_paren += 1,
                ')' => depth_paren -= 1,
                c if c == sep && depth_angle <= 0 && depth_paren <= 0 => {
                    out.push(&s[start..i]);
                    start = i + 1;
                }
                _ => {}
            }
        }
        out.push(&s[start..]);
        out
    }

    fn parse_one(entry: &str) -> Option<Addr<'static>> {
        let entry = strip_comments(entry);
        let entry = entry.trim();
        if entry.is_empty() {
            return None;
        }
        let (name, mailbox_part) = if let Some(start) = entry.find('<') {
            let name = entry[..start].trim().trim_matches('"').to_string();
            let end = entry[start..].find('>').map(|e| start + e).unwrap_or(entry.len());
            (
                if name.is_empty() { None } else { Some(name) },
                entry[start + 1..end].trim().to_string(),
            )
        } else {
            (None, entry.to_string())
        };
        if mailbox_part.is_empty() {
            return Some(Addr::new(name.map(Into::into), None, None));
        }
        let (mailbox, domain) = match mailbox_part.split_once('@') {
            Some((m, d)) => (m.to_string(), Some(d.to_string())),
            None => (mailbox_part, None),
        };
        Some(Addr::new(
            name.map(Into::into),
            Some(mailbox.into()),
            domain.map(Into::into),
        ))
    }

    fn strip_comments(s: &str) -> String {
        let mut out = String::with_capacity(s.len());
        let mut depth = 0i32;
        for c in s.chars() {
            match c {
                '(' => depth += 1,
                ')' => depth -= 1,
                _ if depth > 0 => {}
                _ => out.push(c),
            }
        }
        out
    }

    /// Deterministic, non-cryptographic FNV-1a-based digest. Adequate for
    /// cache-record de-duplication in tests; production callers typically
    /// plug in a GUID derived from SHA-1 or similar.
    #[derive(Default)]
    pub struct DefaultDigestService;

    impl DigestService for DefaultDigestService {
        fn digest(&self, bytes: &[u8]) -> Guid {
            let mut h1: u64 = 0xcbf29ce484222325;
            let mut h2: u64 = 0x100000001b3;
            for &b in bytes {
                h1 ^= b as u64;
                h1 = h1.wrapping_mul(0x100000001b3);
                h2 = h2.wrapping_mul(31).wrapping_add(b as u64);
            }
            let mut out = Vec::with_capacity(16);
            out.extend_from_slice(&h1.to_be_bytes());
            out.extend_from_slice(&h2.to_be_bytes());
            Guid(out)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn base64_encode_wraps_at_76() {
            let (bytes, lines) = encode_base64_lines(&[0u8; 60]);
            assert_eq!(lines, 1);
            assert!(bytes.ends_with(b"\r\n"));
        }

        #[test]
        fn address_parser_handles_group() {
            let parsed =
                DefaultAddressParser.parse_addr_list("undisclosed: a@b, c@d;, e@f");
            match parsed {
                Address::Group(groups) => {
                    assert_eq!(groups.len(), 2);
                    assert_eq!(groups[0].addresses.len(), 2);
                }
                _ => panic!("expected a group"),
            }
        }

        #[test]
        fn address_parser_handles_plain_list() {
            let parsed = DefaultAddressParser.parse_addr_list("Art <a@b>, c@d");
            match parsed {
                Address::List(list) => assert_eq!(list.len(), 2),
                _ => panic!("expected a list"),
            }
        }
    }
}
