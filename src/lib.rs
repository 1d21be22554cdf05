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

//! # mime-cache
//!
//! A MIME message parser that builds an IMAP-ready index cache record
//! alongside the parsed [`Body`] tree: ENVELOPE, BODYSTRUCTURE, a section
//! table for `FETCH BODY[n]`, the cached subset of headers a server wants
//! fast access to, and the search-normalised address forms FTS indexing
//! needs. It does not implement its own charset tables, RFC 5322
//! address-list grammar, or content digest — those are supplied by the
//! caller through the [`collab`] traits, which keeps this crate's own
//! dependency surface to [`thiserror`] and [`tracing`] plus, behind the
//! optional `test-support` feature, [`encoding_rs`] for a reference
//! implementation of those traits.
//!
//! ## Usage
//!
//! ```
//! use mime_cache::{parse, Collaborators};
//! use mime_cache::config::Config;
//! use mime_cache::collab::support::{
//!     DefaultAddressParser, DefaultCharsetService, DefaultDigestService,
//! };
//!
//! let input = b"From: a@b\r\nSubject: hi\r\nContent-Type: text/plain\r\n\r\nhello\r\n";
//! let charset = DefaultCharsetService::default();
//! let address = DefaultAddressParser;
//! let digest = DefaultDigestService;
//! let collab = Collaborators { charset: &charset, address: &address, digest: &digest };
//! let cfg = Config::new();
//!
//! let message = parse(input, &cfg, &collab);
//! assert_eq!(message.root.subtype, "PLAIN");
//! ```

pub mod cache;
pub mod collab;
pub mod config;
pub mod core;
pub mod decoders;
pub mod error;
pub mod finder;
pub mod parsers;
pub mod validate;

pub use collab::{AddressParserService, CharsetService, DigestService};
pub use config::Config;
pub use core::{Addr, Address, Body, BodyKind, BoundaryMatch, ByteCursor, Cursor, CursorMut};
pub use core::{DateTime, Envelope, Group, Guid, Param, ParamList, ParsedMessage};
pub use error::{ParseError, ParseResult, ParseWarning};
pub use finder::{find_body_parts, FoundPart, PartPredicate};
pub use parsers::recursor::Collaborators;
pub use validate::{validate_and_copy, ValidationReport};
pub use cache::build_cache_record;

use crate::core::boundary::BoundaryStack;
use crate::parsers::recursor::parse_body_part;
use std::borrow::Cow;

/// Parses `data` read-only. No `Content-Transfer-Encoding: binary` part
/// can be recoded to base64 in this mode — `Body::encoding` is left as
/// `BINARY` verbatim for any such part (§4.7's recode only applies when
/// the caller opts into [`parse_encode`]).
pub fn parse<'x>(data: &'x [u8], cfg: &Config, collab: &Collaborators) -> ParsedMessage<'x> {
    let mut cur = Cursor::new(data);
    let mut boundaries = BoundaryStack::new(cfg.rfc2046_strict);
    let mut warnings = Vec::new();
    let mut nesting_warned = false;
    let (root, _exit) = parse_body_part(
        &mut cur,
        &mut boundaries,
        0,
        cfg,
        collab,
        &mut warnings,
        &mut nesting_warned,
    );
    ParsedMessage {
        raw: Cow::Borrowed(data),
        root,
        warnings,
    }
}

/// Parses `data` with binary re-encoding enabled: any leaf part whose
/// `Content-Transfer-Encoding` token is `BINARY` has its content bytes
/// replaced with a base64 expansion and its header token rewritten to
/// `base64` in place, growing `data` as needed (§4.7). Returns a
/// [`ParsedMessage`] whose `raw` reflects the rewritten bytes, and whose
/// `root`'s offsets are valid for that rewritten buffer — not the
/// original one the caller passed in.
pub fn parse_encode<'x>(
    data: &'x mut Vec<u8>,
    cfg: &Config,
    collab: &Collaborators,
) -> ParsedMessage<'x> {
    let mut boundaries = BoundaryStack::new(cfg.rfc2046_strict);
    let mut warnings = Vec::new();
    let mut nesting_warned = false;
    let (root, _exit) = {
        let mut cur = CursorMut::new(data);
        parse_body_part(
            &mut cur,
            &mut boundaries,
            0,
            cfg,
            collab,
            &mut warnings,
            &mut nesting_warned,
        )
    };
    ParsedMessage {
        raw: Cow::Borrowed(&data[..]),
        root,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::support::{DefaultAddressParser, DefaultCharsetService, DefaultDigestService};

    #[test]
    fn parses_a_minimal_message() {
        let data = b"From: a@b\r\nSubject: hi\r\nContent-Type: text/plain\r\n\r\nhello\r\n";
        let charset = DefaultCharsetService::default();
        let address = DefaultAddressParser;
        let digest = DefaultDigestService;
        let collab = Collaborators {
            charset: &charset,
            address: &address,
            digest: &digest,
        };
        let cfg = Config::new();
        let message = parse(data, &cfg, &collab);
        assert_eq!(message.root.ctype, "TEXT");
        assert_eq!(message.root.subtype, "PLAIN");
        assert!(message.warnings.is_empty());
    }

    #[test]
    fn parse_encode_recodes_binary_leaf() {
        let mut data =
            b"Content-Type: application/octet-stream\r\nContent-Transfer-Encoding: binary\r\n\r\n\x00\x01\x02"
                .to_vec();
        let charset = DefaultCharsetService::default();
        let address = DefaultAddressParser;
        let digest = DefaultDigestService;
        let collab = Collaborators {
            charset: &charset,
            address: &address,
            digest: &digest,
        };
        let cfg = Config::new();
        let message = parse_encode(&mut data, &cfg, &collab);
        assert_eq!(message.root.encoding.as_deref(), Some("BASE64"));
        assert!(message.raw.windows(6).any(|w| w == b"base64"));
    }
}
