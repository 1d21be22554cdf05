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

//! Parser configuration. A single `Config` is read once per parsed
//! message; there is no process-wide or thread-local state (the source's
//! static header scratch buffer and next-field-id counter are replaced by
//! this per-parse value, per the "Global parser state" redesign note).

/// Selects whether, and how, the caller wants a content digest computed
/// for each leaf part. The digest algorithm itself lives behind
/// [`crate::collab::DigestService`]; this only toggles whether the
/// recursor calls it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GuidMode {
    #[default]
    Disabled,
    Enabled,
}

/// Predicate deciding whether a recognised header line is copied into the
/// root body's `cache_headers` buffer.
pub type CachedHeaderPredicate = std::sync::Arc<dyn Fn(&str) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct Config {
    /// Fail `validate_and_copy` on an 8-bit byte in a header rather than
    /// passing it through.
    pub reject_8bit: bool,
    /// When not rejecting, replace an 8-bit header byte with `X` rather
    /// than passing it through verbatim.
    pub munge_8bit: bool,
    /// Stop caching further header lines past this many per message
    /// (§7 "header-line limit exceeded").
    pub max_header_lines: u32,
    /// RFC 2046 §5.1.1 strict boundary-prefix-collision matching, vs. the
    /// lax substring-equality mode that tolerates pre-5.1 Eudora.
    pub rfc2046_strict: bool,
    /// Maximum multipart/message nesting depth before the recursor stops
    /// descending and logs a warning.
    pub boundary_nesting_limit: u32,
    pub guid_mode: GuidMode,
    pub cached_header_predicate: CachedHeaderPredicate,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject_8bit(mut self, value: bool) -> Self {
        self.reject_8bit = value;
        self
    }

    pub fn munge_8bit(mut self, value: bool) -> Self {
        self.munge_8bit = value;
        self
    }

    pub fn max_header_lines(mut self, value: u32) -> Self {
        self.max_header_lines = value;
        self
    }

    pub fn rfc2046_strict(mut self, value: bool) -> Self {
        self.rfc2046_strict = value;
        self
    }

    pub fn boundary_nesting_limit(mut self, value: u32) -> Self {
        self.boundary_nesting_limit = value;
        self
    }

    pub fn guid_mode(mut self, value: GuidMode) -> Self {
        self.guid_mode = value;
        self
    }

    pub fn cached_header_predicate(
        mut self,
        predicate: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.cached_header_predicate = std::sync::Arc::new(predicate);
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            reject_8bit: false,
            munge_8bit: true,
            max_header_lines: 1024,
            rfc2046_strict: false,
            boundary_nesting_limit: 100,
            guid_mode: GuidMode::default(),
            cached_header_predicate: std::sync::Arc::new(default_cached_header_predicate),
        }
    }
}

/// Matches a small set of headers worth caching by default: `Priority`,
/// `References`, and any `X-Spam-*` header.
fn default_cached_header_predicate(name: &str) -> bool {
    name.eq_ignore_ascii_case("priority")
        || name.eq_ignore_ascii_case("references")
        || name.len() > 7 && name[..7].eq_ignore_ascii_case("x-spam-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_predicate_matches_expected_headers() {
        let cfg = Config::new();
        assert!((cfg.cached_header_predicate)("Priority"));
        assert!((cfg.cached_header_predicate)("X-Spam-Status"));
        assert!(!(cfg.cached_header_predicate)("Subject"));
    }

    #[test]
    fn builder_is_fluent() {
        let cfg = Config::new().reject_8bit(true).max_header_lines(10);
        assert!(cfg.reject_8bit);
        assert_eq!(cfg.max_header_lines, 10);
    }
}
