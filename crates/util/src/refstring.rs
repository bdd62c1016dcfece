//! Parses and classifies raw `$ref` strings (§4.1 / §6.2): local fragments,
//! sibling/absolute file refs, and remote HTTP(S) refs, with JSON-pointer and
//! percent-decoding applied to the fragment.

use percent_encoding::percent_decode_str;
use std::fmt::{self, Display};
use winnow::{
    Parser,
    combinator::alt,
    error::{ContextError, ErrMode},
    token::{rest, take_until},
};

/// Which of the three reference forms a `$ref` string takes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, derive_more::Display)]
pub enum RefKind {
    /// `#/components/schemas/Pet` — a fragment within the current document
    #[display("local")]
    Local,
    /// `path/to.yaml#/...`, `/abs/path.yaml#/...` — another file, local or
    /// sibling, absolute or relative
    #[display("file")]
    File,
    /// `https://host/path.yaml#/...`
    #[display("http")]
    Http,
}

/// A parsed `$ref` string: its classification, the part before `#` (empty for
/// [RefKind::Local]), and the part after `#` with JSON-pointer escapes and
/// percent-encoding already decoded.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct RefString {
    pub kind: RefKind,
    pub base: String,
    /// `None` when there was no `#` at all (whole-file import); `Some("")`
    /// for an explicit empty fragment, which also means whole-file import.
    pub fragment: Option<Vec<String>>,
}

/// A malformed `$ref` — currently only "contains a backslash", since that is
/// the one syntactic shape the spec calls out as always invalid regardless of
/// what the rest of the string looks like.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("malformed $ref: {0:?}")]
pub struct MalformedRef(pub String);

/// Empty ref strings are rejected by the caller (the walker), not here —
/// classification of `""` would otherwise spuriously succeed as `Local`.
pub fn parse_ref_string(raw: &str) -> Result<RefString, MalformedRef> {
    if raw.contains('\\') {
        return Err(MalformedRef(raw.to_owned()));
    }

    let (base, fragment) = split_base_fragment(raw);
    let kind = classify(base);

    Ok(RefString {
        kind,
        base: base.to_owned(),
        fragment: fragment.map(decode_pointer),
    })
}

/// Split `raw` on the first `#` into (base, fragment-segments-as-raw-string).
fn split_base_fragment(raw: &str) -> (&str, Option<&str>) {
    let mut input = raw;
    let result: Result<&str, ErrMode<ContextError>> =
        alt((take_until(0.., "#"), rest)).parse_next(&mut input);
    let base = result.unwrap_or(raw);
    if base.len() == raw.len() {
        (raw, None)
    } else {
        // `input` now holds everything from `#` onward; drop the `#` itself
        (base, Some(&input[1..]))
    }
}

fn classify(base: &str) -> RefKind {
    if base.is_empty() {
        return RefKind::Local;
    }
    if base.starts_with("http:") || base.starts_with("https:") {
        return RefKind::Http;
    }
    let looks_like_file = base.starts_with('/')
        || base.starts_with("./")
        || base.starts_with("..")
        || base.contains('/')
        || base.ends_with(".yaml")
        || base.ends_with(".yml")
        || base.ends_with(".json")
        || std::path::Path::new(base).extension().is_some();
    if looks_like_file { RefKind::File } else { RefKind::Local }
}

/// Split a raw fragment (`/components/schemas/Pet`) into decoded segments
/// (`["components", "schemas", "Pet"]`), applying percent-decoding then
/// JSON-pointer unescaping (`~1` -> `/`, `~0` -> `~`) per RFC 6901, in that
/// order since a pointer-escaped slash must not be treated as a separator.
fn decode_pointer(fragment: &str) -> Vec<String> {
    let fragment = fragment.strip_prefix('/').unwrap_or(fragment);
    if fragment.is_empty() {
        return Vec::new();
    }
    fragment.split('/').map(decode_pointer_segment).collect()
}

/// Decode a single JSON-pointer segment: percent-decode, then unescape `~1`
/// and `~0` (order matters: `~` unescaping must happen after percent
/// decoding, and `~1` before `~0` to avoid double-unescaping `~01`).
pub fn decode_pointer_segment(segment: &str) -> String {
    let percent_decoded = percent_decode_str(segment).decode_utf8_lossy();
    percent_decoded.replace("~1", "/").replace("~0", "~")
}

impl Display for RefString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#", self.base)?;
        if let Some(segments) = &self.fragment {
            for segment in segments {
                write!(f, "/{segment}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::proptest;
    use rstest::rstest;

    proptest! {
        /// A segment with no `~` or `%` has nothing to unescape or decode, so
        /// it should come back unchanged.
        #[test]
        fn decode_pointer_segment_is_identity_without_escapes(
            segment in "[a-zA-Z0-9_.-]{0,16}",
        ) {
            assert_eq!(decode_pointer_segment(&segment), segment);
        }

        /// `decode_pointer_segment` must never panic, regardless of how the
        /// percent-encoding or `~` escapes are malformed.
        #[test]
        fn decode_pointer_segment_never_panics(segment in ".{0,32}") {
            let _ = decode_pointer_segment(&segment);
        }
    }

    #[rstest]
    #[case::local("#/components/schemas/Pet", RefKind::Local)]
    #[case::relative_file("path/to.yaml#/a", RefKind::File)]
    #[case::dot_relative("./to.yaml#/a", RefKind::File)]
    #[case::absolute_file("/abs/path.yaml#/a", RefKind::File)]
    #[case::http("https://host/path.yaml#/a", RefKind::Http)]
    #[case::http_plain("http://host/path.yaml", RefKind::Http)]
    #[case::whole_file_import("path/to.yaml", RefKind::File)]
    fn classifies_ref_kind(#[case] raw: &str, #[case] expected: RefKind) {
        let parsed = parse_ref_string(raw).unwrap();
        assert_eq!(parsed.kind, expected);
    }

    #[test]
    fn rejects_backslash() {
        assert!(parse_ref_string(r"#/a\b").is_err());
    }

    #[test]
    fn whole_file_import_has_no_fragment() {
        let parsed = parse_ref_string("other.yaml").unwrap();
        assert_eq!(parsed.fragment, None);
    }

    #[test]
    fn decodes_pointer_escapes_and_percent_encoding() {
        let parsed = parse_ref_string("#/paths/~1test~1%7Bid%7D").unwrap();
        assert_eq!(
            parsed.fragment,
            Some(vec!["paths".to_owned(), "/test/{id}".to_owned()])
        );
    }

    #[test]
    fn bracketed_names_pass_through() {
        let parsed =
            parse_ref_string("#/components/schemas/Cake[Burger]").unwrap();
        assert_eq!(
            parsed.fragment.unwrap().last().unwrap(),
            "Cake[Burger]"
        );
    }
}
