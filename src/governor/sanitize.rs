//! Identifier sanitization.
//!
//! Any user-supplied string used as a lookup key (stat and status names,
//! path segments, function names, registry ids) goes through
//! [`sanitize_identifier`] before it is looked up anywhere.
//!
//! An identifier is accepted only if it:
//! - is 1..=64 characters of `[A-Za-z][A-Za-z0-9_]*`
//! - contains no forbidden fragment (`__`, `..`, path separators, quotes,
//!   brackets, template or statement syntax)
//! - is not a reflective/runtime-internal name (`constructor`, `prototype`,
//!   `eval`, ...), compared case-insensitively

use std::fmt;

/// Longest accepted identifier.
pub const MAX_IDENTIFIER_LEN: usize = 64;

const FORBIDDEN_NAMES: &[&str] = &[
    "__proto__",
    "prototype",
    "constructor",
    "__definegetter__",
    "__definesetter__",
    "__lookupgetter__",
    "__lookupsetter__",
    "hasownproperty",
    "isprototypeof",
    "propertyisenumerable",
    "tostring",
    "tolocalestring",
    "valueof",
    "eval",
    "function",
    "require",
    "import",
    "process",
    "globalthis",
    "global",
    "window",
    "module",
    "exports",
    "this",
];

const FORBIDDEN_FRAGMENTS: &[&str] = &[
    "__", "..", "/", "\\", "${", "`", "(", ")", "[", "]", "{", "}", ";", "<", ">", "'", "\"",
    "=", "\0",
];

/// Why an identifier was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Empty,
    TooLong(usize),
    ForbiddenFragment(&'static str),
    ForbiddenName,
    BadCharacter(char),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty identifier"),
            Self::TooLong(len) => {
                write!(f, "identifier of {len} characters exceeds {MAX_IDENTIFIER_LEN}")
            }
            Self::ForbiddenFragment(frag) => write!(f, "contains forbidden sequence {frag:?}"),
            Self::ForbiddenName => write!(f, "forbidden name"),
            Self::BadCharacter(c) => write!(f, "character {c:?} not allowed"),
        }
    }
}

/// Check an identifier against the forbidden patterns and the allow-pattern.
pub fn sanitize_identifier(raw: &str) -> Result<&str, Rejection> {
    check_fragments(raw)?;

    let mut chars = raw.chars();
    let Some(first) = chars.next() else {
        return Err(Rejection::Empty);
    };
    if raw.len() > MAX_IDENTIFIER_LEN {
        return Err(Rejection::TooLong(raw.len()));
    }
    if !first.is_ascii_alphabetic() {
        return Err(Rejection::BadCharacter(first));
    }
    if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
        return Err(Rejection::BadCharacter(bad));
    }

    let lowered = raw.to_ascii_lowercase();
    if FORBIDDEN_NAMES.contains(&lowered.as_str()) {
        return Err(Rejection::ForbiddenName);
    }

    Ok(raw)
}

/// Reject strings containing a forbidden fragment.
///
/// Used on whole dotted paths before they are split into segments.
pub fn check_fragments(raw: &str) -> Result<(), Rejection> {
    match FORBIDDEN_FRAGMENTS.iter().find(|frag| raw.contains(**frag)) {
        Some(frag) => Err(Rejection::ForbiddenFragment(frag)),
        None => Ok(()),
    }
}
