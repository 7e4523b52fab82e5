//! Counter Key Derivation
//!
//! Canonical, injection-safe key strings for the counter store. A key names
//! one counter or block marker:
//! `{operation}:{purpose}:{dimension}:{sanitized_value}`.

/// Character substituted for anything outside the safe set
const KEY_FILLER: char = '_';

/// Protected operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Login,
    Signup,
}

impl Operation {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Operation::Login => "login",
            Operation::Signup => "signup",
        }
    }

    /// The purpose under which this operation counts events.
    ///
    /// Login counts confirmed failures; signup counts attempts, since a
    /// registration request is itself the event of interest.
    pub const fn counting_purpose(&self) -> Purpose {
        match self {
            Operation::Login => Purpose::Fail,
            Operation::Signup => Purpose::Attempt,
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a key counts or marks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Purpose {
    /// Confirmed failed attempts (login)
    Fail,
    /// Attempts regardless of outcome (signup)
    Attempt,
    /// Block sentinel; presence denies the operation
    Block,
}

impl Purpose {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Purpose::Fail => "fail",
            Purpose::Attempt => "attempt",
            Purpose::Block => "block",
        }
    }
}

impl std::fmt::Display for Purpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which identity axis a key tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    /// The user identity (email)
    Identity,
    /// The caller's network origin
    Origin,
}

impl Dimension {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Dimension::Identity => "identity",
            Dimension::Origin => "origin",
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Derive the canonical counter key for a raw identity or origin value.
///
/// The raw value is trimmed, lower-cased, and restricted to a safe character
/// set before being embedded, so one raw value can never inject structure
/// into another key's namespace (`:` in particular never survives). Empty
/// input sanitizes to itself; the resulting key is still well-formed.
pub fn derive_key(
    operation: Operation,
    purpose: Purpose,
    dimension: Dimension,
    raw_value: &str,
) -> String {
    format!(
        "{}:{}:{}:{}",
        operation.as_str(),
        purpose.as_str(),
        dimension.as_str(),
        sanitize(raw_value)
    )
}

/// Lower-case and restrict a raw value to `[a-z0-9@.+_-]`.
///
/// Covers the expected alphabets (email addresses, dotted-decimal IPs)
/// without loss; anything else, including IPv6 colons, collapses to the
/// filler character.
fn sanitize(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .map(|c| if is_safe(c) { c } else { KEY_FILLER })
        .collect()
}

fn is_safe(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '@' | '.' | '+' | '_' | '-')
}
