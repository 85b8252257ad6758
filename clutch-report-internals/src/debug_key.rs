//! Codec for the compact `scope#id#customKey` debug key.
//!
//! A debug key is handed from a composing instance to each child it renders.
//! It carries just enough lineage for the child to work out its own scope
//! without access to the live component tree.
//!
//! Decoding never fails loudly: anything that does not have the three-segment
//! shape decodes to [`None`], which callers treat as "no lineage available".

use core::fmt;
use std::sync::OnceLock;

use regex::Regex;

/// Separator between the three segments of a debug key.
pub const SEPARATOR: char = '#';

/// A decoded debug key.
///
/// Both `scope` and `id` are non-empty for a key produced by [`DebugKey::parse`];
/// `custom_key` may be empty.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DebugKey {
    scope: String,
    id: String,
    custom_key: String,
}

impl DebugKey {
    /// Creates a key from its three segments.
    pub fn new(
        scope: impl Into<String>,
        id: impl Into<String>,
        custom_key: impl Into<String>,
    ) -> Self {
        Self {
            scope: scope.into(),
            id: id.into(),
            custom_key: custom_key.into(),
        }
    }

    /// Decodes a raw key, returning [`None`] when it is malformed.
    ///
    /// ```
    /// use clutch_report_internals::DebugKey;
    ///
    /// let key = DebugKey::parse("a#b#c").unwrap();
    /// assert_eq!(key.scope(), "a");
    /// assert_eq!(key.id(), "b");
    /// assert_eq!(key.custom_key(), "c");
    ///
    /// assert!(DebugKey::parse("a#b").is_none());
    /// assert!(DebugKey::parse("").is_none());
    /// ```
    pub fn parse(raw: &str) -> Option<Self> {
        let [scope, id, custom_key] = decode(raw)?;
        Some(Self::new(scope, id, custom_key))
    }

    /// The scope of the instance that produced this key.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// The instance id introduced at this position.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Free-form disambiguation suffix, possibly empty.
    pub fn custom_key(&self) -> &str {
        &self.custom_key
    }

    /// Encodes the key back into its wire format.
    pub fn encode(&self) -> String {
        encode(&self.scope, &self.id, &self.custom_key)
    }

    /// Returns the three segments in wire order.
    pub fn into_parts(self) -> [String; 3] {
        [self.scope, self.id, self.custom_key]
    }
}

impl fmt::Display for DebugKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{SEPARATOR}{}{SEPARATOR}{}",
            self.scope, self.id, self.custom_key
        )
    }
}

fn pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();

    // Segments never span line terminators, and the match is not anchored:
    // `a#b#c#d` splits lazily into `a`, `b` and `c#d`.
    PATTERN.get_or_init(|| {
        Regex::new(
            r"([^\n\r\x{2028}\x{2029}]+?)#([^\n\r\x{2028}\x{2029}]+?)#([^\n\r\x{2028}\x{2029}]*)",
        )
        .expect("debug key pattern is valid")
    })
}

/// Splits a raw key into `[scope, id, customKey]`.
///
/// Returns [`None`] when the input does not contain two non-empty segments
/// followed by a (possibly empty) third one.
pub fn decode(raw: &str) -> Option<[&str; 3]> {
    let captures = pattern().captures(raw)?;

    let scope = captures.get(1)?.as_str();
    let id = captures.get(2)?.as_str();
    let custom_key = captures.get(3).map_or("", |m| m.as_str());

    Some([scope, id, custom_key])
}

/// Joins the three segments into the wire format.
///
/// `decode(&encode(a, b, c))` gives back `[a, b, c]` as long as `a` and `b` are
/// non-empty and free of `#`, and no segment contains a line terminator.
pub fn encode(scope: &str, id: &str, custom_key: &str) -> String {
    let mut out = String::with_capacity(scope.len() + id.len() + custom_key.len() + 2);
    out.push_str(scope);
    out.push(SEPARATOR);
    out.push_str(id);
    out.push(SEPARATOR);
    out.push_str(custom_key);
    out
}
