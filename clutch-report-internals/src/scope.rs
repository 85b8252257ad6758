//! Hierarchical scope identities.
//!
//! Every instrumented instance reports under a scope. A scope is the dotted
//! path of instance ids of the composing instances above it, so two instances
//! rendered by different parents never share an address even when their own
//! ids collide.

use core::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use crate::debug_key::{DebugKey, SEPARATOR, decode};

/// The literal root scope, used when no lineage can be recovered.
pub const ROOT_SCOPE: &str = "0";

/// Separator between the segments of a nested scope.
pub const SCOPE_SEPARATOR: char = '.';

/// A scope address such as `42` or `42.7.3`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(String);

impl ScopeId {
    /// The root sentinel scope `0`.
    pub fn root() -> Self {
        Self(ROOT_SCOPE.to_owned())
    }

    /// Wraps an already computed scope string.
    pub fn new(scope: impl Into<String>) -> Self {
        Self(scope.into())
    }

    /// A flat scope taken from the fallback instance counter.
    pub fn from_counter(value: u64) -> Self {
        Self(value.to_string())
    }

    /// Returns the scope as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the literal root sentinel.
    pub fn is_root(&self) -> bool {
        self.0 == ROOT_SCOPE
    }

    /// The dot-separated segments of this scope, outermost first.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SCOPE_SEPARATOR)
    }

    /// The scope that instance `id` opens when it composes children inside
    /// this scope.
    ///
    /// ```
    /// use clutch_report_internals::ScopeId;
    ///
    /// assert_eq!(ScopeId::root().child("42").as_str(), "42");
    /// assert_eq!(ScopeId::new("42").child("7").as_str(), "42.7");
    /// ```
    pub fn child(&self, id: &str) -> Self {
        nest(&self.0, id)
    }

    /// Whether `composite_key` is addressed directly under this scope.
    ///
    /// Only the first segment of the key is compared, so reports belonging to
    /// nested scopes are not matched.
    pub fn addresses(&self, composite_key: &str) -> bool {
        match decode(composite_key) {
            Some([scope, _, _]) => scope == self.0,
            None => composite_key
                .split_once(SEPARATOR)
                .is_some_and(|(scope, _)| scope == self.0),
        }
    }

    /// Consumes the scope, returning the inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ScopeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<ScopeId> for String {
    fn from(scope: ScopeId) -> Self {
        scope.0
    }
}

fn nest(previous: &str, id: &str) -> ScopeId {
    if !previous.is_empty() && previous != ROOT_SCOPE {
        let mut scope = String::with_capacity(previous.len() + id.len() + 1);
        scope.push_str(previous);
        scope.push(SCOPE_SEPARATOR);
        scope.push_str(id);
        ScopeId(scope)
    } else {
        ScopeId(id.to_owned())
    }
}

impl DebugKey {
    /// The scope an instance receiving this key reports under.
    pub fn derived_scope(&self) -> ScopeId {
        nest(self.scope(), self.id())
    }
}

/// Derives a scope from a raw debug key, or [`None`] if the key is malformed.
pub fn derive_scope(debug_key: &str) -> Option<ScopeId> {
    let [previous, id, _] = decode(debug_key)?;
    Some(nest(previous, id))
}

/// Derives a scope from an optional raw debug key, falling back to the root
/// sentinel.
///
/// ```
/// use clutch_report_internals::calculate_scope;
///
/// assert_eq!(calculate_scope(Some("0#42#")).as_str(), "42");
/// assert_eq!(calculate_scope(Some("7#42#")).as_str(), "7.42");
/// assert_eq!(calculate_scope(Some("")).as_str(), "0");
/// assert_eq!(calculate_scope(None).as_str(), "0");
/// ```
pub fn calculate_scope(debug_key: Option<&str>) -> ScopeId {
    debug_key
        .and_then(derive_scope)
        .unwrap_or_else(ScopeId::root)
}

/// Monotonic source of fallback instance identities.
///
/// Only ever incremented; never reset for the lifetime of its owner.
#[derive(Debug, Default)]
pub struct InstanceCounter(AtomicU64);

impl InstanceCounter {
    /// Creates a counter starting at zero.
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Returns the next value and advances the counter.
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }

    /// The number of values handed out so far.
    pub fn issued(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Clone, Debug)]
struct Resolved {
    input: Option<DebugKey>,
    scope: ScopeId,
}

/// Per-instance memoized scope.
///
/// The scope is computed on first evaluation and then reused until the decoded
/// debug key changes. Keys that fail to decode fall back to a fresh value of the
/// [`InstanceCounter`], so root-level instances still get unique scopes.
#[derive(Clone, Debug, Default)]
pub struct ScopeCache {
    resolved: Option<Resolved>,
}

impl ScopeCache {
    /// Creates an empty cache for a freshly created instance.
    pub const fn new() -> Self {
        Self { resolved: None }
    }

    /// Returns the scope for the current render.
    ///
    /// Recomputes only when nothing is cached yet or when the decoded key
    /// differs from the one the cached scope was derived from.
    pub fn resolve(&mut self, debug_key: Option<&str>, counter: &InstanceCounter) -> &ScopeId {
        let input = debug_key.and_then(DebugKey::parse);

        if self
            .resolved
            .as_ref()
            .is_some_and(|resolved| resolved.input != input)
        {
            self.resolved = None;
        }

        let resolved = self.resolved.get_or_insert_with(|| {
            let issued = counter.next();
            let scope = match &input {
                Some(key) => key.derived_scope(),
                None => ScopeId::from_counter(issued),
            };
            Resolved { input, scope }
        });

        &resolved.scope
    }

    /// The cached scope, if the instance has been evaluated.
    pub fn current(&self) -> Option<&ScopeId> {
        self.resolved.as_ref().map(|resolved| &resolved.scope)
    }

    /// The decoded key the cached scope was derived from.
    pub fn input(&self) -> Option<&DebugKey> {
        self.resolved.as_ref()?.input.as_ref()
    }

    /// Forgets the cached scope, as when the host recreates the instance.
    pub fn reset(&mut self) {
        self.resolved = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static_assertions::assert_impl_all!(InstanceCounter: Send, Sync);
    static_assertions::assert_impl_all!(ScopeCache: Send, Sync, Clone);

    #[test]
    fn test_calculate_scope() {
        assert_eq!(calculate_scope(Some("0#42#")), ScopeId::new("42"));
        assert_eq!(calculate_scope(Some("7#42#")), ScopeId::new("7.42"));
        assert_eq!(calculate_scope(Some("7.42#3#row")), ScopeId::new("7.42.3"));
        assert_eq!(calculate_scope(Some("")), ScopeId::root());
        assert_eq!(calculate_scope(Some("garbage")), ScopeId::root());
    }

    #[test]
    fn test_derive_scope_malformed() {
        assert_eq!(derive_scope("a#b"), None);
        assert_eq!(derive_scope(""), None);
    }

    #[test]
    fn test_scope_addresses() {
        let scope = ScopeId::new("7.42");
        assert!(scope.addresses("7.42#3#"));
        assert!(scope.addresses("7.42#3#row#1"));
        assert!(!scope.addresses("7.42.3#1#"));
        assert!(!scope.addresses("7#42#"));
        assert!(!ScopeId::root().addresses("42#1#"));
    }

    #[test]
    fn test_scope_segments() {
        let scope = ScopeId::new("1.2.3");
        assert_eq!(scope.segments().collect::<Vec<_>>(), ["1", "2", "3"]);
        assert!(!scope.is_root());
        assert!(ScopeId::root().is_root());
    }

    #[test]
    fn test_cache_stable_until_key_changes() {
        let counter = InstanceCounter::new();
        let mut cache = ScopeCache::new();
        assert!(cache.current().is_none());

        let first = cache.resolve(Some("7#42#"), &counter).clone();
        assert_eq!(first.as_str(), "7.42");
        assert_eq!(cache.resolve(Some("7#42#"), &counter), &first);
        assert_eq!(counter.issued(), 1);

        let moved = cache.resolve(Some("8#42#"), &counter).clone();
        assert_eq!(moved.as_str(), "8.42");
        assert_eq!(counter.issued(), 2);
        assert_eq!(cache.input().map(DebugKey::scope), Some("8"));
    }

    #[test]
    fn test_cache_falls_back_to_counter() {
        let counter = InstanceCounter::new();
        counter.next();
        counter.next();

        let mut a = ScopeCache::new();
        let mut b = ScopeCache::new();
        assert_eq!(a.resolve(None, &counter).as_str(), "2");
        assert_eq!(b.resolve(Some("not-a-key"), &counter).as_str(), "3");

        // Malformed keys all decode to "no lineage", so switching between
        // them is not a key change.
        assert_eq!(b.resolve(Some("still-not-a-key"), &counter).as_str(), "3");
        assert_eq!(a.resolve(None, &counter).as_str(), "2");
        assert_eq!(counter.issued(), 4);
    }

    #[test]
    fn test_cache_reset() {
        let counter = InstanceCounter::new();
        let mut cache = ScopeCache::new();
        assert_eq!(cache.resolve(None, &counter).as_str(), "0");
        cache.reset();
        assert!(cache.current().is_none());
        assert_eq!(cache.resolve(None, &counter).as_str(), "1");
    }
}
