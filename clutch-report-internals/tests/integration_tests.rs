//! Integration tests for the clutch-report-internals crate.
//!
//! These walk a small composition hierarchy the way a host would: each
//! instrumented instance resolves its scope from the key it inherited, then
//! builds the keys it hands to its own children.
//!
//! ## Codec
//! - `test_decode_contract`: three-segment keys decode, anything else is empty
//! - `test_parse_and_encode_are_symmetric`: owned keys survive a wire trip
//!
//! ## Scope derivation
//! - `test_scope_follows_composition_boundaries`: one segment per boundary
//! - `test_list_items_share_scope_but_not_keys`: custom keys disambiguate
//! - `test_scope_cache_identity_lifecycle`: cache stability and refresh
//! - `test_counter_is_shared_across_instances`: fallback ids stay unique

use clutch_report_internals::{
    DebugKey, InstanceCounter, ScopeCache, ScopeId, calculate_scope, decode, derive_scope, encode,
};

#[test]
fn test_decode_contract() {
    assert_eq!(decode("a#b#c"), Some(["a", "b", "c"]));
    assert_eq!(decode("a#b"), None);
    assert_eq!(decode(""), None);
    assert!(DebugKey::parse("no separators at all").is_none());
}

#[test]
fn test_parse_and_encode_are_symmetric() {
    let key = DebugKey::new("3.9", "card", "");
    let raw = key.encode();
    assert_eq!(raw, "3.9#card#");
    assert_eq!(DebugKey::parse(&raw), Some(key.clone()));
    assert_eq!(encode(key.scope(), key.id(), key.custom_key()), raw);
}

#[test]
fn test_scope_follows_composition_boundaries() {
    let counter = InstanceCounter::new();

    // Root page, rendered without any inherited key.
    let mut page = ScopeCache::new();
    let page_scope = page.resolve(None, &counter).clone();
    assert_eq!(page_scope.as_str(), "0");

    // The page composes a `header` instance.
    let header_key = encode(page_scope.as_str(), "header", "");
    let mut header = ScopeCache::new();
    let header_scope = header.resolve(Some(&header_key), &counter).clone();
    assert_eq!(header_scope.as_str(), "header");

    // The header composes a `logo` instance.
    let logo_key = encode(header_scope.as_str(), "logo", "");
    let mut logo = ScopeCache::new();
    let logo_scope = logo.resolve(Some(&logo_key), &counter).clone();
    assert_eq!(logo_scope.as_str(), "header.logo");
    assert_eq!(logo_scope, header_scope.child("logo"));

    // And the logo composes an `image`.
    let image_key = encode(logo_scope.as_str(), "image", "");
    assert_eq!(calculate_scope(Some(&image_key)).as_str(), "header.logo.image");
}

#[test]
fn test_list_items_share_scope_but_not_keys() {
    let parent = ScopeId::new("5");
    let first = encode(parent.as_str(), "item", "0");
    let second = encode(parent.as_str(), "item", "1");

    assert_ne!(first, second);
    assert_eq!(derive_scope(&first), derive_scope(&second));
    assert_eq!(derive_scope(&first), Some(ScopeId::new("5.item")));
    assert!(parent.addresses(&first));
    assert!(parent.addresses(&second));
}

#[test]
fn test_scope_cache_identity_lifecycle() {
    let counter = InstanceCounter::new();
    let mut cache = ScopeCache::new();

    let initial = cache.resolve(Some("0#42#"), &counter).clone();
    for _ in 0..5 {
        assert_eq!(cache.resolve(Some("0#42#"), &counter), &initial);
    }

    // Same decoded identity, so no change.
    assert_eq!(cache.resolve(Some("0#42#"), &counter).as_str(), "42");

    // Repositioned in the hierarchy.
    assert_eq!(cache.resolve(Some("7#42#"), &counter).as_str(), "7.42");

    // Torn down and recreated by the host.
    cache.reset();
    assert_eq!(cache.resolve(Some("7#42#"), &counter).as_str(), "7.42");
}

#[test]
fn test_counter_is_shared_across_instances() {
    let counter = InstanceCounter::new();
    let scopes: Vec<ScopeId> = (0..4)
        .map(|_| ScopeCache::new().resolve(None, &counter).clone())
        .collect();

    assert_eq!(
        scopes.iter().map(ScopeId::as_str).collect::<Vec<_>>(),
        ["0", "1", "2", "3"]
    );
    assert_eq!(counter.issued(), 4);
}
