//! Namespace name normalization.
//!
//! Clients may address a namespace as `message`, `/message`,
//! `default/message` or `default/message/`; all of them map to the same
//! registry key `default/message`.

/// Sentinel key of the root namespace.
pub const ROOT_NAMESPACE: &str = "default";

/// Resolve a client-supplied namespace string into its canonical key.
///
/// One leading occurrence of the root sentinel is dropped, then every
/// leading and trailing `/`. An empty remainder is the root itself, so the
/// suffix of a non-root key never starts or ends with a slash.
///
/// Total and idempotent: `resolve(&resolve(x)) == resolve(x)` for every `x`.
pub fn resolve(raw: &str) -> String {
    if raw == ROOT_NAMESPACE || raw.is_empty() || raw == "/" {
        return ROOT_NAMESPACE.to_owned();
    }
    let rest = raw.strip_prefix(ROOT_NAMESPACE).unwrap_or(raw);
    let rest = rest.trim_matches('/');
    if rest.is_empty() {
        return ROOT_NAMESPACE.to_owned();
    }
    format!("{ROOT_NAMESPACE}/{rest}")
}

/// Whether `key` is the root namespace.
pub fn is_root(key: &str) -> bool {
    key == ROOT_NAMESPACE
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn root_sentinel_unchanged() {
        assert_eq!(resolve("default"), "default");
    }

    #[test]
    fn empty_and_slash_are_root() {
        assert_eq!(resolve(""), ROOT_NAMESPACE);
        assert_eq!(resolve("/"), ROOT_NAMESPACE);
    }

    #[test]
    fn aliases_share_one_key() {
        let expected = "default/message";
        for raw in ["message", "/message", "default/message", "default/message/", "message/"] {
            assert_eq!(resolve(raw), expected, "alias {raw:?}");
        }
    }

    #[test]
    fn nested_suffix_kept() {
        assert_eq!(resolve("/chat/room-1/"), "default/chat/room-1");
    }

    #[test]
    fn repeated_edge_slashes_stripped() {
        assert_eq!(resolve("//a//"), "default/a");
        assert_eq!(resolve("default//a//"), "default/a");
    }

    #[test]
    fn sentinel_with_only_slashes_is_root() {
        assert_eq!(resolve("default/"), ROOT_NAMESPACE);
        assert_eq!(resolve("///"), ROOT_NAMESPACE);
    }

    #[test]
    fn inner_slashes_preserved() {
        assert_eq!(resolve("a//b"), "default/a//b");
    }

    #[test]
    fn prefix_without_separator_is_stripped() {
        // The sentinel prefix is removed even when not followed by a slash.
        assert_eq!(resolve("defaultroom"), "default/room");
    }

    #[test]
    fn is_root_check() {
        assert!(is_root("default"));
        assert!(!is_root("default/message"));
    }

    proptest! {
        #[test]
        fn resolve_is_idempotent(raw in "[a-z/]{0,12}") {
            let once = resolve(&raw);
            prop_assert_eq!(resolve(&once), once);
        }

        #[test]
        fn resolve_is_idempotent_any_string(raw in ".*") {
            let once = resolve(&raw);
            prop_assert_eq!(resolve(&once), once);
        }

        #[test]
        fn resolved_key_is_rooted(raw in ".*") {
            let key = resolve(&raw);
            if key != ROOT_NAMESPACE {
                let suffix = key.strip_prefix("default/");
                prop_assert!(suffix.is_some());
                let suffix = suffix.unwrap_or_default();
                prop_assert!(!suffix.is_empty());
                prop_assert!(!suffix.starts_with('/') && !suffix.ends_with('/'));
            }
        }

        #[test]
        fn leading_slash_alias(suffix in "[a-z][a-z0-9-]{0,8}") {
            prop_assume!(!suffix.starts_with(ROOT_NAMESPACE));
            prop_assert_eq!(resolve(&suffix), resolve(&format!("/{suffix}")));
            prop_assert_eq!(resolve(&suffix), resolve(&format!("default/{suffix}/")));
        }
    }
}
