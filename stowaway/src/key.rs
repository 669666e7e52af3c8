//! Cache key composition.
//!
//! A cache key is `{prefix}{method}__{identifier}`:
//!
//! ```
//! use http::Method;
//! use stowaway::key::compose_key;
//!
//! assert_eq!(compose_key("", &Method::GET, "/a"), "GET__/a");
//! assert_eq!(compose_key("v2:", &Method::POST, "/x?q=1"), "v2:POST__/x?q=1");
//! ```
//!
//! Extension methods may contain `_`, which would make the separator
//! ambiguous, so `_` and `%` inside the method are percent-encoded. Standard
//! methods never contain either and compose unchanged.

use std::borrow::Cow;

use http::Method;

/// Separator between the method and the resource identifier.
pub const KEY_SEPARATOR: &str = "__";

/// Builds the cache key for a request.
pub fn compose_key(prefix: &str, method: &Method, identifier: &str) -> String {
    let method = escape_method(method.as_str());
    let mut key =
        String::with_capacity(prefix.len() + method.len() + KEY_SEPARATOR.len() + identifier.len());
    key.push_str(prefix);
    key.push_str(&method);
    key.push_str(KEY_SEPARATOR);
    key.push_str(identifier);
    key
}

/// Whether `key` falls under `prefix`. An empty prefix claims nothing.
pub fn has_prefix(prefix: &str, key: &str) -> bool {
    !prefix.is_empty() && key.starts_with(prefix)
}

fn escape_method(method: &str) -> Cow<'_, str> {
    if !method.contains(['_', '%']) {
        return Cow::Borrowed(method);
    }
    let mut escaped = String::with_capacity(method.len() + 4);
    for c in method.chars() {
        match c {
            '_' => escaped.push_str("%5F"),
            '%' => escaped.push_str("%25"),
            other => escaped.push(other),
        }
    }
    Cow::Owned(escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_methods_compose_verbatim() {
        assert_eq!(compose_key("", &Method::GET, "/a"), "GET__/a");
        assert_eq!(compose_key("app:", &Method::DELETE, ""), "app:DELETE__");
    }

    #[test]
    fn composition_is_deterministic() {
        let a = compose_key("p", &Method::GET, "https://example.com/x");
        let b = compose_key("p", &Method::GET, "https://example.com/x");
        assert_eq!(a, b);
    }

    #[test]
    fn underscores_in_methods_cannot_collide() {
        let odd = Method::from_bytes(b"GET_").unwrap();
        let left = compose_key("", &odd, "_/a");
        let right = compose_key("", &Method::GET, "__/a");
        assert_ne!(left, right);
        assert_eq!(left, "GET%5F___/a");
    }

    #[test]
    fn distinct_pairs_give_distinct_keys() {
        let pairs = [
            (Method::GET, "/a"),
            (Method::GET, "/b"),
            (Method::POST, "/a"),
            (Method::from_bytes(b"X%5F").unwrap(), "/a"),
            (Method::from_bytes(b"X_").unwrap(), "/a"),
        ];
        let keys: std::collections::HashSet<_> = pairs
            .iter()
            .map(|(method, id)| compose_key("", method, id))
            .collect();
        assert_eq!(keys.len(), pairs.len());
    }

    #[test]
    fn empty_prefix_claims_nothing() {
        assert!(!has_prefix("", "GET__/a"));
        assert!(has_prefix("app:", "app:GET__/a"));
        assert!(!has_prefix("app:", "GET__/a"));
    }
}
