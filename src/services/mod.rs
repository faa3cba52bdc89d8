//! Domain services.
//!
//! Every service borrows the store, mailer and configuration for the length
//! of one request and enforces the invariants of its resource. Handlers stay
//! thin: extract, build an [`access::AccessContext`], call one method.

pub mod access;
pub mod documents;
pub mod error;
pub mod hierarchy;
pub mod membership;
pub mod messages;
pub mod news;
pub mod notifier;
pub mod organizations;
pub mod reports;
pub mod sessions;
pub mod tasks;
pub mod users;

use serde::{Deserialize, Deserializer};

pub use access::{AccessContext, AccessScope};
pub use error::{ServiceError, ServiceResult};

/// Trim, and treat an empty string as absent.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Loose shape check: one `@`, something before it, a dotted domain after.
pub(crate) fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split('.')
            .filter(|part| !part.is_empty())
            .count()
            >= 2
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

/// Distinguishes an absent field from an explicit `null` in update bodies.
///
/// Use with `#[serde(default, deserialize_with = "deserialize_some")]` on an
/// `Option<Option<T>>`: missing → `None`, `null` → `Some(None)`.
pub(crate) fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape() {
        assert!(is_valid_email("ivanov@union.ru"));
        assert!(is_valid_email("  a.b@mail.example.org "));
        assert!(!is_valid_email("ivanov"));
        assert!(!is_valid_email("@union.ru"));
        assert!(!is_valid_email("ivanov@union"));
        assert!(!is_valid_email("ivanov@@union.ru"));
        assert!(!is_valid_email("iva nov@union.ru"));
    }

    #[test]
    fn blank_strings_are_absent() {
        assert_eq!(non_empty(Some("  ".into())), None);
        assert_eq!(non_empty(Some(" x ".into())), Some("x".into()));
        assert_eq!(non_empty(None), None);
    }

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "deserialize_some")]
        parent_id: Option<Option<u32>>,
    }

    #[test]
    fn null_differs_from_missing() {
        let missing: Patch = serde_json::from_str("{}").unwrap();
        let null: Patch = serde_json::from_str(r#"{"parent_id":null}"#).unwrap();
        let set: Patch = serde_json::from_str(r#"{"parent_id":7}"#).unwrap();
        assert_eq!(missing.parent_id, None);
        assert_eq!(null.parent_id, Some(None));
        assert_eq!(set.parent_id, Some(Some(7)));
    }
}
