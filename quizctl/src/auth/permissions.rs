//! Normalization of stored API key permissions.
//!
//! API key permissions have been written in two encodings over time:
//!
//! - a list of scope strings: `["quizzes:read", "attempts:write"]`
//! - a map of resource to actions: `{"quizzes": ["read", "write"]}`
//!
//! [`StoredPermissions`] is the only place that inspects the raw JSON shape. [`normalize`] then
//! turns either encoding into the canonical set of catalog scopes. Normalization is total: a
//! legacy or malformed payload degrades to fewer (possibly zero) scopes, it never fails the
//! request.

use serde_json::Value;
use std::collections::BTreeSet;
use tracing::debug;

use super::scopes::Scope;

/// Raw permission payload of an API key, classified by shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredPermissions {
    /// Ordered list of scope strings
    Scopes(Vec<String>),
    /// Resource name mapped to action names, in stored order
    ByResource(Vec<(String, Vec<String>)>),
    /// Anything else (numbers, strings, unparseable text)
    Unsupported,
}

impl StoredPermissions {
    /// Classify a JSON value. Non-string list entries, and map entries whose value is not a
    /// list, are dropped here.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Array(items) => Some(Self::Scopes(
                items.iter().filter_map(|item| item.as_str().map(str::to_string)).collect(),
            )),
            Value::Object(map) => Some(Self::ByResource(
                map.iter()
                    .filter_map(|(resource, actions)| {
                        let actions = actions.as_array()?;
                        let actions = actions.iter().filter_map(|a| a.as_str().map(str::to_string)).collect();
                        Some((resource.clone(), actions))
                    })
                    .collect(),
            )),
            _ => Some(Self::Unsupported),
        }
    }

    /// Classify the JSON text held by a key store. `None` (or JSON `null`) means no permissions
    /// were stored at all.
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        let raw = raw?;
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => Self::from_value(&value),
            Err(e) => {
                debug!("stored permissions are not valid JSON: {e}");
                Some(Self::Unsupported)
            }
        }
    }
}

/// Convert a stored payload into the set of valid catalog scopes it names.
pub fn normalize(raw: Option<&StoredPermissions>) -> BTreeSet<Scope> {
    match raw {
        None | Some(StoredPermissions::Unsupported) => BTreeSet::new(),
        Some(StoredPermissions::Scopes(entries)) => entries.iter().filter_map(|entry| entry.parse().ok()).collect(),
        Some(StoredPermissions::ByResource(entries)) => entries
            .iter()
            .flat_map(|(resource, actions)| actions.iter().filter_map(move |action| Scope::from_parts(resource, action).ok()))
            .collect(),
    }
}

/// Expand a resource→actions map into scope strings, without validation.
///
/// Used at key creation time, where unknown scopes are reported back to the caller rather
/// than dropped.
pub fn expand_resource_map<'a, I>(permissions: I) -> Vec<String>
where
    I: IntoIterator<Item = (&'a String, &'a Vec<String>)>,
{
    permissions
        .into_iter()
        .flat_map(|(resource, actions)| actions.iter().map(move |action| format!("{resource}:{action}")))
        .collect()
}
