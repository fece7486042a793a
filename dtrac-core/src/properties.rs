//! Versioned node properties
//!
//! Every tree entry carries its own property set, so properties are
//! versioned together with content and show up as edits in the tree delta.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Property value
pub type PropertyValue = String;

/// Properties of a single node
///
/// Ordered so that trees hash deterministically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySet {
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
}

impl PropertySet {
    /// Create a new empty property set
    pub fn new() -> Self {
        Self {
            properties: BTreeMap::new(),
        }
    }

    /// Get a property value
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// Set a property value
    pub fn set(&mut self, name: String, value: PropertyValue) {
        self.properties.insert(name, value);
    }

    /// Remove a property
    pub fn remove(&mut self, name: &str) -> Option<PropertyValue> {
        self.properties.remove(name)
    }

    /// List all property names
    pub fn list(&self) -> Vec<String> {
        self.properties.keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropertyValue)> {
        self.properties.iter()
    }
}

/// Well-known property names
pub mod svn_props {
    pub const EXECUTABLE: &str = "svn:executable";
    pub const MIME_TYPE: &str = "svn:mime-type";

    /// Revision properties
    pub const REV_AUTHOR: &str = "svn:author";
    pub const REV_LOG: &str = "svn:log";
    pub const REV_DATE: &str = "svn:date";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_set_basic_operations() {
        let mut props = PropertySet::new();
        assert!(props.get("test").is_none());
        assert!(props.is_empty());

        props.set("test".to_string(), "value".to_string());
        assert_eq!(props.get("test"), Some(&"value".to_string()));
        assert!(props.contains("test"));

        assert_eq!(props.remove("test"), Some("value".to_string()));
        assert!(!props.contains("test"));
    }

    #[test]
    fn test_property_set_ordering_is_stable() {
        let mut a = PropertySet::new();
        a.set("z".into(), "1".into());
        a.set("a".into(), "2".into());
        let mut b = PropertySet::new();
        b.set("a".into(), "2".into());
        b.set("z".into(), "1".into());
        assert_eq!(bincode::serialize(&a).unwrap(), bincode::serialize(&b).unwrap());
        assert_eq!(a.list(), vec!["a".to_string(), "z".to_string()]);
    }
}
