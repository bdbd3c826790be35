//! Ordered variable bindings for formula evaluation.

use serde::{Deserialize, Serialize};

/// An ordered mapping from variable names to values.
///
/// Insertion order is kept so diagnostics list variables the way they were
/// built. Lookups are exact and case-sensitive: `m` and `M` are different
/// variables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableSet {
    entries: Vec<(String, f64)>,
}

impl VariableSet {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Binds `name` to `value`, replacing an existing binding in place.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        if let Some(slot) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.insert(name, value);
        self
    }

    /// Binds `name` to 1.0 or 0.0.
    pub fn insert_flag(&mut self, name: impl Into<String>, flag: bool) {
        self.insert(name, if flag { 1.0 } else { 0.0 });
    }

    /// Looks up a variable by exact name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries
            .iter()
            .find_map(|(n, v)| (n == name).then_some(*v))
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no bindings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates bindings in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), *v))
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for VariableSet {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (name, value) in iter {
            set.insert(name, value);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_sensitive() {
        let vars = VariableSet::new().with("m", 1.0).with("M", 2.0);
        assert_eq!(vars.get("m"), Some(1.0));
        assert_eq!(vars.get("M"), Some(2.0));
        assert_eq!(vars.get("KM"), None);
    }

    #[test]
    fn no_partial_matches() {
        let vars = VariableSet::new().with("SMA", 3.0);
        assert_eq!(vars.get("SM"), None);
        assert_eq!(vars.get("SMAX"), None);
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut vars: VariableSet = [("L", 1.0), ("M", 2.0)].into_iter().collect();
        vars.insert("L", 5.0);
        let names: Vec<_> = vars.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["L", "M"]);
        assert_eq!(vars.get("L"), Some(5.0));
        assert_eq!(vars.len(), 2);
    }

    #[test]
    fn flags_are_numeric() {
        let mut vars = VariableSet::new();
        vars.insert_flag("A", true);
        vars.insert_flag("S", false);
        assert_eq!(vars.get("A"), Some(1.0));
        assert_eq!(vars.get("S"), Some(0.0));
    }
}
