//! Bound variables.
//!
//! A return value stored under one of [`crate::pattern::BINDABLE_KEYS`] names
//! a variable: `(return (ACTOR a1))` binds `a1` to the matched actor's code.
//! Every sub-match that binds the same variable must agree on its value.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings(BTreeMap<String, String>);

impl Bindings {
    /// Bind `var`; false if it is already bound to something else.
    pub fn bind(&mut self, var: &str, value: String) -> bool {
        match self.0.get(var) {
            Some(existing) => *existing == value,
            None => {
                self.0.insert(var.to_string(), value);
                true
            }
        }
    }

    /// Merge `other` if it agrees on every shared variable. Leaves `self`
    /// untouched on conflict.
    pub fn unify(&mut self, other: &Bindings) -> bool {
        if other.0.iter().any(|(k, v)| self.0.get(k).is_some_and(|mine| mine != v)) {
            return false;
        }
        for (k, v) in &other.0 {
            self.0.entry(k.clone()).or_insert_with(|| v.clone());
        }
        true
    }

    pub fn get(&self, var: &str) -> Option<&str> {
        self.0.get(var).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicting_unify_changes_nothing() {
        let mut a = Bindings::default();
        assert!(a.bind("x", "SYR".into()));
        assert!(a.bind("x", "SYR".into()));
        assert!(!a.bind("x", "LBN".into()));

        let mut b = Bindings::default();
        b.bind("y", "1".into());
        b.bind("x", "LBN".into());
        assert!(!a.unify(&b));
        assert_eq!(a.len(), 1);
        assert_eq!(a.get("y"), None);

        let mut c = Bindings::default();
        c.bind("y", "1".into());
        assert!(a.unify(&c));
        assert_eq!(a.get("y"), Some("1"));
    }
}
