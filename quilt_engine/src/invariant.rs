//! Case-insensitive strings and sets.
//!
//! Token names, condition keys and condition values are all compared without
//! regard to letter case. [`Caseless`] keeps the original spelling for display
//! while ordering and hashing on the folded form, and [`InvariantSet`] is the
//! deterministic, human-sorted set built on top of it.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::human_sort;

/// A string compared, ordered and hashed ignoring letter case.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Caseless(String);

impl Caseless {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl PartialEq for Caseless {
    fn eq(&self, other: &Self) -> bool {
        human_sort::compare_ignore_case(&self.0, &other.0) == Ordering::Equal
    }
}

impl Eq for Caseless {}

impl PartialOrd for Caseless {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Caseless {
    fn cmp(&self, other: &Self) -> Ordering {
        human_sort::compare_ignore_case(&self.0, &other.0)
    }
}

impl Hash for Caseless {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for ch in self.0.chars().flat_map(char::to_lowercase) {
            ch.hash(state);
        }
    }
}

impl fmt::Display for Caseless {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Caseless {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Caseless {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A case-insensitive set of strings, iterated in human sort order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvariantSet(BTreeSet<Caseless>);

impl InvariantSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value; returns false if an equal value (ignoring case) was present.
    pub fn insert(&mut self, value: impl Into<String>) -> bool {
        self.0.insert(Caseless::new(value))
    }

    pub fn remove(&mut self, value: &str) -> bool {
        self.0.remove(&Caseless::from(value))
    }

    pub fn contains(&self, value: &str) -> bool {
        self.0.contains(&Caseless::from(value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(Caseless::as_str)
    }

    /// True if the two sets share at least one value.
    pub fn intersects(&self, other: &InvariantSet) -> bool {
        let (small, large) = if self.len() <= other.len() { (self, other) } else { (other, self) };
        small.0.iter().any(|value| large.0.contains(value))
    }

    pub fn intersection(&self, other: &InvariantSet) -> InvariantSet {
        Self(self.0.intersection(&other.0).cloned().collect())
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.iter().map(str::to_string).collect()
    }

    pub(crate) fn as_set(&self) -> &BTreeSet<Caseless> {
        &self.0
    }
}

impl<S: Into<String>> FromIterator<S> for InvariantSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Caseless::new).collect())
    }
}

impl<'a> IntoIterator for &'a InvariantSet {
    type Item = &'a str;
    type IntoIter = std::iter::Map<std::collections::btree_set::Iter<'a, Caseless>, fn(&'a Caseless) -> &'a str>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter().map(Caseless::as_str as fn(&'a Caseless) -> &'a str)
    }
}

impl fmt::Display for InvariantSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self.iter().collect::<Vec<_>>().join(", ");
        f.write_str(&joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn caseless_equality_and_hash_ignore_case() {
        let mut set = HashSet::new();
        set.insert(Caseless::from("Season"));
        assert!(set.contains(&Caseless::from("SEASON")));
        assert_eq!(Caseless::from("dayOfWeek"), Caseless::from("DayOfWeek"));
    }

    #[test]
    fn invariant_set_dedups_ignoring_case_and_keeps_first_spelling() {
        let mut set: InvariantSet = ["Spring", "summer"].into_iter().collect();
        assert!(!set.insert("SPRING"));
        assert!(set.contains("spring"));
        assert_eq!(set.to_vec(), vec!["Spring", "summer"]);
    }

    #[test]
    fn iteration_uses_human_sort() {
        let set: InvariantSet = ["10", "2", "1", "02"].into_iter().collect();
        assert_eq!(set.to_vec(), vec!["1", "02", "2", "10"]);
    }

    #[test]
    fn intersects_is_case_insensitive() {
        let a: InvariantSet = ["Rain", "Storm"].into_iter().collect();
        let b: InvariantSet = ["storm"].into_iter().collect();
        let c: InvariantSet = ["Sun"].into_iter().collect();
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert_eq!(a.intersection(&b).to_vec(), vec!["Storm"]);
    }
}
