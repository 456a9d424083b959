//! Restrict/exclude pairs describing an allowed subset of values.

use std::collections::BTreeSet;

/// An allowed value subset for one dimension.
///
/// An empty `restrict` set means the dimension is unbounded (any value not
/// excluded is allowed). Exclusions always win over restrictions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintSet<T: Ord> {
    restrict: BTreeSet<T>,
    exclude: BTreeSet<T>,
}

impl<T: Ord> Default for ConstraintSet<T> {
    fn default() -> Self {
        Self {
            restrict: BTreeSet::new(),
            exclude: BTreeSet::new(),
        }
    }
}

impl<T: Ord + Clone> ConstraintSet<T> {
    /// An unbounded set which allows every value.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// A bounded set which allows exactly the given values.
    pub fn bounded(values: impl IntoIterator<Item = T>) -> Self {
        let mut set = Self::default();
        set.add_bounds(values);
        set
    }

    /// True if the set only allows an explicit list of values.
    pub fn is_bounded(&self) -> bool {
        !self.restrict.is_empty()
    }

    pub fn add_bound(&mut self, value: T) -> bool {
        self.restrict.insert(value)
    }

    pub fn add_bounds(&mut self, values: impl IntoIterator<Item = T>) {
        self.restrict.extend(values);
    }

    pub fn exclude(&mut self, value: T) -> bool {
        self.exclude.insert(value)
    }

    pub fn exclude_all(&mut self, values: impl IntoIterator<Item = T>) {
        self.exclude.extend(values);
    }

    pub fn restrictions(&self) -> &BTreeSet<T> {
        &self.restrict
    }

    pub fn exclusions(&self) -> &BTreeSet<T> {
        &self.exclude
    }

    /// Whether a value is allowed by this set.
    pub fn allows(&self, value: &T) -> bool {
        if self.exclude.contains(value) {
            return false;
        }
        !self.is_bounded() || self.restrict.contains(value)
    }

    /// The explicit allowed values, or `None` if the set is unbounded.
    pub fn allowed_values(&self) -> Option<BTreeSet<T>> {
        self.is_bounded()
            .then(|| self.restrict.difference(&self.exclude).cloned().collect())
    }

    /// True if no value can satisfy the set.
    ///
    /// An unbounded set is never empty, since exclusions are always finite.
    pub fn is_empty(&self) -> bool {
        self.allowed_values().is_some_and(|values| values.is_empty())
    }

    /// Narrow this set so it only allows values allowed by both sets.
    pub fn intersect_with(&mut self, other: &ConstraintSet<T>) {
        if other.is_bounded() {
            if self.is_bounded() {
                self.restrict = self.restrict.intersection(&other.restrict).cloned().collect();
                if self.restrict.is_empty() {
                    // an empty restriction would read as unbounded; keep the set impossible instead
                    self.restrict.extend(other.restrict.iter().cloned());
                    self.exclude.extend(other.restrict.iter().cloned());
                }
            } else {
                let excluded = &self.exclude;
                self.restrict = other.restrict.iter().filter(|v| !excluded.contains(v)).cloned().collect();
                if self.restrict.is_empty() {
                    self.restrict.extend(other.restrict.iter().cloned());
                }
            }
        }
        self.exclude.extend(other.exclude.iter().cloned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusion_overrides_restriction() {
        let mut set = ConstraintSet::bounded([1, 2, 3]);
        set.exclude(2);
        assert!(set.allows(&1));
        assert!(!set.allows(&2));
        assert!(!set.allows(&4));

        let mut unbounded = ConstraintSet::unbounded();
        unbounded.exclude(7);
        assert!(unbounded.allows(&100));
        assert!(!unbounded.allows(&7));
    }

    #[test]
    fn exclusion_wins_for_every_restricted_value() {
        for value in 0..10 {
            let mut set = ConstraintSet::bounded(0..10);
            set.exclude(value);
            assert!(!set.allows(&value));
            assert_eq!(set.allowed_values().map(|v| v.len()), Some(9));
        }
    }

    #[test]
    fn boundedness_follows_restrictions() {
        let mut set: ConstraintSet<u8> = ConstraintSet::unbounded();
        assert!(!set.is_bounded());
        assert_eq!(set.allowed_values(), None);
        set.add_bound(3);
        assert!(set.is_bounded());
    }

    #[test]
    fn intersect_with_narrows_and_can_become_empty() {
        let mut set = ConstraintSet::bounded([1, 2, 3]);
        set.intersect_with(&ConstraintSet::bounded([2, 3, 4]));
        assert_eq!(set.allowed_values(), Some([2, 3].into_iter().collect()));

        set.intersect_with(&ConstraintSet::bounded([9]));
        assert!(set.is_bounded());
        assert!(set.is_empty());
    }

    #[test]
    fn intersecting_unbounded_with_bounded_keeps_exclusions() {
        let mut set = ConstraintSet::unbounded();
        set.exclude(2);
        set.intersect_with(&ConstraintSet::bounded([1, 2]));
        assert_eq!(set.allowed_values(), Some([1].into_iter().collect()));
    }
}
