//! Lazy cross products of condition values.

use std::collections::BTreeMap;

/// Iterator over every combination of one value per key.
///
/// Keys are enumerated in the order given, values in the order given, and the last
/// key varies fastest. Nothing is materialized up front, so even large products can
/// be walked or counted cheaply.
#[derive(Debug, Clone)]
pub struct Permutations<K> {
    dimensions: Vec<(K, Vec<String>)>,
    cursor: Vec<usize>,
    remaining: usize,
}

impl<K: Ord + Clone> Permutations<K> {
    /// `None` if the number of combinations doesn't fit in a `usize`.
    pub fn new(dimensions: Vec<(K, Vec<String>)>) -> Option<Self> {
        let remaining = dimensions
            .iter()
            .try_fold(1usize, |total, (_, values)| total.checked_mul(values.len()))?;
        Some(Self {
            cursor: vec![0; dimensions.len()],
            dimensions,
            remaining,
        })
    }

    /// Keys in enumeration order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.dimensions.iter().map(|(key, _)| key)
    }

    fn advance(&mut self) {
        for (position, (_, values)) in self.dimensions.iter().enumerate().rev() {
            self.cursor[position] += 1;
            if self.cursor[position] < values.len() {
                return;
            }
            self.cursor[position] = 0;
        }
    }
}

impl<K: Ord + Clone> Iterator for Permutations<K> {
    type Item = BTreeMap<K, String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let current = self
            .dimensions
            .iter()
            .zip(&self.cursor)
            .map(|((key, values), &i)| (key.clone(), values[i].clone()))
            .collect();
        self.remaining -= 1;
        self.advance();
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K: Ord + Clone> ExactSizeIterator for Permutations<K> {}

/// Every combination of one value per key, with keys in map order.
///
/// A key with no values yields no permutations at all; no keys yields one empty map.
/// Returns `None` if the number of combinations overflows a `usize`.
pub fn permutations<K: Ord + Clone>(values: BTreeMap<K, Vec<String>>) -> Option<Permutations<K>> {
    Permutations::new(values.into_iter().collect())
}
