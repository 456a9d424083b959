//! Human-friendly string ordering.
//!
//! Strings are split into runs of digits and runs of everything else. Digit runs
//! compare by numeric value, so `"2" < "10"`; when two runs have the same value the
//! zero-padded one sorts first (`"01" < "1"`). Text runs compare case-insensitively,
//! and a digit run sorts before a text run at the same position.

use std::cmp::Ordering;

#[derive(Debug, PartialEq, Eq)]
enum Chunk<'a> {
    Digits(&'a str),
    Text(&'a str),
}

fn chunks(value: &str) -> Vec<Chunk<'_>> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_digits: Option<bool> = None;
    for (i, ch) in value.char_indices() {
        let digit = ch.is_ascii_digit();
        match in_digits {
            Some(prev) if prev != digit => {
                out.push(make_chunk(&value[start..i], prev));
                start = i;
            },
            _ => {},
        }
        in_digits = Some(digit);
    }
    if let Some(digit) = in_digits {
        out.push(make_chunk(&value[start..], digit));
    }
    out
}

fn make_chunk(text: &str, digits: bool) -> Chunk<'_> {
    if digits { Chunk::Digits(text) } else { Chunk::Text(text) }
}

fn compare_digits(left: &str, right: &str) -> Ordering {
    let left_trimmed = left.trim_start_matches('0');
    let right_trimmed = right.trim_start_matches('0');
    left_trimmed
        .len()
        .cmp(&right_trimmed.len())
        .then_with(|| left_trimmed.cmp(right_trimmed))
        // same value: more leading zeros first
        .then_with(|| right.len().cmp(&left.len()))
}

fn compare_text(left: &str, right: &str) -> Ordering {
    left.chars()
        .flat_map(char::to_lowercase)
        .cmp(right.chars().flat_map(char::to_lowercase))
}

/// Compare two strings in human sort order, ignoring case.
///
/// Returns `Equal` only for strings which differ at most by letter case.
pub fn compare_ignore_case(left: &str, right: &str) -> Ordering {
    let left_chunks = chunks(left);
    let right_chunks = chunks(right);
    for (l, r) in left_chunks.iter().zip(&right_chunks) {
        let order = match (l, r) {
            (Chunk::Digits(a), Chunk::Digits(b)) => compare_digits(a, b),
            (Chunk::Text(a), Chunk::Text(b)) => compare_text(a, b),
            (Chunk::Digits(_), Chunk::Text(_)) => Ordering::Less,
            (Chunk::Text(_), Chunk::Digits(_)) => Ordering::Greater,
        };
        if order != Ordering::Equal {
            return order;
        }
    }
    left_chunks.len().cmp(&right_chunks.len())
}

/// Compare two strings in human sort order; ties on case fall back to ordinal order.
pub fn compare(left: &str, right: &str) -> Ordering {
    compare_ignore_case(left, right).then_with(|| left.cmp(right))
}

/// Sort a list of strings in place using [`compare`].
pub fn sort<S: AsRef<str>>(values: &mut [S]) {
    values.sort_by(|a, b| compare(a.as_ref(), b.as_ref()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_sort_by_value() {
        let mut values = vec!["10", "2", "1", "20"];
        sort(&mut values);
        assert_eq!(values, vec!["1", "2", "10", "20"]);
    }

    #[test]
    fn zero_padded_numbers_sort_first() {
        let mut values = vec!["1", "01", "001", "2"];
        sort(&mut values);
        assert_eq!(values, vec!["001", "01", "1", "2"]);
    }

    #[test]
    fn mixed_runs_compare_piecewise() {
        let mut values = vec!["item10b", "item2", "item10a", "Item1"];
        sort(&mut values);
        assert_eq!(values, vec!["Item1", "item2", "item10a", "item10b"]);
    }

    #[test]
    fn digits_sort_before_text() {
        assert_eq!(compare("5", "a"), Ordering::Less);
        assert_eq!(compare("a", "5"), Ordering::Greater);
    }

    #[test]
    fn case_only_differences_are_equal_ignoring_case() {
        assert_eq!(compare_ignore_case("Spring", "spring"), Ordering::Equal);
        assert_ne!(compare("Spring", "spring"), Ordering::Equal);
    }

    #[test]
    fn prefix_sorts_first() {
        assert_eq!(compare("abc", "abc1"), Ordering::Less);
        assert_eq!(compare("", "a"), Ordering::Less);
    }
}
