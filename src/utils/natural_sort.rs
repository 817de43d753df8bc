//! Natural ("human") ordering of strings, so that `frame2`
//! sorts before `frame10`. Used to order discovered files
//! deterministically before their indices are parsed.

use std::cmp::Ordering;

/// One piece of a natural sort key. Keys always alternate
/// `Text`, `Number`, `Text`, ... starting with a (possibly
/// empty) `Text`, so two keys are only ever compared
/// segment-for-segment with the same variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySegment {
    Text(String),
    /// Digits with leading zeros stripped (`"0"` for all-zero runs).
    Number(String),
}

impl KeySegment {
    fn number(digits : &str) -> Self {
        let trimmed = digits.trim_start_matches('0');
        if trimmed.is_empty() {
            KeySegment::Number("0".to_string())
        } else {
            KeySegment::Number(trimmed.to_string())
        }
    }
}

impl Ord for KeySegment {
    fn cmp(&self, other : &Self) -> Ordering {
        match (self, other) {
            (KeySegment::Text(a), KeySegment::Text(b)) => a.cmp(b),
            // Arbitrary length digit runs: shorter is smaller
            (KeySegment::Number(a), KeySegment::Number(b)) => {
                a.len().cmp(&b.len()).then_with(|| a.cmp(b))
            },
            (KeySegment::Text(_), KeySegment::Number(_)) => Ordering::Less,
            (KeySegment::Number(_), KeySegment::Text(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for KeySegment {
    fn partial_cmp(&self, other : &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Splits `text` at every transition between digits and
/// non-digits and returns the alternating key.
///
/// ## Example
///
/// ```
/// use ndframes::utils::natural_sort::{natural_keys, KeySegment};
///
/// let key = natural_keys("img010.png");
/// assert_eq!(key, vec![
///     KeySegment::Text("img".to_string()),
///     KeySegment::Number("10".to_string()),
///     KeySegment::Text(".png".to_string()),
/// ]);
/// ```
pub fn natural_keys(text : &str) -> Vec<KeySegment> {
    let mut keys = Vec::new();
    let mut current = String::new();
    let mut in_digits = false;

    for ch in text.chars() {
        let is_digit = ch.is_ascii_digit();
        if is_digit != in_digits {
            if in_digits {
                keys.push(KeySegment::number(&current));
            } else {
                keys.push(KeySegment::Text(current.clone()));
            }
            current.clear();
            in_digits = is_digit;
        }
        current.push(ch);
    }

    if in_digits {
        keys.push(KeySegment::number(&current));
        keys.push(KeySegment::Text(String::new()));
    } else {
        keys.push(KeySegment::Text(current));
    }
    keys
}

/// Compares two strings by their natural keys, falling back
/// to plain string order so that e.g. `a01` and `a1` still
/// have a stable relative order.
pub fn natural_cmp(a : &str, b : &str) -> Ordering {
    natural_keys(a).cmp(&natural_keys(b)).then_with(|| a.cmp(b))
}

/// Sorts a slice of strings (or paths rendered as strings)
/// in place in natural order.
pub fn natural_sort<S : AsRef<str>>(items : &mut [S]) {
    items.sort_by_cached_key(|item| {
        (natural_keys(item.as_ref()), item.as_ref().to_string())
    });
}
