//! Module version comparison.
//!
//! Versions are compared the way shop module installers compare them:
//! `-`, `_` and `+` act like `.`, and a switch between digits and letters
//! starts a new part (`1.0rc1` reads as `1.0.rc.1`). Numeric parts compare
//! numerically; word parts compare by release stage:
//!
//! `dev` < `alpha` = `a` < `beta` = `b` < `RC` = `rc` < *(number)* < `pl` = `p`
//!
//! Unknown words sort below `dev`.

use std::cmp::Ordering;

/// Release-stage ranks, matched by prefix in this order.
const SPECIAL_FORMS: &[(&str, i32)] = &[
    ("dev", 0),
    ("alpha", 1),
    ("a", 1),
    ("beta", 2),
    ("b", 2),
    ("RC", 3),
    ("rc", 3),
    ("#", 4),
    ("pl", 5),
    ("p", 5),
];

/// Rank given to a numeric part when it meets a word part.
const NUMBER_RANK: i32 = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Number(u64),
    Word(String),
}

impl Part {
    fn rank(&self) -> i32 {
        match self {
            Self::Number(_) => NUMBER_RANK,
            Self::Word(w) => SPECIAL_FORMS
                .iter()
                .find(|(name, _)| w.starts_with(name))
                .map_or(-1, |(_, rank)| *rank),
        }
    }
}

fn flush(current: &mut String, is_digit: bool, parts: &mut Vec<Part>) {
    if current.is_empty() {
        return;
    }
    let part = if is_digit {
        // Absurdly long digit runs saturate instead of failing.
        Part::Number(current.parse().unwrap_or(u64::MAX))
    } else {
        Part::Word(current.clone())
    };
    parts.push(part);
    current.clear();
}

/// Splits a version string into comparable parts.
fn canonicalize(version: &str) -> Vec<Part> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut current_is_digit = false;

    for c in version.chars() {
        if c.is_ascii_alphanumeric() || c == '#' {
            let is_digit = c.is_ascii_digit();
            if !current.is_empty() && is_digit != current_is_digit {
                flush(&mut current, current_is_digit, &mut parts);
            }
            current_is_digit = is_digit;
            current.push(c);
        } else {
            flush(&mut current, current_is_digit, &mut parts);
        }
    }
    flush(&mut current, current_is_digit, &mut parts);
    parts
}

fn compare_parts(a: &Part, b: &Part) -> Ordering {
    match (a, b) {
        (Part::Number(x), Part::Number(y)) => x.cmp(y),
        _ => a.rank().cmp(&b.rank()),
    }
}

/// Compares the parts left over on the longer side against "a plain release".
fn compare_remainder(rest: &[Part]) -> Ordering {
    for part in rest {
        let ordering = match part {
            Part::Number(_) => Ordering::Greater,
            Part::Word(_) => part.rank().cmp(&NUMBER_RANK),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Compares two version strings.
///
/// # Examples
///
/// ```
/// use std::cmp::Ordering;
/// use adminkit_core::version::version_compare;
///
/// assert_eq!(version_compare("1.2.0", "1.10.0"), Ordering::Less);
/// assert_eq!(version_compare("2.0.0-rc1", "2.0.0"), Ordering::Less);
/// assert_eq!(version_compare("1.0", "1.0.0"), Ordering::Less);
/// assert_eq!(version_compare("1.0.0pl1", "1.0.0"), Ordering::Greater);
/// ```
pub fn version_compare(a: &str, b: &str) -> Ordering {
    let left = canonicalize(a);
    let right = canonicalize(b);

    for (l, r) in left.iter().zip(right.iter()) {
        let ordering = compare_parts(l, r);
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    let common = left.len().min(right.len());
    match left.len().cmp(&right.len()) {
        Ordering::Equal => Ordering::Equal,
        Ordering::Greater => compare_remainder(&left[common..]),
        Ordering::Less => compare_remainder(&right[common..]).reverse(),
    }
}

/// Returns `true` when `installed` is strictly older than `available`.
///
/// Empty versions never compare as upgradable.
pub fn is_older(installed: &str, available: &str) -> bool {
    if installed.trim().is_empty() || available.trim().is_empty() {
        return false;
    }
    version_compare(installed, available) == Ordering::Less
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_versions() {
        assert_eq!(version_compare("1.0.0", "1.0.0"), Ordering::Equal);
        assert_eq!(version_compare("1-0_0", "1.0.0"), Ordering::Equal);
        assert_eq!(version_compare("1.0+0", "1.0.0"), Ordering::Equal);
    }

    #[test]
    fn test_numeric_parts_compare_numerically() {
        assert_eq!(version_compare("1.2.0", "1.10.0"), Ordering::Less);
        assert_eq!(version_compare("2.0", "1.99"), Ordering::Greater);
        assert_eq!(version_compare("1.0.10", "1.0.9"), Ordering::Greater);
    }

    #[test]
    fn test_release_stages() {
        assert_eq!(version_compare("1.0dev", "1.0alpha"), Ordering::Less);
        assert_eq!(version_compare("1.0alpha", "1.0a"), Ordering::Equal);
        assert_eq!(version_compare("1.0alpha1", "1.0beta1"), Ordering::Less);
        assert_eq!(version_compare("1.0b2", "1.0RC1"), Ordering::Less);
        assert_eq!(version_compare("1.0RC1", "1.0rc1"), Ordering::Equal);
        assert_eq!(version_compare("1.0rc2", "1.0.1"), Ordering::Less);
        assert_eq!(version_compare("1.0pl1", "1.0.1"), Ordering::Greater);
    }

    #[test]
    fn test_unknown_words_sort_lowest() {
        assert_eq!(version_compare("1.0.foo", "1.0.dev"), Ordering::Less);
    }

    #[test]
    fn test_longer_version() {
        assert_eq!(version_compare("1.0", "1.0.0"), Ordering::Less);
        assert_eq!(version_compare("1.0.1", "1.0"), Ordering::Greater);
        assert_eq!(version_compare("1.0.0-rc1", "1.0.0"), Ordering::Less);
        assert_eq!(version_compare("1.0.0", "1.0.0-beta"), Ordering::Greater);
        assert_eq!(version_compare("1.0.0-pl", "1.0.0"), Ordering::Greater);
    }

    #[test]
    fn test_canonicalize() {
        assert_eq!(
            canonicalize("1.0rc1"),
            vec![
                Part::Number(1),
                Part::Number(0),
                Part::Word("rc".to_string()),
                Part::Number(1),
            ]
        );
        assert!(canonicalize("").is_empty());
    }

    #[test]
    fn test_is_older() {
        assert!(is_older("1.0.0", "1.1.0"));
        assert!(!is_older("1.1.0", "1.1.0"));
        assert!(!is_older("2.0.0", "1.1.0"));
        assert!(!is_older("", "1.1.0"));
        assert!(!is_older("1.0.0", " "));
    }
}
