//! Character-level similarity ratio.
//!
//! Computes `2 * M / T`, where `M` is the number of chars in matching blocks
//! and `T` the total length of both strings. Matching blocks are found the
//! same way as Python's `difflib.SequenceMatcher` (longest common block
//! first, then recurse on both sides), without the automatic junk heuristic.

use std::collections::HashMap;

/// Similarity of `a` and `b` in `0.0..=1.0`; two empty strings are identical.
///
/// # Examples
///
/// ```
/// use sg_news_digest::similarity::ratio;
///
/// assert_eq!(ratio("abcd", "abcd"), 1.0);
/// assert_eq!(ratio("abcd", "wxyz"), 0.0);
/// assert!((ratio("abcd", "bcde") - 0.75).abs() < 1e-9);
/// ```
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

/// Total size of the matching blocks between `a` and `b`.
fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
    for (j, c) in b.iter().enumerate() {
        b2j.entry(*c).or_default().push(j);
    }

    let mut matched = 0;
    let mut queue = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let (i, j, size) = longest_match(a, &b2j, alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }
        matched += size;
        if alo < i && blo < j {
            queue.push((alo, i, blo, j));
        }
        if i + size < ahi && j + size < bhi {
            queue.push((i + size, ahi, j + size, bhi));
        }
    }
    matched
}

/// Longest block `a[i..i+size] == b[j..j+size]` inside the given windows.
///
/// Ties go to the block that starts earliest in `a`, then in `b`.
fn longest_match(
    a: &[char],
    b2j: &HashMap<char, Vec<usize>>,
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);
    // j2len[j] = length of the match ending at a[i - 1] and b[j]
    let mut j2len: HashMap<usize, usize> = HashMap::new();

    for (i, c) in a.iter().enumerate().take(ahi).skip(alo) {
        let mut next: HashMap<usize, usize> = HashMap::new();
        if let Some(positions) = b2j.get(c) {
            for &j in positions {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let k = j
                    .checked_sub(1)
                    .and_then(|prev| j2len.get(&prev))
                    .copied()
                    .unwrap_or(0)
                    + 1;
                next.insert(j, k);
                if k > best_size {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_size = k;
                }
            }
        }
        j2len = next;
    }

    (best_i, best_j, best_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_and_disjoint() {
        assert_eq!(ratio("", ""), 1.0);
        assert_eq!(ratio("abc", ""), 0.0);
        assert_eq!(ratio("same text", "same text"), 1.0);
        assert_eq!(ratio("abc", "xyz"), 0.0);
    }

    #[test]
    fn test_near_duplicate_titles() {
        let r = ratio(
            "comfortdelgro to introduce new taxi fee",
            "comfortdelgro introduces new taxi fee policy",
        );
        assert!(r > 0.85 && r < 0.9, "ratio was {r}");
    }

    #[test]
    fn test_symmetric_enough_for_unrelated_titles() {
        let r = ratio("hdb resale prices climb", "lion city sailors win league");
        assert!(r < 0.5, "ratio was {r}");
    }

    #[test]
    fn test_unicode() {
        let r = ratio("싱가포르 택시 요금 인상", "싱가포르 택시 요금 인상 발표");
        assert!(r > 0.85, "ratio was {r}");
    }
}
