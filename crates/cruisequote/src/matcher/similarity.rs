//! Name normalization and string similarity used by the catalog matcher.
//!
//! Lengths and edit distance are measured in Unicode scalar values, not
//! UTF-16 code units. This is a deliberate deviation from a code-unit
//! definition: the two agree for ASCII and other Basic Multilingual Plane
//! names, and differ only for astral characters (emoji, rare CJK), where a
//! surrogate pair counts as one character here.

/// Lowercases, collapses internal whitespace runs to one space, trims.
pub fn normalize(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Similarity score in `[0.0, 1.0]`.
///
/// Identical strings score 1.0 and an empty side scores 0.0. When one
/// string contains the other the score is the length ratio; otherwise it
/// is one minus the Levenshtein distance over the longer length.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let a_len = a.chars().count();
    let b_len = b.chars().count();

    if a.contains(b) || b.contains(a) {
        let (shorter, longer) = if a_len <= b_len {
            (a_len, b_len)
        } else {
            (b_len, a_len)
        };
        return shorter as f64 / longer as f64;
    }

    let distance = levenshtein(a, b);
    1.0 - distance as f64 / a_len.max(b_len) as f64
}

/// Edit distance with unit insertion, deletion and substitution cost.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let m = a_chars.len();
    let n = b_chars.len();

    if m == 0 {
        return n;
    }
    if n == 0 {
        return m;
    }

    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr = vec![0usize; n + 1];

    for (i, &a_ch) in a_chars.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &b_ch) in b_chars.iter().enumerate() {
            let cost = usize::from(a_ch != b_ch);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}
