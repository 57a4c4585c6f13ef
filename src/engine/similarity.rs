use std::collections::HashMap;

/// Ratcliff/Obershelp similarity: twice the number of characters in matching
/// blocks divided by the combined length of both strings. Matching blocks are
/// found by repeatedly taking the longest common substring and recursing on
/// the unmatched text to its left and right.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a = a.chars().collect::<Vec<char>>();
    let b = b.chars().collect::<Vec<char>>();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    2.0 * matched_chars(&a, &b) as f64 / total as f64
}

fn matched_chars(a: &[char], b: &[char]) -> usize {
    let mut positions: HashMap<char, Vec<usize>> = HashMap::new();
    for (index, ch) in b.iter().enumerate() {
        positions.entry(*ch).or_default().push(index);
    }

    let mut matched = 0usize;
    let mut pending = vec![(0usize, a.len(), 0usize, b.len())];

    while let Some((a_lo, a_hi, b_lo, b_hi)) = pending.pop() {
        let (i, j, size) = longest_match(a, &positions, a_lo, a_hi, b_lo, b_hi);
        if size == 0 {
            continue;
        }

        matched += size;
        if a_lo < i && b_lo < j {
            pending.push((a_lo, i, b_lo, j));
        }
        if i + size < a_hi && j + size < b_hi {
            pending.push((i + size, a_hi, j + size, b_hi));
        }
    }

    matched
}

// Longest common run of a[a_lo..a_hi] and b[b_lo..b_hi]; ties go to the
// earliest start in `a`, then in `b`.
fn longest_match(
    a: &[char],
    positions: &HashMap<char, Vec<usize>>,
    a_lo: usize,
    a_hi: usize,
    b_lo: usize,
    b_hi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_size) = (a_lo, b_lo, 0usize);
    let mut run_lengths: HashMap<usize, usize> = HashMap::new();

    for (i, ch) in a.iter().enumerate().take(a_hi).skip(a_lo) {
        let mut next_lengths: HashMap<usize, usize> = HashMap::new();
        if let Some(indices) = positions.get(ch) {
            for &j in indices {
                if j < b_lo {
                    continue;
                }
                if j >= b_hi {
                    break;
                }
                let length = j
                    .checked_sub(1)
                    .and_then(|previous| run_lengths.get(&previous))
                    .copied()
                    .unwrap_or(0)
                    + 1;
                next_lengths.insert(j, length);
                if length > best_size {
                    best_i = i + 1 - length;
                    best_j = j + 1 - length;
                    best_size = length;
                }
            }
        }
        run_lengths = next_lengths;
    }

    (best_i, best_j, best_size)
}
