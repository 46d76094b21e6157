//! Normalized Levenshtein similarity used for spelling tolerance.
//!
//! Inputs are compared per `char`; callers normalize case and whitespace first.

/// Single-character insert/delete/substitute edit distance, cost 1 each.
pub fn edit_distance(a: &str, b: &str) -> usize {
  let a: Vec<char> = a.chars().collect();
  let b: Vec<char> = b.chars().collect();
  if a.is_empty() {
    return b.len();
  }
  if b.is_empty() {
    return a.len();
  }

  // Two rows of the DP table are enough.
  let mut prev: Vec<usize> = (0..=b.len()).collect();
  let mut curr = vec![0; b.len() + 1];

  for i in 1..=a.len() {
    curr[0] = i;
    for j in 1..=b.len() {
      let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
      curr[j] = (prev[j] + 1)
        .min(curr[j - 1] + 1)
        .min(prev[j - 1] + cost);
    }
    std::mem::swap(&mut prev, &mut curr);
  }

  prev[b.len()]
}

/// `1 - distance / max(len)`. Zero when either side is empty.
pub fn similarity(a: &str, b: &str) -> f64 {
  let la = a.chars().count();
  let lb = b.chars().count();
  if la == 0 || lb == 0 {
    return 0.0;
  }
  1.0 - edit_distance(a, b) as f64 / la.max(lb) as f64
}
