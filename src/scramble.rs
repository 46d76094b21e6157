//! Fisher–Yates shuffling for word-order and option-order scrambling.
//!
//! Not cryptographically secure; the only property we need is a uniform
//! distribution over permutations.

use rand::Rng;

/// In-place Fisher–Yates: for `i` from the last index down to 1, swap `i`
/// with a uniformly chosen index in `[0, i]`.
pub fn shuffle<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
  for i in (1..items.len()).rev() {
    let j = rng.gen_range(0..=i);
    items.swap(i, j);
  }
}

/// Return a shuffled copy of `canonical` that differs from canonical order.
///
/// Sequences of length <= 1, or whose elements are all equal, have no other
/// arrangement and are returned unchanged. Otherwise shuffles are redrawn
/// until one differs, which keeps the result uniform over the remaining permutations.
pub fn scramble<T: Clone + PartialEq, R: Rng + ?Sized>(canonical: &[T], rng: &mut R) -> Vec<T> {
  let mut out = canonical.to_vec();
  if !has_other_arrangement(canonical) {
    return out;
  }
  loop {
    shuffle(&mut out, rng);
    if out.as_slice() != canonical {
      return out;
    }
  }
}

fn has_other_arrangement<T: PartialEq>(items: &[T]) -> bool {
  match items.first() {
    Some(first) => items.iter().any(|x| x != first),
    None => false,
  }
}
