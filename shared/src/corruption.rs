//! Partial redaction of instructions before the Operative sees them.

use rand::seq::SliceRandom;
use rand::Rng;

/// Replaces every redacted character.
pub const REDACTION_CHAR: char = '#';

/// Redacts half (rounded down) of the non-space characters of `text`.
///
/// The redacted positions are the first `k` entries of a uniformly random
/// permutation of the non-space positions, drawn fresh from `rng` on every
/// call. Spaces are never redacted and do not count toward `k`.
pub fn corrupt_instruction<R: Rng + ?Sized>(text: &str, rng: &mut R) -> String {
    let mut chars: Vec<char> = text.chars().collect();

    let mut candidates: Vec<usize> = chars
        .iter()
        .enumerate()
        .filter(|(_, c)| **c != ' ')
        .map(|(i, _)| i)
        .collect();
    let k = candidates.len() / 2;

    candidates.shuffle(rng);
    for &index in &candidates[..k] {
        chars[index] = REDACTION_CHAR;
    }

    chars.into_iter().collect()
}
