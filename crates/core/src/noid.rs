//! Opaque name generation and the NOID check character.
//!
//! Names are drawn from the "betanumeric" alphabet: the ten digits plus
//! nineteen consonants that cannot be confused with digits or each other.
//! The check character follows the NOID check-digit algorithm: a weighted
//! sum of alphabet indices by 1-based position, reduced modulo 29.

use rand::Rng;

/// The 29-symbol alphabet used for generated names and check characters.
pub const BETANUMERIC: &str = "0123456789bcdfghjkmnpqrstvwxz";

const ALPHABET: &[u8] = BETANUMERIC.as_bytes();
const RADIX: u64 = ALPHABET.len() as u64;

/// Position of `c` in the alphabet, if it belongs to it.
pub fn alphabet_index(c: char) -> Option<usize> {
    if !c.is_ascii() {
        return None;
    }
    ALPHABET.iter().position(|&b| b == c as u8)
}

/// Whether every character of `s` belongs to the alphabet.
pub fn is_betanumeric(s: &str) -> bool {
    s.chars().all(|c| alphabet_index(c).is_some())
}

/// Compute the check character for `input`.
///
/// Each character at 1-based position `p` with alphabet index `s` adds
/// `p * s` to the total. `'0'` has index 0 and therefore never contributes,
/// whatever its position. Characters outside the alphabet (such as the `/`
/// separating a NAAN from its shoulder) contribute nothing either; already
/// minted identifiers depend on both behaviours.
pub fn check_char(input: &str) -> char {
    let total = input
        .chars()
        .enumerate()
        .fold(0u64, |acc, (i, c)| match alphabet_index(c) {
            Some(score) => (acc + (i as u64 + 1) * score as u64) % RADIX,
            None => acc,
        });
    ALPHABET[(total % RADIX) as usize] as char
}

/// Whether the last character of `input` is the check character of the rest.
pub fn verify_check_char(input: &str) -> bool {
    let mut chars = input.chars();
    match chars.next_back() {
        Some(last) => check_char(chars.as_str()) == last,
        None => false,
    }
}

/// Source of candidate names for the minter.
pub trait NoidGenerator: Send + Sync {
    /// Produce a candidate of `length` alphabet characters.
    fn generate(&self, length: usize) -> String;
}

/// Generator backed by the thread-local CSPRNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomNoid;

impl NoidGenerator for RandomNoid {
    fn generate(&self, length: usize) -> String {
        let mut rng = rand::rng();
        (0..length)
            .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
            .collect()
    }
}
