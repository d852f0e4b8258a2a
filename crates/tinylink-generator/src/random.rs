use crate::Generator;
use rand::Rng;
use tinylink_core::ShortCode;
use typed_builder::TypedBuilder;

/// `[a-zA-Z0-9]`, 62 symbols.
pub const ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub const DEFAULT_LENGTH: usize = 8;

/// Draws every symbol of the code uniformly from an alphabet.
///
/// With the defaults (8 symbols out of 62) two draws collide with probability
/// 1/62^8, so callers still retry on an occupied code.
///
/// # Panics
///
/// The builder panics when given an empty alphabet.
#[derive(Debug, Clone, TypedBuilder)]
pub struct RandomGenerator {
    #[builder(default = DEFAULT_LENGTH)]
    length: usize,
    #[builder(
        default = ALPHANUMERIC,
        setter(transform = |alphabet: &'static [u8]| {
            assert!(!alphabet.is_empty(), "alphabet must not be empty");
            alphabet
        })
    )]
    alphabet: &'static [u8],
}

impl RandomGenerator {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn length(&self) -> usize {
        self.length
    }

    fn next_code(&self) -> String {
        let mut rng = rand::rng();
        (0..self.length)
            .map(|_| self.alphabet[rng.random_range(0..self.alphabet.len())] as char)
            .collect()
    }
}

impl Default for RandomGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for RandomGenerator {
    type Output = ShortCode;

    fn generate(&self) -> Self::Output {
        ShortCode::new_unchecked(self.next_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn default_codes_are_eight_alphanumerics() {
        let generator = RandomGenerator::new();

        for _ in 0..100 {
            let code = generator.generate();
            assert_eq!(code.as_str().len(), 8);
            assert!(code.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn generated_codes_pass_validation() {
        let generator = RandomGenerator::new();
        let code = generator.generate();

        assert!(ShortCode::new(code.as_str()).is_ok());
    }

    #[test]
    fn custom_length_and_alphabet() {
        let generator = RandomGenerator::builder().length(12).alphabet(b"ab").build();
        let code = generator.generate();

        assert_eq!(generator.length(), 12);
        assert_eq!(code.as_str().len(), 12);
        assert!(code.as_str().chars().all(|c| c == 'a' || c == 'b'));
    }

    #[test]
    #[should_panic(expected = "alphabet must not be empty")]
    fn empty_alphabet_is_rejected_at_build_time() {
        RandomGenerator::builder().alphabet(b"").build();
    }

    #[test]
    fn draws_rarely_repeat() {
        let generator = RandomGenerator::new();
        let codes: HashSet<_> = (0..1_000).map(|_| generator.generate()).collect();

        assert_eq!(codes.len(), 1_000);
    }

    #[test]
    fn every_symbol_eventually_appears() {
        let generator = RandomGenerator::new();
        let seen: HashSet<char> = (0..2_000)
            .flat_map(|_| generator.generate().into_inner().into_bytes())
            .map(char::from)
            .collect();

        assert_eq!(seen.len(), ALPHANUMERIC.len());
    }

    #[test]
    fn generator_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RandomGenerator>();
    }
}
