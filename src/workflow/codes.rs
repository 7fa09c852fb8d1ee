// src/workflow/codes.rs
//
// Six-digit verification codes for the two-step gate protocol. A code is
// drawn uniformly and re-drawn while it collides with any code currently
// live in the same phase, so no two simultaneously eligible outpasses can
// carry the same digits.
use rand::Rng;
use std::collections::HashSet;
use thiserror::Error;

pub const CODE_MIN: u32 = 100_000;
pub const CODE_MAX: u32 = 999_999;

/// Draw budget before giving up. The pool holds 900k values, so hitting this
/// means the live set is pathologically large or the RNG is broken.
const MAX_DRAWS: u32 = 64;

#[derive(Debug, Error)]
#[error("could not mint a unique verification code after {MAX_DRAWS} draws")]
pub struct CodePoolExhausted;

/// Mints a code distinct from every entry in `live`.
pub fn mint_code<R: Rng>(rng: &mut R, live: &HashSet<String>) -> Result<String, CodePoolExhausted> {
    for _ in 0..MAX_DRAWS {
        let candidate = rng.gen_range(CODE_MIN..=CODE_MAX).to_string();
        if !live.contains(&candidate) {
            return Ok(candidate);
        }
    }
    Err(CodePoolExhausted)
}

#[cfg(test)]
mod tests {
    use super::{mint_code, CODE_MAX, CODE_MIN};
    use rand::rngs::mock::StepRng;
    use rand::{rngs::StdRng, SeedableRng};
    use std::collections::HashSet;

    #[test]
    fn codes_are_six_digit_numbers() {
        let mut rng = StdRng::seed_from_u64(7);
        let live = HashSet::new();
        for _ in 0..1000 {
            let code = mint_code(&mut rng, &live).unwrap();
            assert_eq!(code.len(), 6);
            let value: u32 = code.parse().unwrap();
            assert!((CODE_MIN..=CODE_MAX).contains(&value));
        }
    }

    #[test]
    fn minting_avoids_live_codes() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut live = HashSet::new();
        // Grow a live set the way concurrent releases would and make sure
        // each new code stays disjoint from it.
        for _ in 0..500 {
            let code = mint_code(&mut rng, &live).unwrap();
            assert!(!live.contains(&code));
            live.insert(code);
        }
        assert_eq!(live.len(), 500);
    }

    #[test]
    fn exhaustion_is_reported_not_looped() {
        // A constant RNG keeps drawing the same value; once that value is
        // live the mint must fail instead of spinning.
        let mut rng = StepRng::new(0, 0);
        let mut live = HashSet::new();
        let only = mint_code(&mut rng, &live).unwrap();
        live.insert(only);
        assert!(mint_code(&mut rng, &live).is_err());
    }
}
