use rand::Rng;
use std::fmt;

/// A 4-digit prompt shown to the guardian. The first digit is 1-4 and
/// doubles as the rotation amount used to derive the expected code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HintCode {
    digits: [u8; 4],
}

/// The expected 4-digit response derived from a [`HintCode`].
///
/// A convenience deterrent, not cryptography: verification is exact
/// digit-sequence equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverrideCode {
    digits: [u8; 4],
}

impl HintCode {
    /// Draw a fresh hint: first digit in [1,4], the rest in [0,9].
    pub fn generate(rng: &mut impl Rng) -> Self {
        let mut digits = [0u8; 4];
        digits[0] = rng.gen_range(1..=4);
        for d in digits.iter_mut().skip(1) {
            *d = rng.gen_range(0..=9);
        }
        Self { digits }
    }

    pub fn digits(&self) -> [u8; 4] {
        self.digits
    }

    /// Parse a hint from exactly 4 ASCII digits with a leading 1-4.
    pub fn parse(input: &str) -> Option<Self> {
        let digits = parse_digits(input)?;
        if (1..=4).contains(&digits[0]) {
            Some(Self { digits })
        } else {
            None
        }
    }
}

impl OverrideCode {
    /// Parse user input. Anything that is not exactly 4 ASCII digits
    /// yields `None`; callers treat that as an incorrect attempt.
    pub fn parse(input: &str) -> Option<Self> {
        parse_digits(input).map(|digits| Self { digits })
    }
}

fn parse_digits(input: &str) -> Option<[u8; 4]> {
    let bytes = input.as_bytes();
    if bytes.len() != 4 || !bytes.iter().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut digits = [0u8; 4];
    for (d, b) in digits.iter_mut().zip(bytes) {
        *d = b - b'0';
    }
    Some(digits)
}

/// Derive the expected override code from a hint.
///
/// The hint's first digit minus one gives a 0-based start index; the code
/// is the hint's digits read cyclically from that index, i.e. a left
/// rotation of the sequence by that amount.
pub fn derive_override_code(hint: HintCode) -> OverrideCode {
    let digits = hint.digits();
    let start = (digits[0] - 1) as usize;

    let mut out = [0u8; 4];
    for (i, d) in out.iter_mut().enumerate() {
        *d = digits[(start + i) % 4];
    }
    OverrideCode { digits: out }
}

impl fmt::Display for HintCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for d in self.digits {
            write!(f, "{}", d)?;
        }
        Ok(())
    }
}

impl fmt::Display for OverrideCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for d in self.digits {
            write!(f, "{}", d)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn hint(s: &str) -> HintCode {
        HintCode::parse(s).unwrap()
    }

    #[test]
    fn derivation_rotates_by_first_digit() {
        // start = 2, digits read at indices [2,3,0,1]
        assert_eq!(derive_override_code(hint("3172")).to_string(), "7231");
    }

    #[test]
    fn rotation_by_zero_is_identity() {
        assert_eq!(derive_override_code(hint("1000")).to_string(), "1000");
        assert_eq!(derive_override_code(hint("1234")).to_string(), "1234");
    }

    #[test]
    fn rotation_wraps_around() {
        // start = 3, digits read at indices [3,0,1,2]
        assert_eq!(derive_override_code(hint("4321")).to_string(), "1432");
    }

    #[test]
    fn derivation_is_deterministic() {
        let h = hint("2718");
        assert_eq!(derive_override_code(h), derive_override_code(h));
    }

    #[test]
    fn generated_hints_are_well_formed() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..500 {
            let h = HintCode::generate(&mut rng);
            let digits = h.digits();
            assert!((1..=4).contains(&digits[0]));
            assert!(digits.iter().all(|&d| d <= 9));
            assert_eq!(h.to_string().len(), 4);
        }
    }

    #[test]
    fn generated_hints_round_trip_through_derivation() {
        let mut rng = StdRng::seed_from_u64(12);
        for _ in 0..100 {
            let h = HintCode::generate(&mut rng);
            let code = derive_override_code(h);
            // re-deriving from the same hint always matches
            assert_eq!(code, derive_override_code(h));
            assert_eq!(OverrideCode::parse(&code.to_string()), Some(code));
        }
    }

    #[test]
    fn parse_rejects_malformed_input() {
        assert_eq!(OverrideCode::parse(""), None);
        assert_eq!(OverrideCode::parse("123"), None);
        assert_eq!(OverrideCode::parse("12345"), None);
        assert_eq!(OverrideCode::parse("12a4"), None);
        assert_eq!(OverrideCode::parse(" 123"), None);
        assert_eq!(HintCode::parse("0123"), None);
        assert_eq!(HintCode::parse("5123"), None);
    }

    #[test]
    fn verification_is_exact_digit_equality() {
        let code = derive_override_code(hint("1042"));
        assert_eq!(code.to_string(), "1042");
        // leading zeros in the remaining digits are significant
        assert_ne!(OverrideCode::parse("1420"), Some(code));
    }
}
