//! Kubernetes object name generation
//!
//! Names are limited to 63 characters (DNS label). Generated names reserve
//! room for a `-xxxxx` random suffix drawn from a [`RandomSource`].

use crate::random::RandomSource;
use crate::Result;

/// Maximum length of a generated Kubernetes name
pub const MAX_NAME_LENGTH: usize = 63;

/// Length of the random suffix appended by [`restrict_length_with_random_suffix`]
pub const RANDOM_SUFFIX_LENGTH: usize = 5;

const MAX_GENERATED_NAME_LENGTH: usize = MAX_NAME_LENGTH - RANDOM_SUFFIX_LENGTH - 1;

// No vowels, no ambiguous characters (0/o, 1/l).
const ALPHANUMS: &[u8] = b"bcdfghjklmnpqrstvwxz2456789";

/// Truncate `base` to [`MAX_NAME_LENGTH`] and strip trailing dashes.
pub fn restrict_length(base: &str) -> String {
    truncate(base, MAX_NAME_LENGTH)
        .trim_end_matches('-')
        .to_string()
}

/// Truncate `base` so that `<base>-<suffix>` fits in [`MAX_NAME_LENGTH`] and
/// append a random suffix.
pub fn restrict_length_with_random_suffix(
    base: &str,
    random: &dyn RandomSource,
) -> Result<String> {
    let base = truncate(base, MAX_GENERATED_NAME_LENGTH);
    Ok(format!("{}-{}", base, random_suffix(random)?))
}

fn random_suffix(random: &dyn RandomSource) -> Result<String> {
    let mut raw = [0u8; RANDOM_SUFFIX_LENGTH];
    random.fill(&mut raw)?;
    Ok(raw
        .iter()
        .map(|b| ALPHANUMS[*b as usize % ALPHANUMS.len()] as char)
        .collect())
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::SequenceRandom;

    #[test]
    fn short_names_are_unchanged() {
        assert_eq!(restrict_length("step-build"), "step-build");
    }

    #[test]
    fn long_names_are_truncated() {
        let name = restrict_length(&"a".repeat(100));
        assert_eq!(name.len(), MAX_NAME_LENGTH);
    }

    #[test]
    fn truncation_strips_trailing_dashes() {
        let base = format!("{}--tail", "a".repeat(61));
        assert_eq!(restrict_length(&base), "a".repeat(61));
    }

    #[test]
    fn random_suffix_is_appended() {
        let random = SequenceRandom::default();
        let name = restrict_length_with_random_suffix("place-scripts", &random).unwrap();
        assert_eq!(name, "place-scripts-bcdfg");
    }

    #[test]
    fn random_suffix_keeps_name_within_limit() {
        let random = SequenceRandom::default();
        let name = restrict_length_with_random_suffix(&"x".repeat(80), &random).unwrap();
        assert_eq!(name.len(), MAX_NAME_LENGTH);
    }

    #[test]
    fn successive_suffixes_differ() {
        let random = SequenceRandom::default();
        let a = restrict_length_with_random_suffix("script-0", &random).unwrap();
        let b = restrict_length_with_random_suffix("script-0", &random).unwrap();
        assert_ne!(a, b);
    }
}
