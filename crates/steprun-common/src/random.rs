//! Random byte sources
//!
//! Pod name suffixes and script heredoc delimiters are drawn from a
//! [`RandomSource`]. Production code uses [`SystemRandom`], backed by the
//! aws-lc-rs CSPRNG. [`SequenceRandom`] produces predictable bytes for tests.

use std::sync::atomic::{AtomicU8, Ordering};

use crate::{Error, Result};

/// A source of random bytes shared safely across concurrent compilations
pub trait RandomSource: Send + Sync {
    /// Fill `buf` entirely with random bytes
    fn fill(&self, buf: &mut [u8]) -> Result<()>;
}

/// Cryptographically secure random source (aws-lc-rs)
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemRandom;

impl RandomSource for SystemRandom {
    fn fill(&self, buf: &mut [u8]) -> Result<()> {
        aws_lc_rs::rand::fill(buf).map_err(|_| Error::RandomSource)
    }
}

/// Deterministic source that yields an incrementing byte sequence.
///
/// Successive draws never repeat until the counter wraps at 256 bytes, which
/// is enough to keep generated names distinct in tests.
#[derive(Debug, Default)]
pub struct SequenceRandom {
    next: AtomicU8,
}

impl SequenceRandom {
    /// Create a source whose first byte is `start`
    pub fn starting_at(start: u8) -> Self {
        Self {
            next: AtomicU8::new(start),
        }
    }
}

impl RandomSource for SequenceRandom {
    fn fill(&self, buf: &mut [u8]) -> Result<()> {
        for b in buf.iter_mut() {
            *b = self.next.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }
}

/// Draw `len` random bytes and hex-encode them
pub fn random_hex(source: &dyn RandomSource, len: usize) -> Result<String> {
    let mut raw = vec![0u8; len];
    source.fill(&mut raw)?;
    Ok(hex::encode(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenRandom;

    impl RandomSource for BrokenRandom {
        fn fill(&self, _buf: &mut [u8]) -> Result<()> {
            Err(Error::RandomSource)
        }
    }

    #[test]
    fn system_random_fills_buffer() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        SystemRandom.fill(&mut a).unwrap();
        SystemRandom.fill(&mut b).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn random_hex_has_two_chars_per_byte() {
        let encoded = random_hex(&SystemRandom, 3).unwrap();
        assert_eq!(encoded.len(), 6);
        assert!(encoded.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn sequence_random_is_predictable() {
        let source = SequenceRandom::starting_at(0xfe);
        assert_eq!(random_hex(&source, 3).unwrap(), "feff00");
        assert_eq!(random_hex(&source, 1).unwrap(), "01");
    }

    #[test]
    fn random_hex_propagates_source_failure() {
        let result = random_hex(&BrokenRandom, 3);
        assert!(matches!(result, Err(Error::RandomSource)));
    }
}
