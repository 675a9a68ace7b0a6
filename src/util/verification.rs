//! Data verification utilities
//!
//! Byte-for-byte comparison of a block read back from the target against the
//! buffer that was written to it.

/// Verification result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationResult {
    /// Data matches what was written
    Success,
    /// Data does not match what was written
    Failure {
        /// Offset of first mismatch within the block
        offset: usize,
        /// Expected value
        expected: u8,
        /// Actual value
        actual: u8,
    },
}

impl VerificationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, VerificationResult::Success)
    }
}

/// Compare a block read back from storage against the expected bytes
///
/// A length difference is reported as a mismatch at the first offset past the
/// shorter slice.
pub fn compare_block(expected: &[u8], actual: &[u8]) -> VerificationResult {
    if let Some(offset) = expected
        .iter()
        .zip(actual.iter())
        .position(|(e, a)| e != a)
    {
        return VerificationResult::Failure {
            offset,
            expected: expected[offset],
            actual: actual[offset],
        };
    }

    if expected.len() != actual.len() {
        let offset = expected.len().min(actual.len());
        return VerificationResult::Failure {
            offset,
            expected: expected.get(offset).copied().unwrap_or(0),
            actual: actual.get(offset).copied().unwrap_or(0),
        };
    }

    VerificationResult::Success
}
