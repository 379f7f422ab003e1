//! Z-index extraction from slice file names.
//!
//! Pairs are formed by sorted path order; reading the index back from both
//! file names guards against two directories that sort differently.

use std::path::Path;

use super::error::{Error, Result};

/// Numeric slice index parsed from a file name.
pub type ZIndex = u128;

/// Trailing digits kept beyond the digit count of the stack size, so the
/// window still covers the slice index when names carry other numeric tokens.
pub const RESERVED_Z_INDEX_DIGITS: usize = 13;

/// Widest window that always fits in a [`ZIndex`].
pub const MAX_Z_INDEX_DIGITS: usize = 38;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZIndexMatcher {
    digits: usize,
}

impl ZIndexMatcher {
    /// Fails unless `digits` is within `1..=MAX_Z_INDEX_DIGITS`.
    pub fn new(digits: usize) -> Result<Self> {
        if !(1..=MAX_Z_INDEX_DIGITS).contains(&digits) {
            return Err(Error::InvalidConfig(format!(
                "z-index digits must be within 1..={}, got {}",
                MAX_Z_INDEX_DIGITS, digits
            )));
        }
        Ok(Self { digits })
    }

    /// Window width derived from the number of slices in the stack.
    pub fn for_stack_len(len: usize) -> Self {
        // A usize has at most 20 decimal digits, so this stays below the cap.
        Self {
            digits: decimal_digits(len) + RESERVED_Z_INDEX_DIGITS,
        }
    }

    pub fn digits(&self) -> usize {
        self.digits
    }

    /// Joins every digit in the file name and parses the last `digits` of them.
    pub fn extract(&self, path: &Path) -> Result<ZIndex> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        let digits: Vec<u8> = name.bytes().filter(u8::is_ascii_digit).collect();
        if digits.is_empty() {
            return Err(Error::MissingZIndex {
                path: path.to_path_buf(),
            });
        }

        let window = &digits[digits.len().saturating_sub(self.digits)..];
        Ok(window
            .iter()
            .fold(0, |acc: ZIndex, &d| acc * 10 + ZIndex::from(d - b'0')))
    }

    /// Parses both names and fails unless they carry the same index.
    pub fn check_pair(&self, target: &Path, reference: &Path) -> Result<ZIndex> {
        let target_z = self.extract(target)?;
        let reference_z = self.extract(reference)?;
        if target_z != reference_z {
            return Err(Error::ZIndexMismatch {
                target: target_z,
                reference: reference_z,
            });
        }
        Ok(target_z)
    }
}

fn decimal_digits(n: usize) -> usize {
    n.checked_ilog10().map_or(1, |log| log as usize + 1)
}
