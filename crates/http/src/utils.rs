//! Utility macros and functions for the HTTP crate.
//!
//! This module provides helper macros and functions that are used internally
//! by the HTTP crate implementation.

/// A macro for early returns with an error if a condition is not met.
///
/// This is similar to the `assert!` macro, but returns an error instead of panicking.
/// It's useful for validation checks where you want to return early with an error
/// if some condition is not satisfied.
///
/// # Arguments
///
/// * `$predicate` - A boolean expression that should evaluate to true
/// * `$error` - The error value to return if the predicate is false
///
/// # Example
///
/// ```ignore
/// ensure!(headers.len() < MAX_HEADERS, ParseError::TooManyHeaders);
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;

/// Size of the per-connection formatting scratch space.
pub(crate) const SCRATCH_LEN: usize = 32;

/// Small reusable buffer for number formatting, owned by the connection state.
pub(crate) type Scratch = [u8; SCRATCH_LEN];

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Formats `n` as uppercase hexadecimal into the tail of `scratch` and returns
/// the written digits.
pub(crate) fn fmt_hex(mut n: u64, scratch: &mut Scratch) -> &[u8] {
    let mut pos = scratch.len();
    loop {
        pos -= 1;
        scratch[pos] = HEX_DIGITS[(n & 0xf) as usize];
        n >>= 4;
        if n == 0 {
            break;
        }
    }
    &scratch[pos..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_formatting() {
        let mut scratch = [0u8; SCRATCH_LEN];
        assert_eq!(fmt_hex(0, &mut scratch), b"0");
        assert_eq!(fmt_hex(9, &mut scratch), b"9");
        assert_eq!(fmt_hex(0x1f, &mut scratch), b"1F");
        assert_eq!(fmt_hex(u64::MAX, &mut scratch), b"FFFFFFFFFFFFFFFF");
    }
}
